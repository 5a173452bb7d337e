pub mod user;
pub mod lead;
pub mod call;
pub mod webhook;

pub use user::*;
pub use lead::*;
pub use call::*;
pub use webhook::*;
