//! Airmeet - AI voice-agent call orchestration backend
//!
//! One binary, two modes:
//! - default / `--server`: the HTTP API (auth, leads, call orchestration,
//!   provider webhooks)
//! - `--worker`: the delayed-call consumer that places scheduled calls

mod models;
mod server;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("airmeet=info".parse().expect("valid directive")),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let run_worker = args.contains(&"--worker".to_string());

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(async {
            let config = server::Config::from_env()?;
            if run_worker {
                tracing::info!("Starting Airmeet call worker");
                server::run_worker(config).await
            } else {
                tracing::info!("Starting Airmeet API server");
                server::run_server(config).await
            }
        });

    if let Err(e) = result {
        tracing::error!("Fatal: {}", e);
        std::process::exit(1);
    }
}
