use clap::Parser;
use log::{error, info};
use server::config::Config;

/// Main-method of the application.
/// Parses command-line arguments, then serves pages and game sessions until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    info!("Starting server on {}", config.address());

    let server_handle = {
        let config = config.clone();
        tokio::spawn(async move { server::http::serve(&config).await })
    };

    tokio::select! {
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server stopped"),
                Ok(Err(e)) => {
                    error!("Server failed: {}", e);
                    return Err(e.into());
                }
                Err(e) => error!("Server task panicked: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
