use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use pcbook::config::ServerConfig;
use pcbook::server::LaptopServer;
use tokio::signal;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on, e.g. 0.0.0.0:8080.
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Directory uploaded images are written to.
    #[arg(short, long)]
    image_dir: Option<PathBuf>,

    #[arg(long)]
    max_image_bytes: Option<usize>,

    /// Simulated work per laptop examined by a search, in milliseconds.
    #[arg(long)]
    search_delay_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(image_dir) = args.image_dir {
        config.image_dir = image_dir;
    }
    if let Some(max) = args.max_image_bytes {
        config.max_image_bytes = max;
    }
    if let Some(ms) = args.search_delay_ms {
        config.search_per_entry_delay = Duration::from_millis(ms);
    }

    fs::create_dir_all(&config.image_dir)?;

    println!("Starting pcbook server...");
    let mut server = LaptopServer::from_config(config)?;
    let addr = server.start().await?;
    println!("pcbook listening on {} (gRPC)", addr);

    signal::ctrl_c().await?;
    println!("\nShutdown signal received. Draining in-flight calls...");
    server.stop().await?;
    println!("Server stopped. Exiting.");

    Ok(())
}
