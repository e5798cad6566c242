use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use pcbook::pb::memory::Unit;
use pcbook::pb::{Filter, Memory};
use pcbook::sdk::{sample, Client};
use pcbook::serializer;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    address: String,

    /// Deadline for each call, in seconds.
    #[arg(short, long, default_value_t = 5)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Create random sample laptops.
    Create {
        #[arg(short, long, default_value_t = 1)]
        count: usize,
    },
    /// Search laptops; unset flags do not constrain the result.
    Search {
        #[arg(long)]
        max_price: Option<f64>,
        #[arg(long, default_value_t = 0)]
        min_cores: u32,
        #[arg(long, default_value_t = 0.0)]
        min_ghz: f64,
        #[arg(long, default_value_t = 0)]
        min_ram_gb: u64,
    },
    /// Upload an image for a laptop.
    Upload { laptop_id: String, path: PathBuf },
    /// Create sample laptops and rate each of them once with a random score.
    Rate {
        #[arg(short, long, default_value_t = 3)]
        count: usize,
    },
    /// Convert a binary laptop file to JSON.
    Convert { input: PathBuf, output: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Create { count } => {
            let client = connect(&cli.address, cli.timeout).await?;
            for _ in 0..count {
                let id = client.create_laptop(sample::new_laptop()).await?;
                println!("{}", id);
            }
        }
        Commands::Search {
            max_price,
            min_cores,
            min_ghz,
            min_ram_gb,
        } => {
            let client = connect(&cli.address, cli.timeout).await?;
            let filter = Filter {
                max_price_usd: max_price,
                min_cpu_cores: min_cores,
                min_cpu_ghz: min_ghz,
                min_ram: Some(Memory::new(min_ram_gb, Unit::Gigabyte)),
            };
            for laptop in client.search_laptop(filter).await? {
                println!("{}", serializer::laptop_to_json(&laptop)?);
            }
        }
        Commands::Upload { laptop_id, path } => {
            let client = connect(&cli.address, cli.timeout).await?;
            let response = client.upload_image(&laptop_id, &path).await?;
            println!("{} ({} bytes)", response.id, response.size);
        }
        Commands::Rate { count } => {
            let client = connect(&cli.address, cli.timeout).await?;
            let mut ratings = Vec::with_capacity(count);
            for _ in 0..count {
                let id = client.create_laptop(sample::new_laptop()).await?;
                ratings.push((id, sample::random_laptop_score()));
            }
            for response in client.rate_laptop(ratings).await? {
                println!(
                    "{} rated {} times, average {:.2}",
                    response.laptop_id, response.rated_count, response.average_score
                );
            }
        }
        Commands::Convert { input, output } => {
            let laptop = serializer::read_binary_file(&input)?;
            serializer::write_json_file(&laptop, &output)?;
            println!("OK");
        }
    }

    Ok(())
}

async fn connect(address: &str, timeout_secs: u64) -> anyhow::Result<Client> {
    let client = Client::connect(address).await?;
    Ok(client.with_timeout(Duration::from_secs(timeout_secs)))
}
