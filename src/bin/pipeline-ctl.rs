use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "pipeline-ctl")]
#[command(about = "Operator CLI for kv-pipeline", long_about = None)]
struct Cli {
    /// Base URL of the health / metrics endpoint.
    #[arg(short, long, default_value = "http://localhost:9090")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the request server is reachable
    Health,
    /// Dump Prometheus metrics, optionally filtered by name prefix
    Metrics {
        #[arg(short, long)]
        filter: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", cli.url)).send().await?;
            let status = res.status();
            let json: Value = res.json().await?;
            println!("{}", serde_json::to_string_pretty(&json)?);
            if !status.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Metrics { filter } => {
            let res = client.get(format!("{}/metrics", cli.url)).send().await?;
            if !res.status().is_success() {
                eprintln!("Error: endpoint returned status {}", res.status());
                std::process::exit(1);
            }
            let text = res.text().await?;
            for line in text.lines() {
                let keep = match &filter {
                    Some(prefix) => line.trim_start_matches("# HELP ")
                        .trim_start_matches("# TYPE ")
                        .starts_with(prefix.as_str()),
                    None => true,
                };
                if keep {
                    println!("{line}");
                }
            }
        }
    }

    Ok(())
}
