use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Inspection CLI for the mesh gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Gateway liveness and readiness
    Status,
    /// List known services and the discovery backend
    Services,
    /// Instance health of one service
    Health { service: String },
    /// Instances and metadata of one service
    Info { service: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/health", base)).send().await?;
            print_response(res).await?;
            let res = client.get(format!("{}/health/ready", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Services => {
            let res = client.get(format!("{}/services", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Health { service } => {
            let res = client
                .get(format!("{}/services/{}/health", base, service))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Info { service } => {
            let res = client
                .get(format!("{}/services/{}/info", base, service))
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
