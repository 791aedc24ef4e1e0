use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "predict-cli")]
#[command(about = "Management CLI for the prediction proxy", long_about = None)]
struct Cli {
    /// Admin API base URL
    #[arg(short, long, default_value = "http://127.0.0.1:3002")]
    url: String,

    /// Admin API key
    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show proxy status and ML service settings
    Status,
    /// Show the consecutive failure tally
    Breaker,
    /// Clear the failure tally and leave degraded mode
    Reset,
    /// Send a prediction through the public API
    Predict {
        /// Public API base URL
        #[arg(long, default_value = "http://127.0.0.1:3001")]
        api: String,

        #[arg(long)]
        home: String,

        #[arg(long)]
        away: String,

        /// Seven comma-separated feature values
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        features: Vec<f64>,

        /// Ask the ML service for AI insights
        #[arg(long)]
        ai: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let res = match cli.command {
        Commands::Status => {
            client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Breaker => {
            client
                .get(format!("{}/admin/breaker", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Reset => {
            client
                .post(format!("{}/admin/breaker/reset", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Predict {
            api,
            home,
            away,
            features,
            ai,
        } => {
            client
                .post(format!("{}/predict", api.trim_end_matches('/')))
                .json(&json!({
                    "homeTeam": home,
                    "awayTeam": away,
                    "features": features,
                    "enableAI": ai,
                }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
