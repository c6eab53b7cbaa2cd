use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "balance-cli")]
#[command(about = "Management CLI for the balance engine", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show engine status and queue depth
    Status,
    /// Show result cache statistics
    Cache,
    /// Drop every cached result
    ClearCache,
    /// Cancel queued queries
    ClearQueue,
    /// Query one address
    Query { network: String, address: String },
    /// List watched addresses
    Watched,
    /// Start watching an address
    Watch {
        network: String,
        address: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        interval: Option<u64>,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Stop watching an address
    Unwatch { id: String },
    /// Show the balance history of a watched address
    History {
        id: String,
        /// Print as CSV
        #[arg(long)]
        csv: bool,
    },
    /// List alerts
    Alerts {
        /// Only unacknowledged alerts
        #[arg(long)]
        unread: bool,
    },
    /// Acknowledge an alert
    Ack { id: String },
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

    let request = |method: Method, path: String| -> RequestBuilder {
        client
            .request(method, format!("{}{}", cli.url, path))
            .headers(headers.clone())
    };

    match cli.command {
        Commands::Status => print_response(request(Method::GET, "/admin/status".into())).await?,
        Commands::Cache => print_response(request(Method::GET, "/admin/cache".into())).await?,
        Commands::ClearCache => print_response(request(Method::POST, "/admin/cache/clear".into())).await?,
        Commands::ClearQueue => print_response(request(Method::POST, "/admin/queue/clear".into())).await?,
        Commands::Query { network, address } => {
            print_response(request(Method::GET, format!("/admin/query/{}/{}", network, address))).await?
        }
        Commands::Watched => print_response(request(Method::GET, "/admin/watch".into())).await?,
        Commands::Watch { network, address, name, interval, threshold } => {
            let body = serde_json::json!({
                "network": network,
                "address": address,
                "display_name": name,
                "check_interval_minutes": interval,
                "alert_threshold_percent": threshold,
            });
            print_response(request(Method::POST, "/admin/watch".into()).json(&body)).await?
        }
        Commands::Unwatch { id } => print_response(request(Method::DELETE, format!("/admin/watch/{}", id))).await?,
        Commands::History { id, csv: true } => {
            print_text(request(Method::GET, format!("/admin/watch/{}/history.csv", id))).await?
        }
        Commands::History { id, csv: false } => {
            print_response(request(Method::GET, format!("/admin/watch/{}/history", id))).await?
        }
        Commands::Alerts { unread } => {
            print_response(request(Method::GET, format!("/admin/alerts?unread={}", unread))).await?
        }
        Commands::Ack { id } => print_response(request(Method::POST, format!("/admin/alerts/{}/ack", id))).await?,
    }

    Ok(())
}

async fn send(req: RequestBuilder) -> Result<Option<reqwest::Response>, Box<dyn std::error::Error>> {
    let res = req.send().await?;
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(None);
    }
    Ok(Some(res))
}

async fn print_response(req: RequestBuilder) -> Result<(), Box<dyn std::error::Error>> {
    let Some(res) = send(req).await? else {
        return Ok(());
    };
    let text = res.text().await?;
    if text.is_empty() {
        println!("OK");
        return Ok(());
    }
    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn print_text(req: RequestBuilder) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(res) = send(req).await? {
        print!("{}", res.text().await?);
    }
    Ok(())
}
