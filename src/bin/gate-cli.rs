use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "Management CLI for the priority gate", long_about = None)]
struct Cli {
    /// Admin API base URL.
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    /// Admin API bearer token (`admin.api_key` in the gate's config).
    #[arg(short, long, global = true)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gate status
    Status,
    /// Show queue depth and dispatch counters
    Queue,
    /// Show rate limiter state
    Clients,
    /// Fire prioritized requests at the public listener
    Send {
        /// Public listener base URL.
        #[arg(long, default_value = "http://localhost:8080")]
        target: String,

        #[arg(long, default_value = "/")]
        path: String,

        /// Value for the x-priority header; omitted when not given.
        #[arg(long)]
        priority: Option<String>,

        #[arg(long, default_value_t = 1)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let endpoint = match cli.command {
        Commands::Status => "status",
        Commands::Queue => "queue",
        Commands::Clients => "clients",
        Commands::Send {
            target,
            path,
            priority,
            count,
        } => {
            return send(&client, &target, &path, priority.as_deref(), count).await;
        }
    };

    let headers = admin_headers(cli.key.as_deref())?;

    let res = client
        .get(format!("{}/admin/{}", cli.url, endpoint))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

fn admin_headers(key: Option<&str>) -> Result<HeaderMap, Box<dyn std::error::Error>> {
    let key = key.ok_or("--key is required for admin commands")?;
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);
    Ok(headers)
}

async fn send(
    client: &reqwest::Client,
    target: &str,
    path: &str,
    priority: Option<&str>,
    count: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let requests = (0..count).map(|i| {
        let mut req = client.get(format!("{target}{path}"));
        if let Some(p) = priority {
            req = req.header("x-priority", p);
        }
        async move { (i, req.send().await) }
    });

    for (i, result) in futures_util::future::join_all(requests).await {
        match result {
            Ok(res) => println!("#{:<4} {}", i + 1, res.status()),
            Err(e) => println!("#{:<4} error: {}", i + 1, e),
        }
    }
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
