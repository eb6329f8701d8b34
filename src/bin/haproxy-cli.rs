use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "haproxy-cli")]
#[command(about = "Management CLI for the HAProxy admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8083")]
    url: String,

    #[arg(short, long, env = "HAPROXY_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Installation status and parsed config
    Status,
    /// Print the raw config file
    Raw,
    /// Replace the config file with a local file (validated, then restarted)
    Push { file: PathBuf },
    /// Check a local file without touching the live config
    Validate { file: PathBuf },
    /// Frontend → backend → server graph
    Visualize,
    /// Restart the load balancer
    Restart,
    /// Hosting accounts' domains served through the load balancer
    UserBackends,
    /// List config backups, newest first
    Backups,
    /// Show a section body, or replace it with `--replace <file>`
    Section {
        kind: String,
        name: String,
        #[arg(long)]
        replace: Option<PathBuf>,
        /// New section name when replacing
        #[arg(long)]
        rename: Option<String>,
    },
    /// Append a frontend described by a JSON file
    AddFrontend { file: PathBuf },
    /// Append a backend described by a JSON file
    AddBackend { file: PathBuf },
    DeleteFrontend { name: String },
    DeleteBackend { name: String },
    /// An account's HAProxy domains
    Domains { user: String },
    /// An account's web domains not yet behind HAProxy
    AvailableDomains { user: String },
    /// Add a domain for an account from a JSON file
    AddDomain { user: String, file: PathBuf },
    /// Update an account's domain from a JSON file
    UpdateDomain { user: String, domain: String, file: PathBuf },
    DeleteDomain { user: String, domain: String },
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

    let base = format!("{}/api/haproxy", cli.url.trim_end_matches('/'));
    let request = |method: Method, path: &str| -> RequestBuilder {
        client
            .request(method, format!("{base}{path}"))
            .headers(headers.clone())
    };

    let res = match cli.command {
        Commands::Status => request(Method::GET, "/status").send().await?,
        Commands::Raw => {
            let res = request(Method::GET, "/config/raw").send().await?;
            if res.status().is_success() {
                let body: Value = res.json().await?;
                print!("{}", body["config"].as_str().unwrap_or_default());
                return Ok(());
            }
            res
        }
        Commands::Push { file } => {
            let config = std::fs::read_to_string(file)?;
            request(Method::PUT, "/config/raw")
                .json(&json!({ "config": config }))
                .send()
                .await?
        }
        Commands::Validate { file } => {
            let config = std::fs::read_to_string(file)?;
            request(Method::POST, "/config/validate")
                .json(&json!({ "config": config }))
                .send()
                .await?
        }
        Commands::Visualize => request(Method::GET, "/visualize").send().await?,
        Commands::Restart => request(Method::POST, "/restart").send().await?,
        Commands::UserBackends => request(Method::GET, "/user-backends").send().await?,
        Commands::Backups => request(Method::GET, "/backups").send().await?,
        Commands::Section { kind, name, replace, rename } => {
            let path = format!("/section/{kind}/{name}");
            match replace {
                Some(file) => {
                    let config = std::fs::read_to_string(file)?;
                    request(Method::PUT, &path)
                        .json(&json!({ "config": config, "name": rename }))
                        .send()
                        .await?
                }
                None => request(Method::GET, &path).send().await?,
            }
        }
        Commands::AddFrontend { file } => {
            let spec: Value = serde_json::from_str(&std::fs::read_to_string(file)?)?;
            request(Method::POST, "/frontend").json(&spec).send().await?
        }
        Commands::AddBackend { file } => {
            let spec: Value = serde_json::from_str(&std::fs::read_to_string(file)?)?;
            request(Method::POST, "/backend").json(&spec).send().await?
        }
        Commands::DeleteFrontend { name } => {
            request(Method::DELETE, &format!("/frontend/{name}")).send().await?
        }
        Commands::DeleteBackend { name } => {
            request(Method::DELETE, &format!("/backend/{name}")).send().await?
        }
        Commands::Domains { user } => {
            request(Method::GET, &format!("/users/{user}/domains")).send().await?
        }
        Commands::AvailableDomains { user } => {
            request(Method::GET, &format!("/users/{user}/available-domains"))
                .send()
                .await?
        }
        Commands::AddDomain { user, file } => {
            let body: Value = serde_json::from_str(&std::fs::read_to_string(file)?)?;
            request(Method::POST, &format!("/users/{user}/domains"))
                .json(&body)
                .send()
                .await?
        }
        Commands::UpdateDomain { user, domain, file } => {
            let body: Value = serde_json::from_str(&std::fs::read_to_string(file)?)?;
            request(Method::PUT, &format!("/users/{user}/domains/{domain}"))
                .json(&body)
                .send()
                .await?
        }
        Commands::DeleteDomain { user, domain } => {
            request(Method::DELETE, &format!("/users/{user}/domains/{domain}"))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
