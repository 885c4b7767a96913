use clap::{Parser, Subcommand};
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};

use danger_room::control::media_type::media_type_for;

#[derive(Parser)]
#[command(name = "danger-ctl")]
#[command(about = "Configure mounts on a running danger-room server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Control prefix of the server.
    #[arg(long, default_value = "/~danger/")]
    control_prefix: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mount a proxy, or swap the harness of an existing mount
    Set {
        /// Harness resource type (noop, limit, headers, ...)
        harness: String,

        /// Origin URL
        #[arg(short, long)]
        target: String,

        /// Mount suffix; the server default is used when omitted
        #[arg(short, long)]
        mount: Option<String>,

        /// Harness configuration as a JSON object
        #[arg(short, long)]
        config: Option<String>,
    },
    /// List mounted proxies
    List,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = format!("{}{}", cli.url.trim_end_matches('/'), cli.control_prefix);

    match cli.command {
        Commands::Set {
            harness,
            target,
            mount,
            config,
        } => {
            let harness_config: Value = match config {
                Some(raw) => serde_json::from_str(&raw)?,
                None => json!({}),
            };
            let url = match mount {
                Some(mount) => format!("{}{}", base, mount.trim_start_matches('/')),
                None => base,
            };

            let res = client
                .post(url)
                .header(CONTENT_TYPE, media_type_for(&harness))
                .body(serde_json::to_vec(&json!({ "target": target, "harness": harness_config }))?)
                .send()
                .await?;
            print_text(res).await?;
        }
        Commands::List => {
            let res = client.get(base).send().await?;
            print_json(res).await?;
        }
    }

    Ok(())
}

async fn print_text(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if status.is_success() {
        print!("{}", text);
    } else {
        eprintln!("Error: control endpoint returned status {}", status);
        eprint!("{}", text);
    }
    Ok(())
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: control endpoint returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
