//! Example: List a Dropbox folder
//!
//! Usage:
//!   DROPBOX_TOKEN=... cargo run --example ls -- [--path /path] [--thumbnails]

use std::env;
use std::sync::Arc;

use dropfs::api::ApiClient;
use dropfs::config::{Config, Settings};
use dropfs::fs::Client;
use dropfs::http::ReqwestTransport;
use tracing_subscriber::{EnvFilter, fmt};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dropfs=debug"));
    fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> dropfs::Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().collect();

    let mut path = "/".to_string();
    let mut thumbnails = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--path" => {
                path = args.get(i + 1).cloned().unwrap_or(path);
                i += 2;
            }
            "--thumbnails" => {
                thumbnails = true;
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }

    let token = env::var("DROPBOX_TOKEN").expect("DROPBOX_TOKEN is required");
    let config = Config::default();
    let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
    let api = ApiClient::new(transport, token, &config);

    let user = api.get_current_user().await?;
    println!("Logged in as: {} ({})", user.display_name, user.uid);
    let client = Client::new(api, user.uid, &config, &Settings::default());

    println!("\nListing: {}\n", path);
    let entries = client.read_directory(&path).await?;
    if entries.is_empty() {
        println!("  (empty)");
    }
    for entry in entries {
        if entry.is_directory {
            println!("  [dir]  {}", entry.name);
            continue;
        }
        println!(
            "  [file] {} {} {}",
            entry.name,
            format_size(entry.size),
            entry.mime_type.as_deref().unwrap_or("")
        );
        if thumbnails {
            let full = client.get_metadata(&entry.path, true).await?;
            if let Some(thumbnail) = full.thumbnail {
                println!("         thumbnail: {} chars", thumbnail.len());
            }
        }
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}B", bytes)
    } else if bytes < 1_048_576 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else if bytes < 1_073_741_824 {
        format!("{:.1}MB", bytes as f64 / 1_048_576.0)
    } else {
        format!("{:.2}GB", bytes as f64 / 1_073_741_824.0)
    }
}
