//! Example: Mount a Dropbox account and watch a folder for changes
//!
//! Usage:
//!   DROPBOX_TOKEN=... cargo run --example mount -- [--store dropfs.json] [--watch /path]
//!       [--minutes N] [--unmount]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dropfs::auth::StaticTokenAuthorizer;
use dropfs::config::{Config, Settings};
use dropfs::fs::MetadataFields;
use dropfs::host::{ChangeNotification, MountOptions, ProviderHost};
use dropfs::http::ReqwestTransport;
use dropfs::session::{ChangePoller, Registry};
use dropfs::store::{CredentialStore, JsonFileStore};
use tokio::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt};

/// Host that keeps mounts in memory and prints notifications.
#[derive(Default)]
struct ConsoleHost {
    mounted: Mutex<Vec<String>>,
}

#[async_trait]
impl ProviderHost for ConsoleHost {
    async fn mount(&self, options: MountOptions) -> dropfs::Result<()> {
        println!("Mounted {} as \"{}\"", options.file_system_id, options.display_name);
        self.mounted.lock().await.push(options.file_system_id);
        Ok(())
    }

    async fn unmount(&self, file_system_id: &str) -> dropfs::Result<()> {
        println!("Unmounted {}", file_system_id);
        self.mounted.lock().await.retain(|id| id != file_system_id);
        Ok(())
    }

    async fn mounted_file_systems(&self) -> dropfs::Result<Vec<String>> {
        Ok(self.mounted.lock().await.clone())
    }

    async fn notify(&self, notification: ChangeNotification) -> dropfs::Result<()> {
        for change in &notification.changes {
            println!(
                "{:?} {}/{}",
                change.change_type, notification.observed_path, change.entry_path
            );
        }
        Ok(())
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dropfs=debug"));
    fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> dropfs::Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().collect();

    let mut store_path = "dropfs.json".to_string();
    let mut watch = "/".to_string();
    let mut minutes = 5u64;
    let mut unmount = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--store" => {
                store_path = args.get(i + 1).cloned().unwrap_or(store_path);
                i += 2;
            }
            "--watch" => {
                watch = args.get(i + 1).cloned().unwrap_or(watch);
                i += 2;
            }
            "--minutes" => {
                minutes = args
                    .get(i + 1)
                    .and_then(|m| m.parse().ok())
                    .unwrap_or(minutes);
                i += 2;
            }
            "--unmount" => {
                unmount = true;
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }

    let token = env::var("DROPBOX_TOKEN").expect("DROPBOX_TOKEN is required");
    let config = Config::default();
    let store = Arc::new(JsonFileStore::new(&store_path));
    CredentialStore::new(store.clone())
        .save_settings(&Settings {
            use_watcher_polling: true,
            ..Settings::default()
        })
        .await?;

    let registry = Arc::new(Registry::new(
        config.clone(),
        Arc::new(ReqwestTransport::new(config.request_timeout)?),
        store,
        Arc::new(ConsoleHost::default()),
        Arc::new(StaticTokenAuthorizer::new(token)),
    ));

    let tenant = registry.mount().await?;
    for entry in registry.list(&tenant, &watch, &MetadataFields::all()).await? {
        println!(
            "  {} {}",
            if entry.is_directory == Some(true) { "[dir] " } else { "[file]" },
            entry.name.unwrap_or_default()
        );
    }

    registry.add_watcher(&tenant, &watch).await?;
    println!("\nWatching {} for {} minute(s)...", watch, minutes);
    let poller = ChangePoller::spawn(registry.clone());
    tokio::time::sleep(Duration::from_secs(minutes * 60)).await;
    poller.shutdown().await;

    if unmount {
        registry.unmount(&tenant).await?;
    }
    Ok(())
}
