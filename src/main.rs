//! VH Notify CLI - serves the notification relay.
//!
//! This is the binary entry point. See the `vh_notify` library for the
//! relay itself.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mimalloc::MiMalloc;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use vh_notify::notifications::{PushDispatcher, SubscriptionStore, VapidKeys, WebPushTransport};
use vh_notify::server::{self, AppState};
use vh_notify::stream::StreamRegistry;
use vh_notify::{qr, Config, NotificationRelay};

/// Global allocator. mimalloc provides better multi-threaded performance
/// than the system allocator.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

// CLI
#[derive(Parser)]
#[command(name = "vh-notify")]
#[command(version)]
#[command(about = "Relay notifications to open pages (SSE) and subscribed browsers (Web Push)")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server
    Serve(ServeArgs),
    /// Generate a VAPID key pair
    Keygen {
        /// Where to write the key file
        #[arg(long)]
        out: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct ServeArgs {
    /// Listen port
    #[arg(long)]
    port: Option<u16>,
    /// Bind address
    #[arg(long)]
    bind: Option<IpAddr>,
    /// Host or LAN address shown in the connection URL
    #[arg(long)]
    host: Option<String>,
    /// TLS certificate (PEM)
    #[arg(long, requires = "key")]
    cert: Option<PathBuf>,
    /// TLS private key (PEM)
    #[arg(long, requires = "cert")]
    key: Option<PathBuf>,
    /// CA certificate (PEM) appended to the chain and offered at /ca.crt
    #[arg(long)]
    ca_cert: Option<PathBuf>,
    /// VAPID key pair file
    #[arg(long)]
    vapid_keys: Option<PathBuf>,
    /// VAPID subject claim (mailto: or https: URL)
    #[arg(long)]
    vapid_subject: Option<String>,
    /// Push subscription store
    #[arg(long)]
    subscriptions: Option<PathBuf>,
    /// Do not print the QR code
    #[arg(long)]
    no_qr: bool,
}

impl ServeArgs {
    /// Defaults, then environment, then explicit arguments.
    fn into_config(self) -> Config {
        let mut config = Config::default();
        config.apply_env_overrides();

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if self.host.is_some() {
            config.host = self.host;
        }
        config.cert = self.cert;
        config.key = self.key;
        config.ca_cert = self.ca_cert;
        if let Some(path) = self.vapid_keys {
            config.vapid_keys = path;
        }
        if let Some(subject) = self.vapid_subject {
            config.vapid_subject = subject;
        }
        if let Some(path) = self.subscriptions {
            config.subscriptions = path;
        }
        config.show_qr = !self.no_qr;
        config
    }
}

async fn run_server(config: Config) -> Result<()> {
    config.validate()?;
    log::debug!("Config: {}", serde_json::to_string(&config)?);

    let vapid = VapidKeys::load(&config.vapid_keys)?;
    let vapid_public_key: Arc<str> = Arc::from(vapid.public_key_base64url());
    let tls = config.load_tls()?;
    let ca_cert = config.load_ca_cert()?.map(Arc::from);

    let store = SubscriptionStore::load(&config.subscriptions);
    let store_path = store.path().display().to_string();
    let transport = WebPushTransport::new(vapid, config.vapid_subject.clone())?;
    let relay = NotificationRelay::new(
        Arc::new(StreamRegistry::new()),
        Arc::new(Mutex::new(store)),
        PushDispatcher::new(Arc::new(transport)),
    );

    let subscriptions = relay.subscription_count().await;
    let app = server::router(AppState {
        relay,
        vapid_public_key,
        ca_cert,
    });

    let url = config.public_url();
    qr::print_connection_banner(&url, config.show_qr);
    println!("Push subscriptions loaded: {subscriptions} ({store_path})\n");
    log::info!("VH Notify v{} listening on {}", env!("CARGO_PKG_VERSION"), config.socket_addr());

    server::serve(config.socket_addr(), app, tls).await
}

fn keygen(out: &Path, force: bool) -> Result<()> {
    if out.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", out.display());
    }

    let keys = VapidKeys::generate();
    keys.save(out)?;
    println!("Wrote VAPID keys to {}", out.display());
    println!("Public key: {}", keys.public_key_base64url());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start Tokio runtime")?;
            runtime.block_on(run_server(args.into_config()))?;
        }
        Commands::Keygen { out, force } => keygen(&out, force)?,
    }

    Ok(())
}
