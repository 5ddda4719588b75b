//! Server configuration.
//!
//! Values come from three layers, later ones winning: built-in defaults,
//! `VH_NOTIFY_*` environment variables, then command-line arguments.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::constants::{DEFAULT_PORT, DEFAULT_VAPID_SUBJECT};
use crate::server::TlsFiles;

/// Configuration for `vh-notify serve`.
#[derive(Serialize, Clone, Debug)]
pub struct Config {
    /// Address the listener binds to.
    pub bind: IpAddr,
    /// Listen port.
    pub port: u16,
    /// Host name or LAN address receivers use to reach the server.
    pub host: Option<String>,
    /// Leaf certificate (PEM). HTTPS is enabled when this and `key` are set.
    pub cert: Option<PathBuf>,
    /// Private key (PEM).
    pub key: Option<PathBuf>,
    /// CA certificate (PEM), appended to the chain and offered at `/ca.crt`.
    pub ca_cert: Option<PathBuf>,
    /// VAPID key pair document.
    pub vapid_keys: PathBuf,
    /// VAPID `sub` claim (a `mailto:` or `https:` URL).
    pub vapid_subject: String,
    /// Persisted push subscription list.
    pub subscriptions: PathBuf,
    /// Print the connection URL as a QR code at startup.
    pub show_qr: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            host: None,
            cert: None,
            key: None,
            ca_cert: None,
            vapid_keys: PathBuf::from("vapid.json"),
            vapid_subject: DEFAULT_VAPID_SUBJECT.to_string(),
            subscriptions: PathBuf::from("subscriptions.json"),
            show_qr: true,
        }
    }
}

impl Config {
    /// Apply `VH_NOTIFY_*` environment variables on top of the current values.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("VH_NOTIFY_PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => log::warn!("Ignoring invalid VH_NOTIFY_PORT={port}"),
            }
        }

        if let Ok(bind) = std::env::var("VH_NOTIFY_BIND") {
            match bind.parse::<IpAddr>() {
                Ok(bind) => self.bind = bind,
                Err(_) => log::warn!("Ignoring invalid VH_NOTIFY_BIND={bind}"),
            }
        }

        if let Ok(host) = std::env::var("VH_NOTIFY_HOST") {
            self.host = Some(host);
        }

        if let Ok(path) = std::env::var("VH_NOTIFY_SUBSCRIPTIONS") {
            self.subscriptions = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("VH_NOTIFY_VAPID_KEYS") {
            self.vapid_keys = PathBuf::from(path);
        }

        if let Ok(subject) = std::env::var("VH_NOTIFY_VAPID_SUBJECT") {
            self.vapid_subject = subject;
        }
    }

    /// Check combinations the argument parser cannot express.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.cert.is_some() == self.key.is_some(),
            "--cert and --key must be given together"
        );
        anyhow::ensure!(
            self.vapid_subject.starts_with("mailto:") || self.vapid_subject.starts_with("https:"),
            "VAPID subject must be a mailto: or https: URL, got {:?}",
            self.vapid_subject
        );
        Ok(())
    }

    /// Listener socket address.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Whether the listener serves HTTPS.
    pub fn tls_enabled(&self) -> bool {
        self.cert.is_some() && self.key.is_some()
    }

    /// URL receivers open, e.g. `https://192.168.1.20:8443`.
    pub fn public_url(&self) -> String {
        let scheme = if self.tls_enabled() { "https" } else { "http" };
        let host = self.host.clone().unwrap_or_else(|| {
            if self.bind.is_unspecified() {
                "localhost".to_string()
            } else {
                self.bind.to_string()
            }
        });
        format!("{scheme}://{host}:{}", self.port)
    }

    /// Read the CA certificate, if configured.
    pub fn load_ca_cert(&self) -> Result<Option<String>> {
        self.ca_cert
            .as_ref()
            .map(|path| {
                fs::read_to_string(path)
                    .with_context(|| format!("Failed to read CA certificate {}", path.display()))
            })
            .transpose()
    }

    /// Read the TLS certificate chain and key, if HTTPS is enabled.
    pub fn load_tls(&self) -> Result<Option<TlsFiles>> {
        let (Some(cert), Some(key)) = (&self.cert, &self.key) else {
            return Ok(None);
        };

        let cert_pem = fs::read_to_string(cert)
            .with_context(|| format!("Failed to read certificate {}", cert.display()))?;
        let key_pem = fs::read_to_string(key)
            .with_context(|| format!("Failed to read private key {}", key.display()))?;

        Ok(Some(TlsFiles {
            cert_pem,
            key_pem,
            ca_pem: self.load_ca_cert()?,
        }))
    }
}
