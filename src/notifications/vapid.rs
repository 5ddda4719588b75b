//! VAPID credentials for Web Push (RFC 8292).
//!
//! The key pair is the sender identity presented to every push service.
//! It is read once at startup and never rotated while the server runs.
//! On disk it uses the same JSON shape the Node `web-push` tooling emits
//! (`{"publicKey": ..., "privateKey": ...}`), so existing key files keep
//! working.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::rand_core::OsRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// VAPID keypair for web push authentication.
///
/// The private key is the raw 32-byte P-256 scalar (base64url), which is the
/// format `web_push::VapidSignatureBuilder::from_base64()` expects. The
/// public key is the uncompressed SEC1 point (65 bytes).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VapidKeys {
    /// Uncompressed public key bytes (base64url, 65 bytes decoded).
    #[serde(rename = "publicKey")]
    public_key_b64: String,
    /// Raw 32-byte P-256 private key scalar (base64url).
    #[serde(rename = "privateKey")]
    private_key_b64: String,
}

impl VapidKeys {
    /// Generate a fresh VAPID keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = signing_key.verifying_key();

        // SEC1 uncompressed public key (65 bytes: 0x04 || x || y)
        let public_bytes = verifying_key.to_encoded_point(false);

        Self {
            public_key_b64: BASE64URL.encode(public_bytes.as_bytes()),
            private_key_b64: BASE64URL.encode(signing_key.to_bytes().as_slice()),
        }
    }

    /// Reconstruct from base64url-encoded strings, validating both halves.
    pub fn from_base64url(public_key_b64: &str, private_key_b64: &str) -> Result<Self> {
        // Tolerate padded input from other tooling.
        let public_key_b64 = public_key_b64.trim_end_matches('=');
        let private_key_b64 = private_key_b64.trim_end_matches('=');

        let pub_bytes = BASE64URL
            .decode(public_key_b64)
            .context("Invalid base64url for VAPID public key")?;
        anyhow::ensure!(
            pub_bytes.len() == 65 && pub_bytes[0] == 0x04,
            "VAPID public key must be 65-byte uncompressed P-256 point"
        );

        let priv_bytes = BASE64URL
            .decode(private_key_b64)
            .context("Invalid base64url for VAPID private key")?;
        anyhow::ensure!(
            priv_bytes.len() == 32,
            "VAPID private key must be 32-byte P-256 scalar, got {} bytes",
            priv_bytes.len()
        );
        let signing_key = SigningKey::from_bytes(priv_bytes.as_slice().into())
            .context("VAPID private key is not a valid P-256 scalar")?;

        // The pair must belong together or every push service rejects the JWT.
        let derived = signing_key.verifying_key().to_encoded_point(false);
        anyhow::ensure!(
            derived.as_bytes() == pub_bytes.as_slice(),
            "VAPID public key does not match the private key"
        );

        Ok(Self {
            public_key_b64: public_key_b64.to_string(),
            private_key_b64: private_key_b64.to_string(),
        })
    }

    /// Load and validate a key file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read VAPID keys from {}", path.display()))?;
        let raw: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse VAPID keys in {}", path.display()))?;
        let keys = Self::from_base64url(&raw.public_key_b64, &raw.private_key_b64)?;

        log::info!("[WebPush] Loaded VAPID keys from {}", path.display());
        Ok(keys)
    }

    /// Write the key file with owner-only permissions.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize VAPID keys")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write VAPID keys to {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))
                .context("Failed to set VAPID keys file permissions")?;
        }

        Ok(())
    }

    /// Base64url-encoded uncompressed public key.
    ///
    /// Browsers pass this as `applicationServerKey` when subscribing.
    pub fn public_key_base64url(&self) -> &str {
        &self.public_key_b64
    }

    /// Base64url-encoded raw private key scalar.
    pub fn private_key_base64url(&self) -> &str {
        &self.private_key_b64
    }
}
