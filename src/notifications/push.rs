//! Web push subscriptions and the push service transport.
//!
//! Sends encrypted web push messages (RFC 8030, RFC 8291) using VAPID
//! authentication (RFC 8292).

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::vapid::VapidKeys;
use crate::constants::{PUSH_REQUEST_TIMEOUT, PUSH_TTL_SECS};

/// A browser's push subscription, as produced by `PushSubscription.toJSON()`.
///
/// Only `endpoint` and `keys` are interpreted. Anything else the browser sent
/// is carried along untouched so a stored record round-trips unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PushSubscription {
    /// Push service endpoint URL. Natural key of the record.
    pub endpoint: String,
    /// Optional expiry reported by the browser.
    #[serde(
        rename = "expirationTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub expiration_time: Option<serde_json::Value>,
    /// Transport keying material.
    pub keys: SubscriptionKeys,
    /// Unrecognised fields, preserved for persistence.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Keying material of a push subscription.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    /// Browser's P-256 ECDH public key (base64url).
    pub p256dh: String,
    /// Shared auth secret (base64url).
    pub auth: String,
}

impl PushSubscription {
    /// Build a subscription from its three required parts.
    pub fn new(
        endpoint: impl Into<String>,
        p256dh: impl Into<String>,
        auth: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            expiration_time: None,
            keys: SubscriptionKeys {
                p256dh: p256dh.into(),
                auth: auth.into(),
            },
            extra: serde_json::Map::new(),
        }
    }
}

/// Result of a push attempt the push service answered definitively.
///
/// Recoverable failures are reported as `Err` instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// The push service accepted the message.
    Delivered,
    /// The subscription no longer exists (404 / 410) and must be discarded.
    Gone,
}

/// Delivers one payload to one subscription.
///
/// Implementations hold their credentials; they are fixed for the lifetime
/// of the transport.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Deliver `payload` to `subscription`.
    ///
    /// Returns `Err` for any failure that may succeed on a later attempt.
    async fn deliver(&self, subscription: &PushSubscription, payload: &[u8]) -> Result<PushOutcome>;
}

/// Push transport backed by `web-push` for encryption and signing and
/// `reqwest` for HTTP.
///
/// A single pooled `reqwest::Client` is reused for every delivery.
#[derive(Debug)]
pub struct WebPushTransport {
    client: reqwest::Client,
    vapid: VapidKeys,
    subject: String,
}

impl WebPushTransport {
    /// Create a transport signing with `vapid` and the given `sub` claim.
    pub fn new(vapid: VapidKeys, subject: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(PUSH_REQUEST_TIMEOUT)
            .build()
            .context("Failed to build push HTTP client")?;

        Ok(Self {
            client,
            vapid,
            subject: subject.into(),
        })
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    async fn deliver(&self, subscription: &PushSubscription, payload: &[u8]) -> Result<PushOutcome> {
        use web_push::{
            ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushMessageBuilder,
        };

        let sub_info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.keys.p256dh,
            &subscription.keys.auth,
        );

        let mut sig_builder =
            VapidSignatureBuilder::from_base64(self.vapid.private_key_base64url(), &sub_info)
                .context("Failed to build VAPID signature")?;
        sig_builder.add_claim("sub", self.subject.as_str());
        let sig = sig_builder.build().context("Failed to sign VAPID JWT")?;

        let mut builder = WebPushMessageBuilder::new(&sub_info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(sig);
        builder.set_ttl(PUSH_TTL_SECS);

        let message = builder.build().context("Failed to build web push message")?;

        let mut request = self
            .client
            .post(message.endpoint.to_string())
            .header("TTL", message.ttl.to_string());

        if let Some(urgency) = message.urgency {
            request = request.header("Urgency", urgency.to_string());
        }

        if let Some(topic) = message.topic {
            request = request.header("Topic", topic);
        }

        if let Some(push_payload) = message.payload {
            request = request
                .header("Content-Encoding", push_payload.content_encoding.to_str())
                .header("Content-Type", "application/octet-stream");

            for (key, value) in &push_payload.crypto_headers {
                request = request.header(*key, value.as_str());
            }

            request = request.body(push_payload.content);
        }

        let response = request.send().await.context("Web push HTTP request failed")?;
        let status = response.status().as_u16();

        match status {
            200..=299 => Ok(PushOutcome::Delivered),
            404 | 410 => {
                log::info!("[WebPush] Subscription expired (HTTP {status})");
                Ok(PushOutcome::Gone)
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(anyhow::anyhow!("Web push send failed (HTTP {status}): {body}"))
            }
        }
    }
}
