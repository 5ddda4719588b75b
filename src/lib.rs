//! VH Notify - notification relay for a local network.
//!
//! One trusted sender posts short notifications; every subscribed receiver
//! gets them over two channels at once:
//!
//! - **SSE** to pages that are currently open (`GET /events`)
//! - **Web Push** to browsers that subscribed but have no page open
//!
//! # Architecture
//!
//! ```text
//! POST /send ──► NotificationRelay ──┬──► StreamRegistry::broadcast ──► open pages
//!                                    └──► PushDispatcher::dispatch_all ──► push services
//!                                                   │
//!                          gone subscriptions ◄─────┘
//!                                    │
//!                                    ▼
//!                          SubscriptionStore::remove_many
//! ```
//!
//! # Modules
//!
//! - [`relay`] - fan-out coordinator
//! - [`stream`] - live SSE connection registry
//! - [`notifications`] - VAPID keys, push subscriptions, push delivery
//! - [`server`] - axum router and listener
//! - [`config`] - configuration and environment overrides

pub mod config;
pub mod constants;
pub mod notifications;
pub mod qr;
pub mod relay;
pub mod server;
pub mod stream;

pub use config::Config;
pub use relay::{DeliverySummary, Notification, NotificationRelay};
