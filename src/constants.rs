//! Application-wide constants for vh-notify.
//!
//! Centralizes the fixed values shared by the relay, the push transport
//! and the HTTP surface.
//!
//! # Categories
//!
//! - **Notifications**: defaults applied to submitted notifications
//! - **Web Push**: push service request parameters
//! - **Streams**: SSE connection buffering and keep-alive

use std::time::Duration;

// ============================================================================
// Notifications
// ============================================================================

/// Title used when a submitted notification has no (or an empty) title.
pub const DEFAULT_TITLE: &str = "VH Notify";

/// SSE event name carried by every notification frame.
pub const NOTIFICATION_EVENT: &str = "notification";

// ============================================================================
// Web Push
// ============================================================================

/// Time-to-live the push service should hold an undelivered message (24 hours).
pub const PUSH_TTL_SECS: u32 = 86_400;

/// VAPID `sub` claim used when none is configured.
pub const DEFAULT_VAPID_SUBJECT: &str = "mailto:vh-notify@localhost";

/// Request timeout for a single push service call.
///
/// This is the only timeout on the dispatch path; the relay itself never
/// abandons an in-flight delivery.
pub const PUSH_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Streams
// ============================================================================

/// Per-connection frame buffer.
///
/// A receiver that falls this far behind is treated as a failed write and
/// dropped from the registry.
pub const STREAM_BUFFER: usize = 64;

/// Interval between SSE keep-alive comments.
pub const STREAM_KEEP_ALIVE: Duration = Duration::from_secs(15);

// ============================================================================
// Server
// ============================================================================

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8443;

/// File name offered for the CA certificate download.
pub const CA_CERT_FILENAME: &str = "vh-notify-ca.crt";
