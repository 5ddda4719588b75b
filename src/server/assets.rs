//! Static assets compiled into the binary.

/// Receiver page: SSE client, push enrollment and the notification log.
pub(super) const INDEX_HTML: &str = include_str!("../../assets/index.html");

/// Service worker that turns push messages into system notifications.
pub(super) const SERVICE_WORKER_JS: &str = include_str!("../../assets/sw.js");
