//! Web push notification infrastructure.
//!
//! Manages the VAPID sender identity, the persisted list of browser push
//! subscriptions, and concurrent delivery to the browser push services.
//!
//! # Architecture
//!
//! ```text
//! POST /send
//!     ↓
//! PushDispatcher fans the payload out to every stored subscription
//!     ↓
//! Push service (FCM, Mozilla autopush, ...) delivers to the service worker
//!     ↓
//! Service worker shows the browser notification
//! ```
//!
//! # Subscriptions
//!
//! Browsers post their `PushSubscription` (endpoint + keys) to `/subscribe`.
//! The store keeps one entry per endpoint and drops entries the push service
//! reports as gone (404 / 410).

pub mod dispatch;
pub mod push;
pub mod store;
pub mod vapid;

pub use dispatch::{DispatchReport, PushDispatcher};
pub use push::{PushOutcome, PushSubscription, PushTransport, SubscriptionKeys, WebPushTransport};
pub use store::SubscriptionStore;
pub use vapid::VapidKeys;
