//! Midtrans Gateway - webhook relay for payment notifications.
//!
//! Receives Midtrans payment notifications and forwards each one, unchanged,
//! to the downstream service that owns the order. The owner is picked from
//! the `order_id` prefix.
//!
//! ## Flow
//!
//! ```text
//! Midtrans → POST /webhook/midtrans → route by order_id prefix → POST <destination>
//! ```
//!
//! Forwarding is attempted once. Destination failures are absorbed and
//! reported as accepted so the provider does not retry.

pub mod config;
pub mod forward;
pub mod relay;
pub mod routing;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use forward::{ForwardError, Forwarder};
pub use relay::{relay, RelayError, RelayOutcome};
pub use routing::{Route, RouteTable};
pub use web::{build_router, AppState};
