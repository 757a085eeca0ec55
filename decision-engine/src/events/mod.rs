//! Decision notifications
//!
//! Every session transition produces a [`DecisionEvent`]. The service
//! publishes them on an [`EventBus`] after the session is stored; delivery is
//! best effort and never fails the operation that caused it.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   Service    │────▶│  Event Bus   │────▶│  Subscribers │
//! │  (publish)   │     │  (broadcast) │     │   (recv)     │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

pub mod bus;
pub mod types;

pub use bus::{
    EventBus, EventBusExt, EventFilter, FilteredReceiver, SharedEventBus,
    DEFAULT_CHANNEL_CAPACITY,
};
pub use types::DecisionEvent;
