//! Change Notification
//!
//! Mutations publish a [`ChangeEvent`] after they succeed; subscribers read
//! them from a [`Subscription`] stream.

pub mod broadcaster;
pub mod events;

pub use broadcaster::{Broker, SubscriberId, Subscription, DEFAULT_QUEUE_CAPACITY};
pub use events::{ChangeEvent, EventKind};
