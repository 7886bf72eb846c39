//! `notifier` carries domain events to operators
//!
//! Supervisors publish [`types::Notification`] values on the `notification` queue through a
//! [`types::Notifier`], the [`Dispatcher`] consumes that queue and POSTs each event to the
//! webhooks registered for its topic
pub mod dispatcher;
pub mod notifier;
pub mod types;

pub use dispatcher::Dispatcher;
pub use notifier::{emit, BrokerNotifier};
pub use types::{EventMessage, Notification, Notifier, Webhook, WebhookClient};
