//! Services Layer
//!
//! Client-side behavior built on the repository traits: dashboard state, the
//! borrowing workflow, the realtime notifier and derived display values.

pub mod borrowing;
pub mod dashboard;
pub mod hub_protocol;
pub mod notifier;
pub mod view_model;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export for convenience
pub use borrowing::{BorrowStep, BorrowWorkflow};
pub use dashboard::{Dashboard, DashboardSnapshot};
pub use notifier::{ConnectionState, HubEvent, NotifierOptions, RealtimeNotifier};
