//! Connection verification, token refresh, and credential synchronization.

pub mod job;
pub mod notifier;
pub mod refresh;
pub mod sync;
pub mod verifier;

pub use job::{TickStats, VerificationJob};
pub use notifier::{DisconnectNotice, DisconnectNotifier, LogNotifier};
pub use refresh::TokenRefresher;
pub use sync::LinkedInTokenSynchronizer;
pub use verifier::ConnectionVerifier;
