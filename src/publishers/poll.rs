//! Bounded container polling
//!
//! Instagram, Threads and Pinterest stage media in server-side containers
//! that must finish processing before publish. All three poll on a fixed
//! interval with a bounded attempt count; what differs is how exhaustion is
//! handled (Instagram/Threads proceed optimistically, Pinterest fails), so
//! this helper reports `Exhausted` and leaves that decision to the caller.
//!
//! Sleeping goes through the [`Sleeper`] trait so polling scenarios run
//! instantly in tests.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::PublishError;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Test sleeper that returns immediately.
pub struct NoopSleeper;

#[async_trait]
impl Sleeper for NoopSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

/// Status reported by one poll of a processing container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    InProgress,
    Finished,
    Error(String),
}

/// Terminal outcome of a bounded poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Finished,
    Failed(String),
    Exhausted,
}

/// Poll `fetch_status` every `interval` up to `max_attempts` times.
pub async fn poll_until<F, Fut>(
    interval: Duration,
    max_attempts: u32,
    sleeper: &dyn Sleeper,
    mut fetch_status: F,
) -> Result<PollOutcome, PublishError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ContainerStatus, PublishError>>,
{
    for attempt in 1..=max_attempts {
        match fetch_status().await? {
            ContainerStatus::Finished => return Ok(PollOutcome::Finished),
            ContainerStatus::Error(status) => return Ok(PollOutcome::Failed(status)),
            ContainerStatus::InProgress => {
                debug!(attempt, max_attempts, "Container still processing");
                if attempt < max_attempts {
                    sleeper.sleep(interval).await;
                }
            }
        }
    }
    Ok(PollOutcome::Exhausted)
}
