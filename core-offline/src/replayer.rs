//! Seam between the queue and the remote API.

use crate::operation::PendingOperation;
use async_trait::async_trait;
use core_retry::RemoteError;

/// Sends one queued mutation to the backend.
///
/// Implementations map `kind`, `resource` and `payload` onto the hosted
/// backend's client (an insert into `registrations`, an update of
/// `site_settings`, ...). Each call is one attempt; the queue wraps it in
/// its own retry schedule.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MutationReplayer: Send + Sync {
    async fn replay(&self, operation: &PendingOperation) -> Result<(), RemoteError>;
}
