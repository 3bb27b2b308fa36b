use async_trait::async_trait;

use crate::Error;

/// Outbound mail delivery collaborator.
///
/// Delivery is fire-and-forget from this crate's perspective: callers hand a
/// code over and move on; transport, templating, and retries belong to the
/// implementation.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    /// Deliver a one-time login code to `to`.
    async fn send_otp_email(&self, to: &str, code: &str) -> Result<(), Error>;
}

/// Discards all outgoing mail.
///
/// For deployments that never issue emailed codes, and as a stand-in during
/// tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send_otp_email(&self, _to: &str, _code: &str) -> Result<(), Error> {
        Ok(())
    }
}
