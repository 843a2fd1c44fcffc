use async_trait::async_trait;

use warden_core::{CallContext, Result};

use crate::{AuthContext, Credential, RequestAccessor};

/// One way of recognizing a caller.
///
/// `extract` is cheap and infallible: it only decides whether the request
/// carries a credential this strategy understands. `authenticate` does the
/// lookups and may fail; the dispatcher then moves on to the next strategy.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Unique within a dispatcher.
    fn id(&self) -> &str;

    /// Lower values are tried first.
    fn priority(&self) -> i32;

    fn extract(&self, request: &dyn RequestAccessor) -> Option<Credential>;

    /// Must return an authenticated context on `Ok`.
    async fn authenticate(&self, ctx: &CallContext, credential: Credential)
    -> Result<AuthContext>;
}
