use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// "`subject_id` trusts `resource_id` until `expires_at`".
///
/// At most one record exists per `(subject_id, resource_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustRecord<M> {
    pub subject_id: String,
    pub resource_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub metadata: M,
}

impl<M> TrustRecord<M> {
    /// Valid strictly before `expires_at`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
