use serde::{Deserialize, Serialize};

/// A named point in a core operation's lifecycle.
///
/// Implemented by one payload type per point, e.g. `UserCreating`.
pub trait LifecycleEvent: Send + Sync + 'static {
    /// Stable name used in logs and errors (e.g. `"user.creating"`).
    const NAME: &'static str;
}

/// When listeners run relative to the committed mutation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Before the mutation; a failing listener aborts the operation.
    Before,
    /// After the mutation committed; failures become warnings.
    After,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Before => "before",
            Phase::After => "after",
        }
    }
}
