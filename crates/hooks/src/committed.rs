use warden_core::Error;

/// An after-listener that failed. The operation stays committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookWarning {
    pub event: &'static str,
    pub listener: String,
    pub error: Error,
}

impl core::fmt::Display for HookWarning {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} listener '{}' failed: {}", self.event, self.listener, self.error)
    }
}

/// Result of a committed operation plus any after-hook warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed<T> {
    pub value: T,
    pub warnings: Vec<HookWarning>,
}

impl<T> Committed<T> {
    pub fn new(value: T, warnings: Vec<HookWarning>) -> Self {
        Self { value, warnings }
    }

    pub fn clean(value: T) -> Self {
        Self::new(value, Vec::new())
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Committed<U> {
        Committed {
            value: f(self.value),
            warnings: self.warnings,
        }
    }

    /// Append warnings collected by an outer layer.
    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = HookWarning>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}
