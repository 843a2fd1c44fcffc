//! Built-in strategies.

pub mod api_key;
pub mod bearer;
pub mod cookie;

pub use api_key::{ApiKeyConfig, ApiKeyStrategy};
pub use bearer::{BearerConfig, BearerStrategy};
pub use cookie::{CookieConfig, CookieStrategy};
