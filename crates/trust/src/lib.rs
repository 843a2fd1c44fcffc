//! `warden-trust` — TTL-bounded trust records.
//!
//! A trust record says "subject S trusts resource R until T". Marking an
//! existing pair renews it in place; expired records read as absent and are
//! removed by an explicit [`TrustStore::cleanup`] sweep.

pub mod backend;
pub mod devices;
pub mod memory;
pub mod one_time;
pub mod policy;
pub mod record;
pub mod store;

pub use backend::TrustBackend;
pub use devices::{DeviceInfo, TrustedDevices};
pub use memory::InMemoryTrustBackend;
pub use one_time::{CodeDigest, CodePurpose, OneTimeCodes, reveal};
pub use policy::{MAX_TRUST_TTL_SECONDS, TtlPolicy};
pub use record::TrustRecord;
pub use store::TrustStore;
