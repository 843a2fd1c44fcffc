pub mod api_keys;
pub mod devices;
pub mod organizations;
pub mod sessions;
pub mod system;
pub mod users;
