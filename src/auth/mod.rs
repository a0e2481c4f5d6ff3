pub mod forms;
pub mod session;

pub use session::{normalize_base_url, AuthSession, DEFAULT_CLUSTER};
