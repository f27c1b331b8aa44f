//! Command implementations for metasync-cli

pub mod admin;
pub mod status;
pub mod sweep;
pub mod validate;

pub use admin::{run_forget, run_reassign};
pub use status::run_status;
pub use sweep::run_sweep;
pub use validate::run_validate;
