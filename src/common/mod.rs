//! Shared types, ports and errors

pub mod cancel;
pub mod errors;
pub mod traits;
pub mod types;
