pub mod auth;
pub mod error;
pub mod profile;
pub mod status;

pub use status::ActiveFilter;
