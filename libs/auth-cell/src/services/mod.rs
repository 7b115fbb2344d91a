pub mod auth;
pub mod password;
pub mod reset;

pub use auth::AuthService;
pub use reset::PasswordResetService;
