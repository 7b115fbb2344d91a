pub mod company;
pub mod invite;

pub use company::CompanyService;
pub use invite::{build_invite_link, generate_invite_token};
