use serde::{Deserialize, Serialize};

/// Identity columns embedded into profile rows (`select=*,user:users(email,active)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedUser {
    pub email: String,
    pub active: bool,
}

/// PostgREST select clause that embeds the linked identity.
pub const PROFILE_WITH_USER: &str = "select=*,user:users(email,active)";
