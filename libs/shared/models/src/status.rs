use serde::{Deserialize, Serialize};

/// `?status=` filter shared by the profile listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveFilter {
    #[default]
    All,
    Active,
    Inactive,
}

impl ActiveFilter {
    /// A profile counts as active only when both the profile and its identity are active.
    /// Profiles without an identity are judged on their own flag.
    pub fn matches(&self, profile_active: bool, user_active: Option<bool>) -> bool {
        let active = profile_active && user_active.unwrap_or(true);
        match self {
            ActiveFilter::All => true,
            ActiveFilter::Active => active,
            ActiveFilter::Inactive => !active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_when_either_flag_is_off() {
        assert!(ActiveFilter::Inactive.matches(true, Some(false)));
        assert!(ActiveFilter::Inactive.matches(false, Some(true)));
        assert!(!ActiveFilter::Inactive.matches(true, Some(true)));
        assert!(ActiveFilter::Active.matches(true, None));
        assert!(ActiveFilter::All.matches(false, Some(false)));
    }
}
