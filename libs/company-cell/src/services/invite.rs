use rand::RngCore;
use uuid::Uuid;

/// 16 random bytes, hex encoded.
pub fn generate_invite_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn build_invite_link(front_url: &str, company_id: Uuid, token: &str) -> String {
    format!(
        "{}/register/patient?companyId={}&token={}",
        front_url.trim_end_matches('/'),
        company_id,
        urlencoding::encode(token)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_32_hex_chars_and_unique() {
        let a = generate_invite_token();
        let b = generate_invite_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn link_points_at_patient_registration() {
        let id = Uuid::nil();
        assert_eq!(
            build_invite_link("http://front.test/", id, "abc"),
            format!("http://front.test/register/patient?companyId={}&token=abc", id)
        );
    }
}
