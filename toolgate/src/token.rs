//! Access-token generation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;

const TOKEN_BYTES: usize = 32;

/// Generates a 256-bit random access token, base64url-encoded without
/// padding (43 characters). Uses the thread-local CSPRNG.
pub fn generate_access_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_43_chars_unpadded() {
        let token = generate_access_token();
        assert_eq!(token.len(), 43);
        assert!(!token.contains('='));
    }

    #[test]
    fn test_token_uses_urlsafe_alphabet() {
        let token = generate_access_token();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = generate_access_token();
        let b = generate_access_token();
        assert_ne!(a, b);
    }
}
