//! Loading RSA key material.
//!
//! Keys are validated when loaded so that malformed material fails at
//! construction rather than on first use.

use crate::error::TokenError;
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::path::Path;

/// Parse a PEM-encoded RSA private key (PKCS#1 or PKCS#8) for signing.
pub fn load_private_key(pem: &[u8]) -> Result<EncodingKey, TokenError> {
    let text = pem_text(pem)?;
    if RsaPrivateKey::from_pkcs1_pem(text).is_err() {
        RsaPrivateKey::from_pkcs8_pem(text)
            .map_err(|e| TokenError::InvalidKey(format!("not an RSA private key: {e}")))?;
    }

    EncodingKey::from_rsa_pem(pem).map_err(|e| TokenError::InvalidKey(e.to_string()))
}

/// Parse a PEM-encoded RSA public key (SPKI or PKCS#1) for verification.
pub fn load_public_key(pem: &[u8]) -> Result<DecodingKey, TokenError> {
    let text = pem_text(pem)?;
    if RsaPublicKey::from_public_key_pem(text).is_err() {
        RsaPublicKey::from_pkcs1_pem(text)
            .map_err(|e| TokenError::InvalidKey(format!("not an RSA public key: {e}")))?;
    }

    DecodingKey::from_rsa_pem(pem).map_err(|e| TokenError::InvalidKey(e.to_string()))
}

/// Load a private key from a PEM file.
pub fn load_private_key_file(path: &Path) -> Result<EncodingKey, TokenError> {
    let pem = std::fs::read(path)
        .map_err(|e| TokenError::InvalidKey(format!("{}: {e}", path.display())))?;
    load_private_key(&pem)
}

/// Load a public key from a PEM file.
pub fn load_public_key_file(path: &Path) -> Result<DecodingKey, TokenError> {
    let pem = std::fs::read(path)
        .map_err(|e| TokenError::InvalidKey(format!("{}: {e}", path.display())))?;
    load_public_key(&pem)
}

fn pem_text(pem: &[u8]) -> Result<&str, TokenError> {
    std::str::from_utf8(pem)
        .map(str::trim)
        .map_err(|_| TokenError::InvalidKey("key is not valid UTF-8 PEM".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PRIVATE_KEY: &[u8] = include_bytes!("../tests/fixtures/signing_key.pem");
    const PUBLIC_KEY: &[u8] = include_bytes!("../tests/fixtures/signing_key.pub.pem");

    #[test]
    fn test_load_fixture_keys() {
        assert!(load_private_key(PRIVATE_KEY).is_ok());
        assert!(load_public_key(PUBLIC_KEY).is_ok());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            load_private_key(b"invalidkey"),
            Err(TokenError::InvalidKey(_))
        ));
        assert!(matches!(
            load_public_key(b"invalidkey"),
            Err(TokenError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_rejects_swapped_keys() {
        assert!(load_private_key(PUBLIC_KEY).is_err());
        assert!(load_public_key(PRIVATE_KEY).is_err());
    }

    #[test]
    fn test_rejects_truncated_pem() {
        let text = std::str::from_utf8(PRIVATE_KEY).unwrap();
        let truncated: String = text.lines().take(5).collect::<Vec<_>>().join("\n");
        let broken = format!("{truncated}\n-----END RSA PRIVATE KEY-----\n");
        assert!(load_private_key(broken.as_bytes()).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(PUBLIC_KEY).unwrap();
        assert!(load_public_key_file(file.path()).is_ok());
        assert!(load_public_key_file(Path::new("/nonexistent/key.pem")).is_err());
    }
}
