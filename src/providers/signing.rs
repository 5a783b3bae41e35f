//! HMAC request signing shared by the exchange transports.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::{FetchError, FetchResult};

fn mac<M: Mac + KeyInit>(secret: &[u8], parts: &[&[u8]]) -> FetchResult<Vec<u8>> {
    let mut mac = <M as KeyInit>::new_from_slice(secret)
        .map_err(|e| FetchError::Auth(format!("unusable signing key: {e}")))?;
    for part in parts {
        Mac::update(&mut mac, part);
    }
    Ok(Mac::finalize(mac).into_bytes().to_vec())
}

pub(crate) fn hmac_sha256_hex(secret: &[u8], message: &str) -> FetchResult<String> {
    Ok(hex::encode(mac::<Hmac<Sha256>>(secret, &[message.as_bytes()])?))
}

pub(crate) fn hmac_sha384_hex(secret: &[u8], message: &str) -> FetchResult<String> {
    Ok(hex::encode(mac::<Hmac<Sha384>>(secret, &[message.as_bytes()])?))
}

pub(crate) fn hmac_sha512_hex(secret: &[u8], message: &str) -> FetchResult<String> {
    Ok(hex::encode(mac::<Hmac<Sha512>>(secret, &[message.as_bytes()])?))
}

/// Kraken `API-Sign`: base64(HMAC-SHA512(path + SHA256(nonce + body), secret)).
///
/// `secret` is the already base64-decoded API secret.
pub(crate) fn kraken_signature(
    secret: &[u8],
    uri_path: &str,
    nonce: u64,
    post_data: &str,
) -> FetchResult<String> {
    let mut sha256 = Sha256::new();
    sha256.update(nonce.to_string().as_bytes());
    sha256.update(post_data.as_bytes());
    let digest = sha256.finalize();

    let signature = mac::<Hmac<Sha512>>(secret, &[uri_path.as_bytes(), digest.as_slice()])?;
    Ok(BASE64.encode(signature))
}

/// Decode a base64 API secret (Kraken hands secrets out base64 encoded).
pub(crate) fn decode_base64_secret(secret: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(secret.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_sha256_matches_rfc4231_case_2() {
        let sig = hmac_sha256_hex(b"Jefe", "what do ya want for nothing?").unwrap();
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn hmac_sha512_matches_rfc4231_case_2() {
        let sig = hmac_sha512_hex(b"Jefe", "what do ya want for nothing?").unwrap();
        assert!(sig.starts_with("164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea250554"));
        assert_eq!(sig.len(), 128);
    }

    #[test]
    fn hmac_sha384_is_hex_encoded() {
        let sig = hmac_sha384_hex(b"secret", "AUTH1").unwrap();
        assert_eq!(sig.len(), 96);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn kraken_signature_is_deterministic_base64() {
        let secret = decode_base64_secret("c2VjcmV0").unwrap();
        assert_eq!(secret, b"secret");

        let a = kraken_signature(&secret, "/0/private/Balance", 42, "nonce=42").unwrap();
        let b = kraken_signature(&secret, "/0/private/Balance", 42, "nonce=42").unwrap();
        assert_eq!(a, b);
        // 64 byte HMAC-SHA512 encodes to 88 base64 chars.
        assert_eq!(a.len(), 88);
        assert_ne!(
            a,
            kraken_signature(&secret, "/0/private/Balance", 43, "nonce=43").unwrap()
        );
    }
}
