#![forbid(unsafe_code)]

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use profileforge_kernel_contracts::account::{AccountSecret, CredentialDigest};
use profileforge_kernel_contracts::ContractViolation;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub const DEFAULT_ITERATIONS: u32 = 60_000;
pub const MIN_CONFIGURED_ITERATIONS: u32 = 1_000;
pub const MAX_CONFIGURED_ITERATIONS: u32 = 1_000_000;

const DIGEST_SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const DIGEST_LEN: usize = 32;

#[derive(Debug)]
pub enum CredentialError {
    MalformedDigest,
    Decode(base64::DecodeError),
    ContractViolation(ContractViolation),
}

impl std::fmt::Display for CredentialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedDigest => write!(f, "malformed credential digest"),
            Self::Decode(err) => write!(f, "decode error: {err}"),
            Self::ContractViolation(v) => write!(f, "contract violation: {v}"),
        }
    }
}

impl std::error::Error for CredentialError {}

impl From<base64::DecodeError> for CredentialError {
    fn from(value: base64::DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl From<ContractViolation> for CredentialError {
    fn from(value: ContractViolation) -> Self {
        Self::ContractViolation(value)
    }
}

/// PBKDF2-HMAC-SHA256 digests for account secrets.
///
/// Encoded form: `pbkdf2-sha256$<iterations>$<salt b64>$<digest b64>`. Verification reads the
/// iteration count from the digest, so changing the configured count only affects new
/// accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialHasher {
    iterations: u32,
}

impl CredentialHasher {
    pub fn mvp_default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }

    pub fn with_iterations(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn hash_secret(&self, secret: &AccountSecret) -> Result<CredentialDigest, CredentialError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let digest = derive(&salt, secret.expose().as_bytes(), self.iterations);
        let encoded = format!(
            "{DIGEST_SCHEME}${}${}${}",
            self.iterations,
            BASE64.encode(salt),
            BASE64.encode(digest)
        );
        Ok(CredentialDigest::new(encoded)?)
    }

    /// Constant-time check of `candidate` against a stored digest. Malformed digests never
    /// verify.
    pub fn verify_secret(&self, candidate: &str, stored: &CredentialDigest) -> bool {
        match decode_digest(stored) {
            Ok((iterations, salt, expected)) => {
                let actual = derive(&salt, candidate.as_bytes(), iterations);
                constant_time_eq(&actual, &expected)
            }
            Err(_) => false,
        }
    }

    /// Burns the same work as a real verification and always fails. Used when the account
    /// does not exist so both failure causes cost the same.
    pub fn verify_against_absent_account(&self, candidate: &str) -> bool {
        let actual = derive(&[0u8; SALT_LEN], candidate.as_bytes(), self.iterations);
        let _ = constant_time_eq(&actual, &[0u8; DIGEST_LEN]);
        false
    }
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::mvp_default()
    }
}

fn derive(salt: &[u8], secret: &[u8], iterations: u32) -> [u8; DIGEST_LEN] {
    let mut key = [0u8; DIGEST_LEN];
    pbkdf2_hmac::<Sha256>(secret, salt, iterations, &mut key);
    key
}

fn decode_digest(
    stored: &CredentialDigest,
) -> Result<(u32, Vec<u8>, Vec<u8>), CredentialError> {
    let mut parts = stored.as_str().split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(digest), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(CredentialError::MalformedDigest);
    };
    if scheme != DIGEST_SCHEME {
        return Err(CredentialError::MalformedDigest);
    }
    let iterations = iterations
        .parse::<u32>()
        .ok()
        .filter(|v| *v >= 1)
        .ok_or(CredentialError::MalformedDigest)?;
    let salt = BASE64.decode(salt.as_bytes())?;
    let digest = BASE64.decode(digest.as_bytes())?;
    if salt.len() != SALT_LEN || digest.len() != DIGEST_LEN {
        return Err(CredentialError::MalformedDigest);
    }
    Ok((iterations, salt, digest))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> CredentialHasher {
        CredentialHasher::with_iterations(8)
    }

    fn secret(raw: &str) -> AccountSecret {
        AccountSecret::new(raw).unwrap()
    }

    #[test]
    fn at_cred_01_hash_then_verify() {
        let h = hasher();
        let digest = h.hash_secret(&secret("secret123")).unwrap();
        assert!(h.verify_secret("secret123", &digest));
        assert!(!h.verify_secret("secret124", &digest));
        assert!(!h.verify_secret("", &digest));
    }

    #[test]
    fn at_cred_02_digest_never_contains_plain_secret_and_is_salted() {
        let h = hasher();
        let a = h.hash_secret(&secret("secret123")).unwrap();
        let b = h.hash_secret(&secret("secret123")).unwrap();
        assert!(!a.as_str().contains("secret123"));
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("pbkdf2-sha256$8$"));
    }

    #[test]
    fn at_cred_03_verification_uses_iterations_from_digest() {
        let digest = CredentialHasher::with_iterations(3)
            .hash_secret(&secret("secret123"))
            .unwrap();
        assert!(CredentialHasher::with_iterations(50).verify_secret("secret123", &digest));
    }

    #[test]
    fn at_cred_04_malformed_digest_fails_closed() {
        let h = hasher();
        for raw in [
            "plaintext",
            "pbkdf2-sha256$8$AAAA$AAAA",
            "sha256i$8$AAAAAAAAAAAAAAAAAAAAAA==$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=",
            "pbkdf2-sha256$zero$AAAAAAAAAAAAAAAAAAAAAA==$AAAA",
            "pbkdf2-sha256$8$!!$??",
        ] {
            let digest = CredentialDigest::new(raw).unwrap();
            assert!(!h.verify_secret("anything", &digest), "{raw}");
        }
    }

    #[test]
    fn at_cred_05_absent_account_never_verifies() {
        assert!(!hasher().verify_against_absent_account("secret123"));
    }

    #[test]
    fn at_cred_06_constant_time_eq_matches_plain_equality() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    #[test]
    fn at_cred_07_derivation_matches_pbkdf2_hmac_sha256_vector() {
        let key = derive(b"salt", b"passwd", 1);
        let expected: [u8; DIGEST_LEN] = [
            0x55, 0xac, 0x04, 0x6e, 0x56, 0xe3, 0x08, 0x9f, 0xec, 0x16, 0x91, 0xc2, 0x25, 0x44,
            0xb6, 0x05, 0xf9, 0x41, 0x85, 0x21, 0x6d, 0xde, 0x04, 0x65, 0xe6, 0x8b, 0x9d, 0x57,
            0xc2, 0x0d, 0xac, 0xbc,
        ];
        assert_eq!(key, expected);
    }

    #[test]
    fn at_cred_08_digest_written_by_hash_secret_decodes() {
        let h = hasher();
        let digest = h.hash_secret(&secret("secret123")).unwrap();
        let (iterations, salt, key) = decode_digest(&digest).unwrap();
        assert_eq!(iterations, 8);
        assert_eq!(salt.len(), SALT_LEN);
        assert_eq!(key, derive(&salt, b"secret123", 8).to_vec());
    }
}
