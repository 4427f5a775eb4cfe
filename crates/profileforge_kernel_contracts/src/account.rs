#![forbid(unsafe_code)]

use std::fmt;

use crate::common::require_text;
use crate::profile::ProfileId;
use crate::{ContractViolation, SchemaVersion, UnixTimeMs, Validate};

pub const ACCOUNT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const SECRET_MIN_CHARS: usize = 6;
pub const SECRET_MAX_CHARS: usize = 256;
pub const FULL_NAME_MIN_CHARS: usize = 2;
pub const FULL_NAME_MAX_CHARS: usize = 128;
pub const EMAIL_MAX_CHARS: usize = 254;

/// Account key. Compared byte-for-byte, so `Ada@x.com` and `ada@x.com` are distinct accounts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Email(String);

impl Email {
    pub fn new(raw: impl Into<String>) -> Result<Self, ContractViolation> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "email",
                reason: "must not be empty",
            });
        }
        if raw.len() > EMAIL_MAX_CHARS {
            return Err(ContractViolation::InvalidValue {
                field: "email",
                reason: "must be <= 254 chars",
            });
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(ContractViolation::InvalidValue {
                field: "email",
                reason: "must not contain whitespace",
            });
        }
        let mut parts = raw.split('@');
        let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(domain), None) => (local, domain),
            _ => {
                return Err(ContractViolation::InvalidValue {
                    field: "email",
                    reason: "must contain exactly one '@'",
                })
            }
        };
        if local.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "email",
                reason: "local part must not be empty",
            });
        }
        let dot_inside = domain
            .char_indices()
            .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len());
        if !dot_inside {
            return Err(ContractViolation::InvalidValue {
                field: "email",
                reason: "domain must contain an inner '.'",
            });
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A plain secret as typed by the user. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountSecret(String);

impl AccountSecret {
    pub fn new(raw: impl Into<String>) -> Result<Self, ContractViolation> {
        let raw = raw.into();
        let count = raw.chars().count();
        if count < SECRET_MIN_CHARS {
            return Err(ContractViolation::InvalidValue {
                field: "secret",
                reason: "must be at least 6 characters",
            });
        }
        if count > SECRET_MAX_CHARS {
            return Err(ContractViolation::InvalidValue {
                field: "secret",
                reason: "must be <= 256 characters",
            });
        }
        Ok(Self(raw))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccountSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccountSecret(<redacted>)")
    }
}

/// Encoded salted digest of an account secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialDigest(String);

impl CredentialDigest {
    pub fn new(encoded: impl Into<String>) -> Result<Self, ContractViolation> {
        let encoded = encoded.into();
        if encoded.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "credential_digest",
                reason: "must not be empty",
            });
        }
        Ok(Self(encoded))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn validate_full_name(full_name: &str) -> Result<(), ContractViolation> {
    require_text(
        full_name,
        "full_name",
        FULL_NAME_MIN_CHARS,
        FULL_NAME_MAX_CHARS,
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationInput {
    pub schema_version: SchemaVersion,
    pub email: Email,
    pub secret: AccountSecret,
    pub full_name: String,
}

impl RegistrationInput {
    pub fn v1(
        email: Email,
        secret: AccountSecret,
        full_name: String,
    ) -> Result<Self, ContractViolation> {
        let input = Self {
            schema_version: ACCOUNT_CONTRACT_VERSION,
            email,
            secret,
            full_name: full_name.trim().to_string(),
        };
        input.validate()?;
        Ok(input)
    }
}

impl Validate for RegistrationInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ACCOUNT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "registration_input.schema_version",
                reason: "must match ACCOUNT_CONTRACT_VERSION",
            });
        }
        validate_full_name(&self.full_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub schema_version: SchemaVersion,
    pub email: Email,
    pub credential: CredentialDigest,
    pub profile_id: ProfileId,
    pub created_at: UnixTimeMs,
}

impl AccountRecord {
    pub fn v1(
        email: Email,
        credential: CredentialDigest,
        profile_id: ProfileId,
        created_at: UnixTimeMs,
    ) -> Self {
        Self {
            schema_version: ACCOUNT_CONTRACT_VERSION,
            email,
            credential,
            profile_id,
            created_at,
        }
    }
}

impl Validate for AccountRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ACCOUNT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "account_record.schema_version",
                reason: "must match ACCOUNT_CONTRACT_VERSION",
            });
        }
        if self.created_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "account_record.created_at",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_account_01_email_shape_is_enforced() {
        assert!(Email::new("a@x.com").is_ok());
        assert!(Email::new("first.last+tag@sub.example.org").is_ok());
        assert!(Email::new("").is_err());
        assert!(Email::new("no-at-sign.com").is_err());
        assert!(Email::new("two@@x.com").is_err());
        assert!(Email::new("@x.com").is_err());
        assert!(Email::new("a@localhost").is_err());
        assert!(Email::new("a@.com").is_err());
        assert!(Email::new("a@x.").is_err());
        assert!(Email::new(" a@x.com").is_err());
    }

    #[test]
    fn at_account_02_email_is_case_sensitive() {
        assert_ne!(Email::new("Ada@x.com").unwrap(), Email::new("ada@x.com").unwrap());
    }

    #[test]
    fn at_account_03_secret_length_bounds() {
        assert!(AccountSecret::new("12345").is_err());
        assert!(AccountSecret::new("123456").is_ok());
        assert!(AccountSecret::new("x".repeat(257)).is_err());
    }

    #[test]
    fn at_account_04_secret_debug_is_redacted() {
        let secret = AccountSecret::new("hunter22").unwrap();
        assert!(!format!("{secret:?}").contains("hunter22"));
    }

    #[test]
    fn at_account_05_registration_requires_two_char_name() {
        let email = Email::new("a@x.com").unwrap();
        let secret = AccountSecret::new("secret123").unwrap();
        assert!(RegistrationInput::v1(email.clone(), secret.clone(), "A".to_string()).is_err());
        assert!(RegistrationInput::v1(email.clone(), secret.clone(), "   ".to_string()).is_err());
        let ok = RegistrationInput::v1(email, secret, "  Ada ".to_string()).unwrap();
        assert_eq!(ok.full_name, "Ada");
    }
}
