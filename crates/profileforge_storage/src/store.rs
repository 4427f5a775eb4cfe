#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use profileforge_kernel_contracts::account::{AccountRecord, Email};
use profileforge_kernel_contracts::profile::{Profile, ProfileId};
use profileforge_kernel_contracts::{ContractViolation, Validate};

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    ForeignKeyViolation { table: &'static str, key: String },
    DuplicateKey { table: &'static str, key: String },
    NotFound { table: &'static str, key: String },
    ContractViolation(ContractViolation),
}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::ContractViolation(v)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForeignKeyViolation { table, key } => {
                write!(f, "foreign key violation on {table}: {key}")
            }
            Self::DuplicateKey { table, key } => write!(f, "duplicate key on {table}: {key}"),
            Self::NotFound { table, key } => write!(f, "row not found in {table}: {key}"),
            Self::ContractViolation(v) => write!(f, "contract violation: {v}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// In-memory account and profile tables.
///
/// Every account row points at exactly one profile row and the profile row carries the
/// account email; both links are checked on every write.
#[derive(Debug, Default, Clone)]
pub struct ProfileForgeStore {
    accounts: BTreeMap<Email, AccountRecord>,
    profiles: BTreeMap<ProfileId, Profile>,
}

impl ProfileForgeStore {
    pub fn new_in_memory() -> Self {
        Self {
            accounts: BTreeMap::new(),
            profiles: BTreeMap::new(),
        }
    }

    /// Inserts a new account and its profile together. Nothing is written unless both
    /// rows pass every check.
    pub fn insert_account_with_profile(
        &mut self,
        account: AccountRecord,
        profile: Profile,
    ) -> Result<(), StorageError> {
        account.validate()?;
        profile.validate()?;
        ensure_entry_ids_assigned(&profile)?;
        if account.profile_id != profile.id {
            return Err(StorageError::ForeignKeyViolation {
                table: "accounts.profile_id",
                key: account.profile_id.as_str().to_string(),
            });
        }
        if profile.email != account.email {
            return Err(StorageError::ContractViolation(
                ContractViolation::InvalidValue {
                    field: "profiles.email",
                    reason: "must equal the owning account email",
                },
            ));
        }
        if self.accounts.contains_key(&account.email) {
            return Err(StorageError::DuplicateKey {
                table: "accounts",
                key: account.email.as_str().to_string(),
            });
        }
        if self.profiles.contains_key(&profile.id) {
            return Err(StorageError::DuplicateKey {
                table: "profiles",
                key: profile.id.as_str().to_string(),
            });
        }
        self.profiles.insert(profile.id.clone(), profile);
        self.accounts.insert(account.email.clone(), account);
        Ok(())
    }

    /// Wholesale replacement of an existing profile row. `id` and `email` must still
    /// match the owning account.
    pub fn replace_profile(&mut self, profile: Profile) -> Result<(), StorageError> {
        profile.validate()?;
        ensure_entry_ids_assigned(&profile)?;
        let Some(existing) = self.profiles.get(&profile.id) else {
            return Err(StorageError::NotFound {
                table: "profiles",
                key: profile.id.as_str().to_string(),
            });
        };
        if existing.email != profile.email {
            return Err(StorageError::ContractViolation(
                ContractViolation::InvalidValue {
                    field: "profiles.email",
                    reason: "is immutable",
                },
            ));
        }
        match self.accounts.get(&profile.email) {
            Some(owner) if owner.profile_id == profile.id => {}
            _ => {
                return Err(StorageError::ForeignKeyViolation {
                    table: "profiles.email",
                    key: profile.email.as_str().to_string(),
                })
            }
        }
        self.profiles.insert(profile.id.clone(), profile);
        Ok(())
    }

    pub fn get_account(&self, email: &Email) -> Option<&AccountRecord> {
        self.accounts.get(email)
    }

    pub fn get_profile(&self, profile_id: &ProfileId) -> Option<&Profile> {
        self.profiles.get(profile_id)
    }

    /// Resolves an account key straight to its profile row.
    pub fn get_profile_for_account(&self, email: &Email) -> Option<&Profile> {
        self.accounts
            .get(email)
            .and_then(|account| self.profiles.get(&account.profile_id))
    }

    pub fn account_rows(&self) -> &BTreeMap<Email, AccountRecord> {
        &self.accounts
    }

    pub fn profile_rows(&self) -> &BTreeMap<ProfileId, Profile> {
        &self.profiles
    }
}

fn ensure_entry_ids_assigned(profile: &Profile) -> Result<(), StorageError> {
    if !profile.all_entry_ids_assigned() {
        return Err(StorageError::ContractViolation(
            ContractViolation::InvalidValue {
                field: "profiles.entry_id",
                reason: "must be assigned before storage",
            },
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use profileforge_kernel_contracts::account::CredentialDigest;
    use profileforge_kernel_contracts::profile::WorkExperience;
    use profileforge_kernel_contracts::UnixTimeMs;

    fn email(raw: &str) -> Email {
        Email::new(raw).unwrap()
    }

    fn rows(raw_email: &str, raw_id: &str) -> (AccountRecord, Profile) {
        let email = email(raw_email);
        let id = ProfileId::new(raw_id).unwrap();
        let account = AccountRecord::v1(
            email.clone(),
            CredentialDigest::new("pbkdf2-sha256$1$c2FsdA==$ZGlnZXN0").unwrap(),
            id.clone(),
            UnixTimeMs(10),
        );
        (account, Profile::for_registration(id, email, "Ada"))
    }

    #[test]
    fn at_store_01_insert_then_lookup_both_tables() {
        let mut s = ProfileForgeStore::new_in_memory();
        let (account, profile) = rows("a@x.com", "p_a");
        s.insert_account_with_profile(account, profile.clone())
            .unwrap();
        assert_eq!(
            s.get_account(&email("a@x.com")).unwrap().profile_id,
            profile.id
        );
        assert_eq!(s.get_profile(&profile.id), Some(&profile));
        assert_eq!(s.get_profile_for_account(&email("a@x.com")), Some(&profile));
    }

    #[test]
    fn at_store_02_duplicate_email_leaves_tables_unchanged() {
        let mut s = ProfileForgeStore::new_in_memory();
        let (account, profile) = rows("a@x.com", "p_a");
        s.insert_account_with_profile(account, profile).unwrap();
        let (account2, profile2) = rows("a@x.com", "p_b");
        assert!(matches!(
            s.insert_account_with_profile(account2, profile2),
            Err(StorageError::DuplicateKey {
                table: "accounts",
                ..
            })
        ));
        assert_eq!(s.account_rows().len(), 1);
        assert_eq!(s.profile_rows().len(), 1);
        assert!(s.get_profile(&ProfileId::new("p_b").unwrap()).is_none());
    }

    #[test]
    fn at_store_03_account_must_point_at_its_profile() {
        let mut s = ProfileForgeStore::new_in_memory();
        let (mut account, profile) = rows("a@x.com", "p_a");
        account.profile_id = ProfileId::new("p_other").unwrap();
        assert!(matches!(
            s.insert_account_with_profile(account, profile),
            Err(StorageError::ForeignKeyViolation { .. })
        ));
        assert!(s.account_rows().is_empty());
    }

    #[test]
    fn at_store_04_replace_rejects_email_drift_and_unknown_rows() {
        let mut s = ProfileForgeStore::new_in_memory();
        let (account, profile) = rows("a@x.com", "p_a");
        s.insert_account_with_profile(account, profile.clone())
            .unwrap();

        let mut drifted = profile.clone();
        drifted.email = email("b@x.com");
        assert!(matches!(
            s.replace_profile(drifted),
            Err(StorageError::ContractViolation(_))
        ));

        let (_, stranger) = rows("c@x.com", "p_c");
        assert!(matches!(
            s.replace_profile(stranger),
            Err(StorageError::NotFound { .. })
        ));
        assert_eq!(s.get_profile(&profile.id), Some(&profile));
    }

    #[test]
    fn at_store_05_replace_requires_assigned_entry_ids() {
        let mut s = ProfileForgeStore::new_in_memory();
        let (account, profile) = rows("a@x.com", "p_a");
        s.insert_account_with_profile(account, profile.clone())
            .unwrap();
        let mut edited = profile.clone();
        edited.work_experience.push(
            WorkExperience::v1(
                None,
                "Acme".to_string(),
                "Engineer".to_string(),
                "2020".to_string(),
                None,
                String::new(),
            )
            .unwrap(),
        );
        assert!(s.replace_profile(edited).is_err());
        assert_eq!(s.get_profile(&profile.id), Some(&profile));
    }
}
