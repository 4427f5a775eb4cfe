#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use profileforge_kernel_contracts::account::{AccountRecord, Email};
use profileforge_kernel_contracts::profile::{Profile, ProfileId};

use crate::store::{ProfileForgeStore, StorageError};

/// Typed repository interface for account and profile persistence.
///
/// The session runtime only talks to this trait, so a file or database backed store can
/// replace `ProfileForgeStore` without touching callers.
pub trait ProfileRepo {
    fn insert_account_row(
        &mut self,
        account: AccountRecord,
        profile: Profile,
    ) -> Result<(), StorageError>;
    fn replace_profile_row(&mut self, profile: Profile) -> Result<(), StorageError>;

    fn get_account_row(&self, email: &Email) -> Option<&AccountRecord>;
    fn get_profile_row(&self, profile_id: &ProfileId) -> Option<&Profile>;
    fn account_rows(&self) -> &BTreeMap<Email, AccountRecord>;
    fn profile_rows(&self) -> &BTreeMap<ProfileId, Profile>;
}

impl ProfileRepo for ProfileForgeStore {
    fn insert_account_row(
        &mut self,
        account: AccountRecord,
        profile: Profile,
    ) -> Result<(), StorageError> {
        self.insert_account_with_profile(account, profile)
    }

    fn replace_profile_row(&mut self, profile: Profile) -> Result<(), StorageError> {
        self.replace_profile(profile)
    }

    fn get_account_row(&self, email: &Email) -> Option<&AccountRecord> {
        self.get_account(email)
    }

    fn get_profile_row(&self, profile_id: &ProfileId) -> Option<&Profile> {
        self.get_profile(profile_id)
    }

    fn account_rows(&self) -> &BTreeMap<Email, AccountRecord> {
        ProfileForgeStore::account_rows(self)
    }

    fn profile_rows(&self) -> &BTreeMap<ProfileId, Profile> {
        ProfileForgeStore::profile_rows(self)
    }
}
