#![forbid(unsafe_code)]

use profileforge_kernel_contracts::account::{AccountRecord, CredentialDigest, Email};
use profileforge_kernel_contracts::profile::{Education, EntryId, Profile, ProfileId};
use profileforge_kernel_contracts::UnixTimeMs;
use profileforge_storage::repo::ProfileRepo;
use profileforge_storage::store::{ProfileForgeStore, StorageError};

fn email(raw: &str) -> Email {
    Email::new(raw).unwrap()
}

fn digest() -> CredentialDigest {
    CredentialDigest::new("pbkdf2-sha256$1000$c2FsdHNhbHRzYWx0c2FsdA==$ZGlnZXN0").unwrap()
}

fn register_rows<R: ProfileRepo>(repo: &mut R, raw_email: &str, t: u64) -> ProfileId {
    let email = email(raw_email);
    let id = ProfileId::synthesize(&email, UnixTimeMs(t));
    repo.insert_account_row(
        AccountRecord::v1(email.clone(), digest(), id.clone(), UnixTimeMs(t)),
        Profile::for_registration(id.clone(), email, "Grace Hopper"),
    )
    .unwrap();
    id
}

fn education(id: &str) -> Education {
    Education::v1(
        Some(EntryId::new(id).unwrap()),
        "Yale".to_string(),
        "PhD Mathematics".to_string(),
        "1930".to_string(),
        Some("1934".to_string()),
        String::new(),
    )
    .unwrap()
}

#[test]
fn at_pf_db_01_every_account_resolves_to_exactly_one_profile() {
    let mut s = ProfileForgeStore::new_in_memory();
    register_rows(&mut s, "grace@navy.mil", 100);
    register_rows(&mut s, "ada@engine.org", 101);

    assert_eq!(s.account_rows().len(), 2);
    assert_eq!(s.profile_rows().len(), 2);
    for (key, account) in s.account_rows() {
        let profile = s.get_profile_row(&account.profile_id).unwrap();
        assert_eq!(&profile.email, key);
    }
}

#[test]
fn at_pf_db_02_duplicate_account_is_rejected_without_mutation() {
    let mut s = ProfileForgeStore::new_in_memory();
    let first = register_rows(&mut s, "grace@navy.mil", 100);
    let e = email("grace@navy.mil");
    let second = ProfileId::synthesize(&e, UnixTimeMs(200));
    let err = s
        .insert_account_row(
            AccountRecord::v1(e.clone(), digest(), second.clone(), UnixTimeMs(200)),
            Profile::for_registration(second.clone(), e.clone(), "Impostor"),
        )
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateKey { table: "accounts", .. }));
    assert_eq!(s.get_account_row(&e).unwrap().profile_id, first);
    assert!(s.get_profile_row(&second).is_none());
}

#[test]
fn at_pf_db_03_replace_keeps_entry_order_and_ids() {
    let mut s = ProfileForgeStore::new_in_memory();
    let id = register_rows(&mut s, "grace@navy.mil", 100);
    let mut edited = s.get_profile_row(&id).unwrap().clone();
    edited.education = vec![education("edu_2"), education("edu_1")];
    edited.skills = vec!["COBOL".to_string(), "COBOL".to_string()];
    s.replace_profile_row(edited).unwrap();

    let stored = s.get_profile_row(&id).unwrap();
    let ids: Vec<&str> = stored
        .education
        .iter()
        .map(|e| e.id.as_ref().unwrap().as_str())
        .collect();
    assert_eq!(ids, vec!["edu_2", "edu_1"]);
    assert_eq!(stored.skills.len(), 2);
}

#[test]
fn at_pf_db_04_replace_cannot_move_profile_to_another_account() {
    let mut s = ProfileForgeStore::new_in_memory();
    let grace = register_rows(&mut s, "grace@navy.mil", 100);
    register_rows(&mut s, "ada@engine.org", 101);

    let mut hijack = s.get_profile_row(&grace).unwrap().clone();
    hijack.email = email("ada@engine.org");
    assert!(s.replace_profile_row(hijack).is_err());
    assert_eq!(
        s.get_profile_row(&grace).unwrap().email,
        email("grace@navy.mil")
    );
}

#[test]
fn at_pf_db_05_missing_profile_lookup_is_absent() {
    let s = ProfileForgeStore::new_in_memory();
    assert!(s
        .get_profile_row(&ProfileId::new("profile_nobody_1").unwrap())
        .is_none());
    assert!(s.get_account_row(&email("nobody@x.com")).is_none());
}
