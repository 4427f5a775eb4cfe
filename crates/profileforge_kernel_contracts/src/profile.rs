#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::fmt;

use url::Url;

use crate::account::{validate_full_name, Email, EMAIL_MAX_CHARS};
use crate::common::{normalize_optional, require_text};
use crate::{ContractViolation, SchemaVersion, UnixTimeMs, Validate};

pub const PROFILE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const DEFAULT_HEADLINE: &str = "New ProfileForge User";
pub const DEFAULT_BIO: &str = "Excited to build my profile!";
pub const PLACEHOLDER_AVATAR_BASE: &str = "https://placehold.co/200x200.png?text=";

const HEADLINE_MAX_CHARS: usize = 200;
const BIO_MAX_CHARS: usize = 4000;
const SKILL_MAX_CHARS: usize = 64;
const ENTRY_TEXT_MAX_CHARS: usize = 200;
const DESCRIPTION_MAX_CHARS: usize = 4000;
const PROFILE_ID_PREFIX: &str = "profile_";
const U64_MAX_DIGITS: usize = 20;
/// Large enough for any id `ProfileId::synthesize` can produce.
const ID_MAX_CHARS: usize = PROFILE_ID_PREFIX.len() + EMAIL_MAX_CHARS + 1 + U64_MAX_DIGITS;

fn validate_token(raw: &str, field: &'static str) -> Result<(), ContractViolation> {
    if raw.is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not be empty",
        });
    }
    if raw.len() > ID_MAX_CHARS {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "is too long",
        });
    }
    if raw.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not contain whitespace or '/'",
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProfileId(String);

impl ProfileId {
    pub fn new(raw: impl Into<String>) -> Result<Self, ContractViolation> {
        let raw = raw.into();
        validate_token(&raw, "profile_id")?;
        Ok(Self(raw))
    }

    /// `profile_<email with non-alphanumerics stripped>_<unix ms>`.
    ///
    /// Two registrations of the same email in the same millisecond would collide; the
    /// account table rejects the second one before this matters.
    pub fn synthesize(email: &Email, now: UnixTimeMs) -> Self {
        let sanitized: String = email
            .as_str()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        Self(format!("{PROFILE_ID_PREFIX}{sanitized}_{}", now.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a work or education row within one profile.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(raw: impl Into<String>) -> Result<Self, ContractViolation> {
        let raw = raw.into();
        validate_token(&raw, "entry_id")?;
        Ok(Self(raw))
    }

    /// `<work|edu>_<unix ms>_<seq>`.
    pub fn generated(kind: EntryKind, now: UnixTimeMs, seq: u64) -> Self {
        Self(format!("{}_{}_{}", kind.id_prefix(), now.0, seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Work,
    Education,
}

impl EntryKind {
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Education => "edu",
        }
    }
}

fn period_label(start_date: &str, end_date: Option<&str>) -> String {
    format!("{} - {}", start_date, end_date.unwrap_or("Present"))
}

fn validate_period(
    start_date: &str,
    end_date: Option<&str>,
    start_field: &'static str,
    end_field: &'static str,
) -> Result<(), ContractViolation> {
    require_text(start_date, start_field, 1, ENTRY_TEXT_MAX_CHARS)?;
    if let Some(end) = end_date {
        require_text(end, end_field, 1, ENTRY_TEXT_MAX_CHARS)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkExperience {
    pub id: Option<EntryId>,
    pub company: String,
    pub role: String,
    pub start_date: String,
    /// `None` means the position is ongoing.
    pub end_date: Option<String>,
    pub description: String,
}

impl WorkExperience {
    pub fn v1(
        id: Option<EntryId>,
        company: String,
        role: String,
        start_date: String,
        end_date: Option<String>,
        description: String,
    ) -> Result<Self, ContractViolation> {
        let entry = Self {
            id,
            company: company.trim().to_string(),
            role: role.trim().to_string(),
            start_date: start_date.trim().to_string(),
            end_date: normalize_optional(end_date),
            description,
        };
        entry.validate()?;
        Ok(entry)
    }

    pub fn period_label(&self) -> String {
        period_label(&self.start_date, self.end_date.as_deref())
    }

    pub fn is_ongoing(&self) -> bool {
        self.end_date.is_none()
    }
}

impl Validate for WorkExperience {
    fn validate(&self) -> Result<(), ContractViolation> {
        require_text(
            &self.company,
            "work_experience.company",
            1,
            ENTRY_TEXT_MAX_CHARS,
        )?;
        require_text(&self.role, "work_experience.role", 1, ENTRY_TEXT_MAX_CHARS)?;
        validate_period(
            &self.start_date,
            self.end_date.as_deref(),
            "work_experience.start_date",
            "work_experience.end_date",
        )?;
        if self.description.chars().count() > DESCRIPTION_MAX_CHARS {
            return Err(ContractViolation::InvalidValue {
                field: "work_experience.description",
                reason: "is too long",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Education {
    pub id: Option<EntryId>,
    pub institution: String,
    pub degree: String,
    pub start_date: String,
    pub end_date: Option<String>,
    pub description: String,
}

impl Education {
    pub fn v1(
        id: Option<EntryId>,
        institution: String,
        degree: String,
        start_date: String,
        end_date: Option<String>,
        description: String,
    ) -> Result<Self, ContractViolation> {
        let entry = Self {
            id,
            institution: institution.trim().to_string(),
            degree: degree.trim().to_string(),
            start_date: start_date.trim().to_string(),
            end_date: normalize_optional(end_date),
            description,
        };
        entry.validate()?;
        Ok(entry)
    }

    pub fn period_label(&self) -> String {
        period_label(&self.start_date, self.end_date.as_deref())
    }
}

impl Validate for Education {
    fn validate(&self) -> Result<(), ContractViolation> {
        require_text(
            &self.institution,
            "education.institution",
            1,
            ENTRY_TEXT_MAX_CHARS,
        )?;
        require_text(&self.degree, "education.degree", 1, ENTRY_TEXT_MAX_CHARS)?;
        validate_period(
            &self.start_date,
            self.end_date.as_deref(),
            "education.start_date",
            "education.end_date",
        )?;
        if self.description.chars().count() > DESCRIPTION_MAX_CHARS {
            return Err(ContractViolation::InvalidValue {
                field: "education.description",
                reason: "is too long",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub schema_version: SchemaVersion,
    pub id: ProfileId,
    pub full_name: String,
    pub headline: String,
    pub bio: String,
    pub profile_picture_url: Option<String>,
    pub email: Email,
    pub linkedin_url: Option<String>,
    pub github_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub work_experience: Vec<WorkExperience>,
    pub education: Vec<Education>,
    pub skills: Vec<String>,
}

impl Profile {
    /// Fresh profile created alongside a new account.
    pub fn for_registration(id: ProfileId, email: Email, full_name: &str) -> Self {
        let full_name = full_name.trim().to_string();
        let initial: String = full_name.chars().take(1).collect();
        Self {
            schema_version: PROFILE_CONTRACT_VERSION,
            id,
            full_name,
            headline: DEFAULT_HEADLINE.to_string(),
            bio: DEFAULT_BIO.to_string(),
            profile_picture_url: Some(format!("{PLACEHOLDER_AVATAR_BASE}{initial}")),
            email,
            linkedin_url: None,
            github_url: None,
            portfolio_url: None,
            work_experience: Vec::new(),
            education: Vec::new(),
            skills: Vec::new(),
        }
    }

    /// Trims free text and collapses blank optional fields to `None`.
    pub fn normalized(mut self) -> Self {
        self.full_name = self.full_name.trim().to_string();
        self.headline = self.headline.trim().to_string();
        self.profile_picture_url = normalize_optional(self.profile_picture_url);
        self.linkedin_url = normalize_optional(self.linkedin_url);
        self.github_url = normalize_optional(self.github_url);
        self.portfolio_url = normalize_optional(self.portfolio_url);
        for w in &mut self.work_experience {
            w.company = w.company.trim().to_string();
            w.role = w.role.trim().to_string();
            w.start_date = w.start_date.trim().to_string();
            w.end_date = normalize_optional(w.end_date.take());
        }
        for e in &mut self.education {
            e.institution = e.institution.trim().to_string();
            e.degree = e.degree.trim().to_string();
            e.start_date = e.start_date.trim().to_string();
            e.end_date = normalize_optional(e.end_date.take());
        }
        self.skills = self
            .skills
            .into_iter()
            .map(|s| s.trim().to_string())
            .collect();
        self
    }

    pub fn initial(&self) -> Option<char> {
        self.full_name.chars().next()
    }

    pub fn all_entry_ids_assigned(&self) -> bool {
        self.work_experience.iter().all(|w| w.id.is_some())
            && self.education.iter().all(|e| e.id.is_some())
    }

    pub fn entry_ids(&self, kind: EntryKind) -> BTreeSet<&EntryId> {
        match kind {
            EntryKind::Work => self
                .work_experience
                .iter()
                .filter_map(|w| w.id.as_ref())
                .collect(),
            EntryKind::Education => self
                .education
                .iter()
                .filter_map(|e| e.id.as_ref())
                .collect(),
        }
    }
}

fn validate_link(value: Option<&str>, field: &'static str) -> Result<(), ContractViolation> {
    let Some(raw) = value else {
        return Ok(());
    };
    let parsed = Url::parse(raw).map_err(|_| ContractViolation::InvalidValue {
        field,
        reason: "must be an absolute URL",
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must use http or https",
        });
    }
    Ok(())
}

fn ensure_unique_ids<'a>(
    ids: impl Iterator<Item = &'a EntryId>,
    field: &'static str,
) -> Result<(), ContractViolation> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ContractViolation::InvalidValue {
                field,
                reason: "must be unique within the profile",
            });
        }
    }
    Ok(())
}

impl Validate for Profile {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != PROFILE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "profile.schema_version",
                reason: "must match PROFILE_CONTRACT_VERSION",
            });
        }
        validate_full_name(&self.full_name)?;
        require_text(&self.headline, "profile.headline", 1, HEADLINE_MAX_CHARS)?;
        if self.bio.chars().count() > BIO_MAX_CHARS {
            return Err(ContractViolation::InvalidValue {
                field: "profile.bio",
                reason: "is too long",
            });
        }
        validate_link(
            self.profile_picture_url.as_deref(),
            "profile.profile_picture_url",
        )?;
        validate_link(self.linkedin_url.as_deref(), "profile.linkedin_url")?;
        validate_link(self.github_url.as_deref(), "profile.github_url")?;
        validate_link(self.portfolio_url.as_deref(), "profile.portfolio_url")?;
        for w in &self.work_experience {
            w.validate()?;
        }
        for e in &self.education {
            e.validate()?;
        }
        ensure_unique_ids(
            self.work_experience.iter().filter_map(|w| w.id.as_ref()),
            "profile.work_experience.id",
        )?;
        ensure_unique_ids(
            self.education.iter().filter_map(|e| e.id.as_ref()),
            "profile.education.id",
        )?;
        for skill in &self.skills {
            require_text(skill, "profile.skills", 1, SKILL_MAX_CHARS)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> Email {
        Email::new("a.b+c@x.com").unwrap()
    }

    fn work(id: Option<&str>) -> WorkExperience {
        WorkExperience::v1(
            id.map(|v| EntryId::new(v).unwrap()),
            "Acme".to_string(),
            "Engineer".to_string(),
            "2020-01".to_string(),
            None,
            String::new(),
        )
        .unwrap()
    }

    #[test]
    fn at_profile_01_synthesized_id_strips_non_alphanumerics() {
        let id = ProfileId::synthesize(&email(), UnixTimeMs(1_700_000_000_000));
        assert_eq!(id.as_str(), "profile_abcxcom_1700000000000");
    }

    #[test]
    fn at_profile_02_registration_defaults() {
        let p = Profile::for_registration(
            ProfileId::new("profile_x_1").unwrap(),
            email(),
            " Ada ",
        );
        assert_eq!(p.full_name, "Ada");
        assert_eq!(p.headline, DEFAULT_HEADLINE);
        assert_eq!(p.bio, DEFAULT_BIO);
        assert_eq!(
            p.profile_picture_url.as_deref(),
            Some("https://placehold.co/200x200.png?text=A")
        );
        assert!(p.work_experience.is_empty());
        assert!(p.education.is_empty());
        assert!(p.skills.is_empty());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn at_profile_03_period_label_shows_present_for_open_end() {
        let mut w = work(Some("w1"));
        assert_eq!(w.period_label(), "2020-01 - Present");
        assert!(w.is_ongoing());
        w.end_date = Some("2022-06".to_string());
        assert_eq!(w.period_label(), "2020-01 - 2022-06");
    }

    #[test]
    fn at_profile_04_entry_requires_core_fields() {
        let err = WorkExperience::v1(
            None,
            " ".to_string(),
            "Engineer".to_string(),
            "2020".to_string(),
            None,
            String::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ContractViolation::InvalidValue {
                field: "work_experience.company",
                reason: "must not be empty",
            }
        );
        assert!(Education::v1(
            None,
            "MIT".to_string(),
            "BSc".to_string(),
            "".to_string(),
            Some("".to_string()),
            String::new(),
        )
        .is_err());
    }

    #[test]
    fn at_profile_05_empty_end_date_normalizes_to_ongoing() {
        let e = Education::v1(
            None,
            "MIT".to_string(),
            "BSc".to_string(),
            "2016".to_string(),
            Some("  ".to_string()),
            String::new(),
        )
        .unwrap();
        assert_eq!(e.end_date, None);
        assert_eq!(e.period_label(), "2016 - Present");
    }

    #[test]
    fn at_profile_06_links_must_be_http_urls() {
        let mut p = Profile::for_registration(ProfileId::new("p1").unwrap(), email(), "Ada");
        p.github_url = Some("not a url".to_string());
        assert!(p.validate().is_err());
        p.github_url = Some("ftp://github.com/ada".to_string());
        assert!(p.validate().is_err());
        p.github_url = Some("https://github.com/ada".to_string());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn at_profile_07_normalized_blank_links_become_absent() {
        let mut p = Profile::for_registration(ProfileId::new("p1").unwrap(), email(), "Ada");
        p.linkedin_url = Some(String::new());
        p.skills = vec![" Rust ".to_string()];
        let p = p.normalized();
        assert_eq!(p.linkedin_url, None);
        assert_eq!(p.skills, vec!["Rust".to_string()]);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn at_profile_08_duplicate_entry_ids_rejected_and_blank_skills_rejected() {
        let mut p = Profile::for_registration(ProfileId::new("p1").unwrap(), email(), "Ada");
        p.work_experience = vec![work(Some("w1")), work(Some("w1"))];
        assert!(p.validate().is_err());
        p.work_experience = vec![work(Some("w1")), work(None)];
        assert!(p.validate().is_ok());
        assert!(!p.all_entry_ids_assigned());
        p.skills = vec!["Go".to_string(), "".to_string()];
        assert!(p.validate().is_err());
    }

    #[test]
    fn at_profile_09_duplicate_skills_are_allowed() {
        let mut p = Profile::for_registration(ProfileId::new("p1").unwrap(), email(), "Ada");
        p.skills = vec!["Rust".to_string(), "Rust".to_string()];
        assert!(p.validate().is_ok());
    }

    #[test]
    fn at_profile_10_ids_reject_whitespace_and_slashes() {
        assert!(ProfileId::new("").is_err());
        assert!(ProfileId::new("a b").is_err());
        assert!(ProfileId::new("a/b").is_err());
        assert!(EntryId::new("work_1_0.25").is_ok());
        assert_eq!(
            EntryId::generated(EntryKind::Education, UnixTimeMs(5), 2).as_str(),
            "edu_5_2"
        );
    }

    #[test]
    fn at_profile_11_longest_email_yields_an_id_that_parses_back() {
        let local = "a".repeat(EMAIL_MAX_CHARS - "@b.co".len());
        let email = Email::new(format!("{local}@b.co")).unwrap();
        let id = ProfileId::synthesize(&email, UnixTimeMs(u64::MAX));
        assert_eq!(ProfileId::new(id.as_str()).unwrap(), id);
        assert!(ProfileId::new("p".repeat(ID_MAX_CHARS + 1)).is_err());
    }

    #[test]
    fn at_profile_12_normalized_trims_entry_fields() {
        let mut profile =
            Profile::for_registration(ProfileId::new("profile_x_1").unwrap(), email(), "Ada");
        let mut w = work(None);
        w.company = "  Acme ".to_string();
        w.role = " Engineer".to_string();
        w.start_date = "2020-01 ".to_string();
        profile.work_experience.push(w);
        profile.education.push(Education {
            id: None,
            institution: " Cambridge ".to_string(),
            degree: "BA ".to_string(),
            start_date: " 2012".to_string(),
            end_date: Some("  ".to_string()),
            description: String::new(),
        });
        let profile = profile.normalized();
        assert_eq!(profile.work_experience[0].company, "Acme");
        assert_eq!(profile.work_experience[0].role, "Engineer");
        assert_eq!(profile.work_experience[0].start_date, "2020-01");
        assert_eq!(profile.education[0].institution, "Cambridge");
        assert_eq!(profile.education[0].degree, "BA");
        assert_eq!(profile.education[0].start_date, "2012");
        assert_eq!(profile.education[0].end_date, None);
    }
}
