#![forbid(unsafe_code)]

use std::env;
use std::sync::{Arc, Mutex, TryLockError};

use profileforge_engines::session_marker::FileSessionMarker;
use profileforge_kernel_contracts::account::Email;
use profileforge_kernel_contracts::profile::{
    Education, EntryId, Profile, ProfileId, WorkExperience, PROFILE_CONTRACT_VERSION,
};
use profileforge_kernel_contracts::session::AuthOutcome;
use profileforge_kernel_contracts::ContractViolation;
use profileforge_os::auth::{AuthError, AuthRuntime, AuthRuntimeConfig, LoadingFlag};
use profileforge_storage::repo::ProfileRepo;
use profileforge_storage::store::ProfileForgeStore;

pub type ProfileForgeAuthRuntime = AuthRuntime<ProfileForgeStore, FileSessionMarker>;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RegisterAdapterRequest {
    pub email: String,
    pub secret: String,
    pub confirm_secret: Option<String>,
    pub full_name: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LoginAdapterRequest {
    pub email: String,
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WorkExperienceAdapterItem {
    #[serde(default)]
    pub id: Option<String>,
    pub company: String,
    pub role: String,
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EducationAdapterItem {
    #[serde(default)]
    pub id: Option<String>,
    pub institution: String,
    pub degree: String,
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// Wire shape of a profile, used for both the public view and the edit payload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProfileAdapterView {
    pub id: String,
    pub full_name: String,
    pub headline: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub profile_picture_url: Option<String>,
    pub email: String,
    #[serde(default)]
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub github_url: Option<String>,
    #[serde(default)]
    pub portfolio_url: Option<String>,
    #[serde(default)]
    pub work_experience: Vec<WorkExperienceAdapterItem>,
    #[serde(default)]
    pub education: Vec<EducationAdapterItem>,
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuthAdapterResponse {
    pub status: String,
    pub outcome: String,
    pub reason: Option<String>,
    pub profile: Option<ProfileAdapterView>,
    pub navigate_to: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionAdapterResponse {
    pub status: String,
    pub gate: String,
    /// `None` while `gate` is `LOADING`: the session is unknown, not absent.
    pub authenticated: Option<bool>,
    pub loading: bool,
    pub profile: Option<ProfileAdapterView>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AdapterHealthResponse {
    pub status: String,
    pub outcome: String,
    pub reason: Option<String>,
    pub account_count: usize,
    pub profile_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterFailureKind {
    InvalidInput,
    InvalidCredentials,
    Unauthorized,
    NotFound,
    AlreadyExists,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterFailure {
    pub kind: AdapterFailureKind,
    pub outcome: &'static str,
    pub reason: String,
}

impl AdapterFailure {
    fn internal(reason: impl Into<String>) -> Self {
        Self {
            kind: AdapterFailureKind::Internal,
            outcome: "INTERNAL",
            reason: reason.into(),
        }
    }

    fn invalid_input(v: ContractViolation) -> Self {
        Self {
            kind: AdapterFailureKind::InvalidInput,
            outcome: "INVALID_INPUT",
            reason: format!("invalid input: {v}"),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self.kind {
            AdapterFailureKind::InvalidInput => 400,
            AdapterFailureKind::InvalidCredentials | AdapterFailureKind::Unauthorized => 401,
            AdapterFailureKind::NotFound => 404,
            AdapterFailureKind::AlreadyExists => 409,
            AdapterFailureKind::Internal => 500,
        }
    }

    pub fn into_body(self) -> AuthAdapterResponse {
        AuthAdapterResponse {
            status: "error".to_string(),
            outcome: self.outcome.to_string(),
            reason: Some(self.reason),
            profile: None,
            navigate_to: None,
        }
    }
}

impl From<AuthError> for AdapterFailure {
    fn from(err: AuthError) -> Self {
        let kind = match &err {
            AuthError::AlreadyExists => AdapterFailureKind::AlreadyExists,
            AuthError::InvalidCredentials => AdapterFailureKind::InvalidCredentials,
            AuthError::Unauthorized => AdapterFailureKind::Unauthorized,
            AuthError::InvalidInput(_) => AdapterFailureKind::InvalidInput,
            AuthError::Storage(_) | AuthError::Credential(_) => AdapterFailureKind::Internal,
        };
        Self {
            kind,
            outcome: err.reason_code(),
            reason: err.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct AdapterRuntime {
    auth: Arc<Mutex<ProfileForgeAuthRuntime>>,
    loading: LoadingFlag,
}

impl AdapterRuntime {
    pub fn new(marker: FileSessionMarker, config: AuthRuntimeConfig) -> Self {
        let auth = AuthRuntime::start(ProfileForgeStore::new_in_memory(), marker, config);
        let loading = auth.loading_flag();
        Self {
            auth: Arc::new(Mutex::new(auth)),
            loading,
        }
    }

    pub fn default_from_env() -> Self {
        let config = AuthRuntimeConfig::from_env_var_map(|key| env::var(key).ok());
        Self::new(FileSessionMarker::default_local(), config)
    }

    pub fn register(
        &self,
        request: RegisterAdapterRequest,
    ) -> Result<AuthAdapterResponse, AdapterFailure> {
        if let Some(confirm) = &request.confirm_secret {
            if confirm != &request.secret {
                return Err(AdapterFailure::invalid_input(
                    ContractViolation::InvalidValue {
                        field: "confirm_secret",
                        reason: "must match secret",
                    },
                ));
            }
        }
        let mut auth = self.lock_auth()?;
        let outcome = auth.register(&request.email, &request.secret, &request.full_name)?;
        Ok(ok_response("REGISTERED", outcome))
    }

    pub fn login(&self, request: LoginAdapterRequest) -> Result<AuthAdapterResponse, AdapterFailure> {
        let mut auth = self.lock_auth()?;
        let outcome = auth.authenticate(&request.email, &request.secret)?;
        Ok(ok_response("AUTHENTICATED", outcome))
    }

    pub fn logout(&self) -> Result<AuthAdapterResponse, AdapterFailure> {
        let mut auth = self.lock_auth()?;
        let navigation = auth.logout();
        Ok(AuthAdapterResponse {
            status: "ok".to_string(),
            outcome: "LOGGED_OUT".to_string(),
            reason: None,
            profile: None,
            navigate_to: Some(navigation.route().to_string()),
        })
    }

    pub fn update_profile(
        &self,
        view: ProfileAdapterView,
    ) -> Result<AuthAdapterResponse, AdapterFailure> {
        let profile = profile_from_view(view).map_err(AdapterFailure::invalid_input)?;
        let mut auth = self.lock_auth()?;
        let outcome = auth.update_profile(profile)?;
        Ok(ok_response("PROFILE_UPDATED", outcome))
    }

    pub fn profile_view(&self, profile_id: &str) -> Result<ProfileAdapterView, AdapterFailure> {
        let auth = self.lock_auth()?;
        match auth.fetch_profile(profile_id) {
            Some(profile) => Ok(view_from_profile(&profile)),
            None => Err(AdapterFailure {
                kind: AdapterFailureKind::NotFound,
                outcome: "NOT_FOUND",
                reason: "Profile not found.".to_string(),
            }),
        }
    }

    /// Never waits on an in-flight operation; reports `LOADING` with an unknown session
    /// instead. Callers must not redirect on that answer.
    pub fn session(&self) -> Result<SessionAdapterResponse, AdapterFailure> {
        let auth = match self.auth.try_lock() {
            Ok(auth) => auth,
            Err(TryLockError::WouldBlock) => {
                return Ok(SessionAdapterResponse {
                    status: "ok".to_string(),
                    gate: "LOADING".to_string(),
                    authenticated: None,
                    loading: true,
                    profile: None,
                })
            }
            Err(TryLockError::Poisoned(_)) => {
                return Err(AdapterFailure::internal("auth runtime lock poisoned"))
            }
        };
        let gate = auth.access_gate().label().to_string();
        let snapshot = auth.session_snapshot();
        Ok(SessionAdapterResponse {
            status: "ok".to_string(),
            gate,
            authenticated: Some(snapshot.is_authenticated()),
            loading: snapshot.loading,
            profile: snapshot.profile.as_ref().map(view_from_profile),
        })
    }

    pub fn health_report(&self) -> Result<AdapterHealthResponse, AdapterFailure> {
        let auth = self.lock_auth()?;
        Ok(AdapterHealthResponse {
            status: "ok".to_string(),
            outcome: "HEALTHY".to_string(),
            reason: None,
            account_count: auth.repo().account_rows().len(),
            profile_count: auth.repo().profile_rows().len(),
        })
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_set()
    }

    fn lock_auth(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, ProfileForgeAuthRuntime>, AdapterFailure> {
        self.auth
            .lock()
            .map_err(|_| AdapterFailure::internal("auth runtime lock poisoned"))
    }
}

fn ok_response(outcome: &str, result: AuthOutcome) -> AuthAdapterResponse {
    AuthAdapterResponse {
        status: "ok".to_string(),
        outcome: outcome.to_string(),
        reason: None,
        profile: Some(view_from_profile(&result.profile)),
        navigate_to: Some(result.navigate_to.route().to_string()),
    }
}

pub fn view_from_profile(profile: &Profile) -> ProfileAdapterView {
    ProfileAdapterView {
        id: profile.id.as_str().to_string(),
        full_name: profile.full_name.clone(),
        headline: profile.headline.clone(),
        bio: profile.bio.clone(),
        profile_picture_url: profile.profile_picture_url.clone(),
        email: profile.email.as_str().to_string(),
        linkedin_url: profile.linkedin_url.clone(),
        github_url: profile.github_url.clone(),
        portfolio_url: profile.portfolio_url.clone(),
        work_experience: profile
            .work_experience
            .iter()
            .map(|w| WorkExperienceAdapterItem {
                id: w.id.as_ref().map(|id| id.as_str().to_string()),
                company: w.company.clone(),
                role: w.role.clone(),
                start_date: w.start_date.clone(),
                end_date: w.end_date.clone(),
                description: w.description.clone(),
            })
            .collect(),
        education: profile
            .education
            .iter()
            .map(|e| EducationAdapterItem {
                id: e.id.as_ref().map(|id| id.as_str().to_string()),
                institution: e.institution.clone(),
                degree: e.degree.clone(),
                start_date: e.start_date.clone(),
                end_date: e.end_date.clone(),
                description: e.description.clone(),
            })
            .collect(),
        skills: profile.skills.clone(),
    }
}

fn parse_entry_id(raw: Option<String>) -> Result<Option<EntryId>, ContractViolation> {
    match raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => Ok(Some(EntryId::new(v)?)),
        None => Ok(None),
    }
}

pub fn profile_from_view(view: ProfileAdapterView) -> Result<Profile, ContractViolation> {
    let work_experience = view
        .work_experience
        .into_iter()
        .map(|w| {
            WorkExperience::v1(
                parse_entry_id(w.id)?,
                w.company,
                w.role,
                w.start_date,
                w.end_date,
                w.description,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;
    let education = view
        .education
        .into_iter()
        .map(|e| {
            Education::v1(
                parse_entry_id(e.id)?,
                e.institution,
                e.degree,
                e.start_date,
                e.end_date,
                e.description,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Profile {
        schema_version: PROFILE_CONTRACT_VERSION,
        id: ProfileId::new(view.id)?,
        full_name: view.full_name,
        headline: view.headline,
        bio: view.bio,
        profile_picture_url: view.profile_picture_url,
        email: Email::new(view.email)?,
        linkedin_url: view.linkedin_url,
        github_url: view.github_url,
        portfolio_url: view.portfolio_url,
        work_experience,
        education,
        skills: view.skills,
    })
}
