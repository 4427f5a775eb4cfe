#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use profileforge_engines::credential::{
    CredentialError, CredentialHasher, MAX_CONFIGURED_ITERATIONS, MIN_CONFIGURED_ITERATIONS,
};
use profileforge_engines::session_marker::SessionMarkerStore;
use profileforge_kernel_contracts::account::{
    AccountRecord, AccountSecret, Email, RegistrationInput,
};
use profileforge_kernel_contracts::profile::{EntryId, EntryKind, Profile, ProfileId};
use profileforge_kernel_contracts::session::{
    AccessGate, AuthOutcome, Navigation, SessionSnapshot,
};
use profileforge_kernel_contracts::{ContractViolation, UnixTimeMs, Validate};
use profileforge_storage::repo::ProfileRepo;
use profileforge_storage::store::StorageError;

use crate::clock::{Clock, SystemClock};

pub const DEFAULT_MUTATION_LATENCY_MS: u64 = 500;
pub const DEFAULT_FETCH_LATENCY_MS: u64 = 300;
pub const MAX_SIMULATED_LATENCY_MS: u64 = 10_000;

#[derive(Debug)]
pub enum AuthError {
    AlreadyExists,
    /// Deliberately carries no cause: unknown account and wrong secret look the same.
    InvalidCredentials,
    Unauthorized,
    InvalidInput(ContractViolation),
    Storage(StorageError),
    Credential(CredentialError),
}

impl AuthError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Storage(_) => "STORAGE_FAILURE",
            Self::Credential(_) => "CREDENTIAL_FAILURE",
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists => write!(f, "User already exists"),
            Self::InvalidCredentials => write!(f, "Invalid credentials"),
            Self::Unauthorized => write!(
                f,
                "Failed to update profile. Not authorized or profile not found."
            ),
            Self::InvalidInput(v) => write!(f, "invalid input: {v}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
            Self::Credential(err) => write!(f, "credential error: {err}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<ContractViolation> for AuthError {
    fn from(v: ContractViolation) -> Self {
        Self::InvalidInput(v)
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DuplicateKey {
                table: "accounts", ..
            } => Self::AlreadyExists,
            other => Self::Storage(other),
        }
    }
}

impl From<CredentialError> for AuthError {
    fn from(err: CredentialError) -> Self {
        Self::Credential(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthRuntimeConfig {
    /// Pause applied to register, authenticate and update.
    pub mutation_latency: Duration,
    /// Pause applied to public profile fetches.
    pub fetch_latency: Duration,
    pub hasher: CredentialHasher,
}

impl AuthRuntimeConfig {
    pub fn mvp_v1() -> Self {
        Self {
            mutation_latency: Duration::from_millis(DEFAULT_MUTATION_LATENCY_MS),
            fetch_latency: Duration::from_millis(DEFAULT_FETCH_LATENCY_MS),
            hasher: CredentialHasher::mvp_default(),
        }
    }

    pub fn without_latency(hasher: CredentialHasher) -> Self {
        Self {
            mutation_latency: Duration::ZERO,
            fetch_latency: Duration::ZERO,
            hasher,
        }
    }

    /// Reads `PROFILEFORGE_SIMULATED_LATENCY_MS` and `PROFILEFORGE_CREDENTIAL_ITERATIONS`.
    /// Out-of-range or unparsable values fall back to the defaults.
    pub fn from_env_var_map<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::mvp_v1();
        if let Some(raw) = lookup("PROFILEFORGE_SIMULATED_LATENCY_MS") {
            match raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|v| *v <= MAX_SIMULATED_LATENCY_MS)
            {
                Some(ms) => {
                    config.mutation_latency = Duration::from_millis(ms);
                    config.fetch_latency = Duration::from_millis(ms);
                }
                None => eprintln!(
                    "profileforge_os auth: ignoring PROFILEFORGE_SIMULATED_LATENCY_MS={raw}, expected 0..={MAX_SIMULATED_LATENCY_MS}"
                ),
            }
        }
        if let Some(raw) = lookup("PROFILEFORGE_CREDENTIAL_ITERATIONS") {
            match raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|v| (MIN_CONFIGURED_ITERATIONS..=MAX_CONFIGURED_ITERATIONS).contains(v))
            {
                Some(iterations) => config.hasher = CredentialHasher::with_iterations(iterations),
                None => eprintln!(
                    "profileforge_os auth: ignoring PROFILEFORGE_CREDENTIAL_ITERATIONS={raw}, expected {MIN_CONFIGURED_ITERATIONS}..={MAX_CONFIGURED_ITERATIONS}"
                ),
            }
        }
        config
    }
}

impl Default for AuthRuntimeConfig {
    fn default() -> Self {
        Self::mvp_v1()
    }
}

/// Shareable view of the advisory busy flag. Readable without holding the runtime.
#[derive(Debug, Clone, Default)]
pub struct LoadingFlag(Arc<AtomicBool>);

impl LoadingFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn raise(&self) -> LoadingGuard<'_> {
        self.0.store(true, Ordering::SeqCst);
        LoadingGuard(&self.0)
    }
}

struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn simulate_latency(pause: Duration) {
    if !pause.is_zero() {
        std::thread::sleep(pause);
    }
}

/// Session/profile store: owns the current session and enforces who may do what to
/// which profile. Storage and the session marker are injected.
pub struct AuthRuntime<R, M> {
    repo: R,
    marker: M,
    config: AuthRuntimeConfig,
    clock: Arc<dyn Clock + Send + Sync>,
    session: Option<Profile>,
    loading: LoadingFlag,
    entry_seq: u64,
}

impl<R, M> AuthRuntime<R, M>
where
    R: ProfileRepo,
    M: SessionMarkerStore,
{
    pub fn start(repo: R, marker: M, config: AuthRuntimeConfig) -> Self {
        Self::start_with_clock(repo, marker, config, Arc::new(SystemClock))
    }

    /// Builds the runtime and restores the session named by the marker, if it still
    /// resolves to an account and profile.
    pub fn start_with_clock(
        repo: R,
        marker: M,
        config: AuthRuntimeConfig,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let mut runtime = Self {
            repo,
            marker,
            config,
            clock,
            session: None,
            loading: LoadingFlag::default(),
            entry_seq: 0,
        };
        runtime.restore_session();
        runtime
    }

    fn restore_session(&mut self) {
        let flag = self.loading.clone();
        let _busy = flag.raise();
        let email = match self.marker.read_marker() {
            Ok(Some(email)) => email,
            Ok(None) => return,
            Err(err) => {
                eprintln!("profileforge_os auth: ignoring unreadable session marker: {err}");
                return;
            }
        };
        let restored = self
            .repo
            .get_account_row(&email)
            .and_then(|account| self.repo.get_profile_row(&account.profile_id))
            .cloned();
        self.session = restored;
    }

    pub fn register(
        &mut self,
        email: &str,
        secret: &str,
        full_name: &str,
    ) -> Result<AuthOutcome, AuthError> {
        let flag = self.loading.clone();
        let _busy = flag.raise();
        simulate_latency(self.config.mutation_latency);

        let input = RegistrationInput::v1(
            Email::new(email)?,
            AccountSecret::new(secret)?,
            full_name.to_string(),
        )?;
        if self.repo.get_account_row(&input.email).is_some() {
            return Err(AuthError::AlreadyExists);
        }

        let now = self.clock.now();
        let profile_id = ProfileId::synthesize(&input.email, now);
        let profile =
            Profile::for_registration(profile_id.clone(), input.email.clone(), &input.full_name);
        let credential = self.config.hasher.hash_secret(&input.secret)?;
        let account = AccountRecord::v1(input.email.clone(), credential, profile_id, now);
        self.repo.insert_account_row(account, profile.clone())?;

        self.session = Some(profile.clone());
        self.persist_marker(&input.email);
        Ok(AuthOutcome {
            profile,
            navigate_to: Navigation::ProfileEdit,
        })
    }

    pub fn authenticate(&mut self, email: &str, secret: &str) -> Result<AuthOutcome, AuthError> {
        let flag = self.loading.clone();
        let _busy = flag.raise();
        simulate_latency(self.config.mutation_latency);

        let hasher = self.config.hasher;
        let Ok(email) = Email::new(email) else {
            hasher.verify_against_absent_account(secret);
            return Err(AuthError::InvalidCredentials);
        };
        let Some(account) = self.repo.get_account_row(&email) else {
            hasher.verify_against_absent_account(secret);
            return Err(AuthError::InvalidCredentials);
        };
        if !hasher.verify_secret(secret, &account.credential) {
            return Err(AuthError::InvalidCredentials);
        }
        let profile = self
            .repo
            .get_profile_row(&account.profile_id)
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;

        self.session = Some(profile.clone());
        self.persist_marker(&email);
        Ok(AuthOutcome {
            profile,
            navigate_to: Navigation::Dashboard,
        })
    }

    /// Public lookup. Unknown or malformed ids are `None`, never an error.
    pub fn fetch_profile(&self, profile_id: &str) -> Option<Profile> {
        let _busy = self.loading.raise();
        simulate_latency(self.config.fetch_latency);
        let profile_id = ProfileId::new(profile_id).ok()?;
        self.repo.get_profile_row(&profile_id).cloned()
    }

    /// Replaces the session owner's profile wholesale.
    pub fn update_profile(&mut self, profile: Profile) -> Result<AuthOutcome, AuthError> {
        let flag = self.loading.clone();
        let _busy = flag.raise();
        simulate_latency(self.config.mutation_latency);

        let owned_email = match &self.session {
            Some(current) if current.id == profile.id => current.email.clone(),
            _ => return Err(AuthError::Unauthorized),
        };
        let mut profile = profile.normalized();
        if profile.email != owned_email {
            return Err(AuthError::InvalidInput(ContractViolation::InvalidValue {
                field: "profile.email",
                reason: "must match the owning account",
            }));
        }
        profile.validate()?;
        self.assign_missing_entry_ids(&mut profile);
        self.repo.replace_profile_row(profile.clone())?;

        self.session = Some(profile.clone());
        Ok(AuthOutcome {
            profile,
            navigate_to: Navigation::Dashboard,
        })
    }

    /// Always succeeds. Calling it with no session is a no-op apart from the marker check.
    pub fn logout(&mut self) -> Navigation {
        self.session = None;
        if let Err(err) = self.marker.clear_marker() {
            eprintln!("profileforge_os auth: failed to clear session marker: {err}");
        }
        Navigation::Login
    }

    pub fn current_profile(&self) -> Option<&Profile> {
        self.session.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_set()
    }

    pub fn loading_flag(&self) -> LoadingFlag {
        self.loading.clone()
    }

    pub fn session_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            profile: self.session.clone(),
            loading: self.is_loading(),
        }
    }

    pub fn access_gate(&self) -> AccessGate<'_> {
        if self.is_loading() {
            return AccessGate::Loading;
        }
        match &self.session {
            Some(profile) => AccessGate::Allow(profile),
            None => AccessGate::RedirectToLogin,
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    fn persist_marker(&self, email: &Email) {
        if let Err(err) = self.marker.write_marker(email) {
            eprintln!("profileforge_os auth: failed to persist session marker: {err}");
        }
    }

    fn assign_missing_entry_ids(&mut self, profile: &mut Profile) {
        let now = self.clock.now();
        let mut taken: BTreeSet<EntryId> = profile
            .entry_ids(EntryKind::Work)
            .into_iter()
            .cloned()
            .collect();
        for entry in profile.work_experience.iter_mut().filter(|w| w.id.is_none()) {
            entry.id = Some(self.next_entry_id(EntryKind::Work, now, &mut taken));
        }
        let mut taken: BTreeSet<EntryId> = profile
            .entry_ids(EntryKind::Education)
            .into_iter()
            .cloned()
            .collect();
        for entry in profile.education.iter_mut().filter(|e| e.id.is_none()) {
            entry.id = Some(self.next_entry_id(EntryKind::Education, now, &mut taken));
        }
    }

    fn next_entry_id(
        &mut self,
        kind: EntryKind,
        now: UnixTimeMs,
        taken: &mut BTreeSet<EntryId>,
    ) -> EntryId {
        loop {
            self.entry_seq = self.entry_seq.wrapping_add(1);
            let candidate = EntryId::generated(kind, now, self.entry_seq);
            if taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}
