#![forbid(unsafe_code)]

use crate::profile::Profile;

/// Where the caller should send the user after an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Navigation {
    Dashboard,
    ProfileEdit,
    Login,
}

impl Navigation {
    pub const fn route(self) -> &'static str {
        match self {
            Self::Dashboard => "/dashboard",
            Self::ProfileEdit => "/dashboard/edit",
            Self::Login => "/login",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub profile: Option<Profile>,
    pub loading: bool,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.profile.is_some()
    }
}

/// Decision for pages that require a logged-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessGate<'a> {
    Loading,
    RedirectToLogin,
    Allow(&'a Profile),
}

impl AccessGate<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Loading => "LOADING",
            Self::RedirectToLogin => "REDIRECT_TO_LOGIN",
            Self::Allow(_) => "ALLOW",
        }
    }
}

/// Successful result of register, authenticate or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub profile: Profile,
    pub navigate_to: Navigation,
}
