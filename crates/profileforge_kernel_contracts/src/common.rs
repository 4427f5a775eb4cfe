#![forbid(unsafe_code)]

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion(pub u32);

/// Wall-clock milliseconds since the unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnixTimeMs(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { field, reason } => write!(f, "{field} {reason}"),
        }
    }
}

impl std::error::Error for ContractViolation {}

pub trait Validate {
    fn validate(&self) -> Result<(), ContractViolation>;
}

pub(crate) fn require_text(
    value: &str,
    field: &'static str,
    min_chars: usize,
    max_chars: usize,
) -> Result<(), ContractViolation> {
    let count = value.trim().chars().count();
    if count == 0 {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not be empty",
        });
    }
    if count < min_chars {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "is too short",
        });
    }
    if value.chars().count() > max_chars {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "is too long",
        });
    }
    Ok(())
}

/// Empty or whitespace-only optional text collapses to `None`.
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
