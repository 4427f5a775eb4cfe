#![forbid(unsafe_code)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use profileforge_kernel_contracts::account::Email;
use profileforge_kernel_contracts::ContractViolation;
use serde::{Deserialize, Serialize};

const MARKER_SCHEMA_VERSION: u8 = 1;

#[derive(Debug)]
pub enum MarkerError {
    Io(std::io::Error),
    Json(serde_json::Error),
    InvalidMarker(ContractViolation),
    SchemaMismatch(u8),
    LockPoisoned,
}

impl std::fmt::Display for MarkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Json(err) => write!(f, "json error: {err}"),
            Self::InvalidMarker(v) => write!(f, "invalid session marker: {v}"),
            Self::SchemaMismatch(got) => {
                write!(f, "session marker schema_version {got} is not supported")
            }
            Self::LockPoisoned => write!(f, "session marker lock poisoned"),
        }
    }
}

impl std::error::Error for MarkerError {}

impl From<std::io::Error> for MarkerError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for MarkerError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<ContractViolation> for MarkerError {
    fn from(value: ContractViolation) -> Self {
        Self::InvalidMarker(value)
    }
}

/// Durable "last logged-in email" marker used to restore a session on the next start.
pub trait SessionMarkerStore {
    fn read_marker(&self) -> Result<Option<Email>, MarkerError>;
    fn write_marker(&self, email: &Email) -> Result<(), MarkerError>;
    /// Returns whether a marker was present.
    fn clear_marker(&self) -> Result<bool, MarkerError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MarkerDocument {
    schema_version: u8,
    current_user_email: String,
    updated_at_unix_ms: u64,
}

#[derive(Debug, Clone)]
pub struct FileSessionMarker {
    path: PathBuf,
}

impl FileSessionMarker {
    pub fn default_local() -> Self {
        let path = env::var("PROFILEFORGE_SESSION_MARKER_PATH")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_marker_path);
        Self::for_path(path)
    }

    pub fn for_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionMarkerStore for FileSessionMarker {
    fn read_marker(&self) -> Result<Option<Email>, MarkerError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let doc = serde_json::from_str::<MarkerDocument>(&raw)?;
        if doc.schema_version != MARKER_SCHEMA_VERSION {
            return Err(MarkerError::SchemaMismatch(doc.schema_version));
        }
        Ok(Some(Email::new(doc.current_user_email)?))
    }

    fn write_marker(&self, email: &Email) -> Result<(), MarkerError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let doc = MarkerDocument {
            schema_version: MARKER_SCHEMA_VERSION,
            current_user_email: email.as_str().to_string(),
            updated_at_unix_ms: now_unix_ms(),
        };
        let serialized = serde_json::to_vec_pretty(&doc)?;
        atomic_write(&self.path, &serialized)
    }

    fn clear_marker(&self) -> Result<bool, MarkerError> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)?;
        Ok(true)
    }
}

/// Process-local marker. Clones share the same slot, which lets tests model a restart.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionMarker {
    slot: Arc<Mutex<Option<Email>>>,
}

impl InMemorySessionMarker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionMarkerStore for InMemorySessionMarker {
    fn read_marker(&self) -> Result<Option<Email>, MarkerError> {
        let slot = self.slot.lock().map_err(|_| MarkerError::LockPoisoned)?;
        Ok(slot.clone())
    }

    fn write_marker(&self, email: &Email) -> Result<(), MarkerError> {
        let mut slot = self.slot.lock().map_err(|_| MarkerError::LockPoisoned)?;
        *slot = Some(email.clone());
        Ok(())
    }

    fn clear_marker(&self) -> Result<bool, MarkerError> {
        let mut slot = self.slot.lock().map_err(|_| MarkerError::LockPoisoned)?;
        Ok(slot.take().is_some())
    }
}

fn default_marker_path() -> PathBuf {
    if let Ok(xdg_config_home) = env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg_config_home)
            .join("profileforge")
            .join("session_marker.json");
    }
    if let Ok(home) = env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("profileforge")
            .join("session_marker.json");
    }
    PathBuf::from(".profileforge").join("session_marker.json")
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(1)
        .max(1)
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), MarkerError> {
    let mut tmp = path.to_path_buf();
    tmp.set_extension("tmp");
    fs::write(&tmp, data)?;
    fs::rename(tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_marker(name: &str) -> (PathBuf, FileSessionMarker) {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(1);
        let base = std::env::temp_dir().join(format!("profileforge-marker-{name}-{suffix}"));
        let marker = FileSessionMarker::for_path(base.join("session_marker.json"));
        (base, marker)
    }

    #[test]
    fn at_marker_01_file_write_read_clear() {
        let (base, marker) = temp_marker("roundtrip");
        assert_eq!(marker.read_marker().unwrap(), None);
        let email = Email::new("a@x.com").unwrap();
        marker.write_marker(&email).unwrap();
        assert_eq!(marker.read_marker().unwrap(), Some(email));
        assert!(marker.clear_marker().unwrap());
        assert!(!marker.clear_marker().unwrap());
        assert_eq!(marker.read_marker().unwrap(), None);
        fs::remove_dir_all(base).unwrap();
    }

    #[test]
    fn at_marker_02_file_holds_only_the_email() {
        let (base, marker) = temp_marker("shape");
        marker
            .write_marker(&Email::new("a@x.com").unwrap())
            .unwrap();
        let raw = fs::read_to_string(marker.path()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["schema_version"], 1);
        assert_eq!(doc["current_user_email"], "a@x.com");
        fs::remove_dir_all(base).unwrap();
    }

    #[test]
    fn at_marker_03_corrupt_or_foreign_documents_fail() {
        let (base, marker) = temp_marker("corrupt");
        fs::create_dir_all(&base).unwrap();
        fs::write(marker.path(), b"{not json").unwrap();
        assert!(matches!(marker.read_marker(), Err(MarkerError::Json(_))));
        fs::write(
            marker.path(),
            br#"{"schema_version":9,"current_user_email":"a@x.com","updated_at_unix_ms":1}"#,
        )
        .unwrap();
        assert!(matches!(
            marker.read_marker(),
            Err(MarkerError::SchemaMismatch(9))
        ));
        fs::write(
            marker.path(),
            br#"{"schema_version":1,"current_user_email":"nope","updated_at_unix_ms":1}"#,
        )
        .unwrap();
        assert!(matches!(
            marker.read_marker(),
            Err(MarkerError::InvalidMarker(_))
        ));
        fs::remove_dir_all(base).unwrap();
    }

    #[test]
    fn at_marker_04_in_memory_clones_share_slot() {
        let a = InMemorySessionMarker::new();
        let b = a.clone();
        a.write_marker(&Email::new("a@x.com").unwrap()).unwrap();
        assert_eq!(b.read_marker().unwrap().unwrap().as_str(), "a@x.com");
        assert!(b.clear_marker().unwrap());
        assert_eq!(a.read_marker().unwrap(), None);
    }
}
