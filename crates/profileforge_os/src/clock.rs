#![forbid(unsafe_code)]

use std::time::{SystemTime, UNIX_EPOCH};

use profileforge_kernel_contracts::UnixTimeMs;

pub trait Clock {
    fn now(&self) -> UnixTimeMs;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> UnixTimeMs {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(1);
        UnixTimeMs(ms.max(1))
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub UnixTimeMs);

impl Clock for FixedClock {
    fn now(&self) -> UnixTimeMs {
        self.0
    }
}
