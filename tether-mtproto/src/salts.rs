//! The set of server salts fetched ahead of time.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tether_tl::types::FutureSalt;

/// Future salts returned by `get_future_salts`, kept sorted by expiry.
#[derive(Debug, Default)]
pub struct Salts {
    inner: Mutex<Vec<FutureSalt>>,
}

impl Salts {
    pub fn new() -> Self { Self::default() }

    /// Merge `salts` into the set.
    pub fn store(&self, salts: impl IntoIterator<Item = FutureSalt>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.extend(salts);
        inner.sort_by_key(|s| s.valid_until);
        inner.dedup();
        log::debug!("[tether] salts: {} stored", inner.len());
    }

    /// Drop every stored salt.
    pub fn reset(&self) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// The salt that expires first among those valid at `deadline`.
    ///
    /// Salts expiring at or before `deadline` are pruned; salts whose
    /// `valid_since` is still ahead of it are kept but skipped.
    pub fn get(&self, deadline: SystemTime) -> Option<i64> {
        let date = deadline
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.retain(|s| i64::from(s.valid_until) > date);
        inner.iter().find(|s| i64::from(s.valid_since) <= date).map(|s| s.salt)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}
