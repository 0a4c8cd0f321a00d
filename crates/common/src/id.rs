//! ID generation utilities.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use ulid::{Generator, Ulid};

/// Monotonic ULID generator for document IDs.
///
/// IDs from one generator (and its clones) strictly increase, even within the
/// same millisecond, so documents keyed by them list in creation order.
#[derive(Clone)]
pub struct IdGenerator {
    inner: Arc<Mutex<Generator>>,
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Generator::new())),
        }
    }

    /// Generate a lowercase, 26 character ULID. Never contains `/`.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut generator = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        // Overflow needs 2^80 IDs in one millisecond; fall back to a fresh ULID.
        let ulid = generator.generate().unwrap_or_else(|_| Ulid::new());
        ulid.to_string().to_lowercase()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator").finish_non_exhaustive()
    }
}
