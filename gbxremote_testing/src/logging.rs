//! Serialised access to captured `log` records.

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use logtest::Logger;
use rstest::fixture;

/// Handle to the global logger with exclusive access.
///
/// Tests in one binary share a single [`logtest::Logger`]; holding this
/// guard keeps their captures apart.
pub struct LoggerHandle {
    guard: MutexGuard<'static, Logger>,
}

impl LoggerHandle {
    /// Acquire the global [`Logger`] instance.
    #[must_use]
    pub fn new() -> Self {
        static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

        let logger = LOGGER.get_or_init(|| Mutex::new(Logger::start()));
        let guard = logger.lock().unwrap_or_else(PoisonError::into_inner);

        Self { guard }
    }

    /// Discard every record captured so far.
    pub fn clear(&mut self) { while self.guard.pop().is_some() {} }

    /// Whether any captured record's message contains all of `needles`.
    ///
    /// Records are consumed while searching.
    pub fn drain_contains(&mut self, needles: &[&str]) -> bool {
        while let Some(record) = self.guard.pop() {
            let msg = record.args().to_string();
            if needles.iter().all(|needle| msg.contains(needle)) {
                return true;
            }
        }
        false
    }
}

impl Default for LoggerHandle {
    fn default() -> Self { Self::new() }
}

impl std::ops::Deref for LoggerHandle {
    type Target = Logger;

    fn deref(&self) -> &Self::Target { &self.guard }
}

impl std::ops::DerefMut for LoggerHandle {
    fn deref_mut(&mut self) -> &mut Self::Target { &mut self.guard }
}

#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
pub fn logger() -> LoggerHandle { LoggerHandle::new() }
