//! Utilities for working with panic payloads.
//!
//! Callback listeners run inside the receive loop. When one panics the
//! payload is caught and logged through these helpers.

use std::{any::Any, fmt};

/// Wrapper that formats a panic payload when logged or displayed.
///
/// The payload is downcast to `String` or `&'static str` if possible and falls
/// back to `Debug` formatting otherwise.
///
/// ```
/// use gbxremote::panic::format_panic;
///
/// let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
/// assert_eq!(format_panic(&*payload).to_string(), "boom");
/// let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("boom"));
/// assert_eq!(format_panic(&*payload).to_string(), "boom");
/// let payload: Box<dyn std::any::Any + Send> = Box::new(5_u32);
/// assert!(format_panic(&*payload).to_string().contains("Any"));
/// ```
#[derive(Debug)]
#[must_use]
pub struct PanicMessage<'a>(&'a (dyn Any + Send));

impl fmt::Display for PanicMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.0.downcast_ref::<String>() {
            f.write_str(s)
        } else if let Some(s) = self.0.downcast_ref::<&'static str>() {
            f.write_str(s)
        } else {
            write!(f, "{:?}", self.0)
        }
    }
}

/// Create a [`PanicMessage`] for the given payload.
///
/// Pass the payload itself (`&*boxed`), not a reference to the box.
pub fn format_panic(panic: &(dyn Any + Send)) -> PanicMessage<'_> { PanicMessage(panic) }
