//! Handler identifiers correlating requests with replies.
//!
//! Requests issued by this client use ids in `0x8000_0000..=0xFFFF_FFFF`.
//! The allocator hands them out sequentially and wraps back to the start of
//! the range, never entering `0..0x8000_0000`.

use std::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

/// A 32-bit handler id as carried in every frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u32);

impl HandlerId {
    /// First id issued for client requests.
    pub const FIRST_REQUEST: Self = Self(0x8000_0000);
    /// Last id issued before wrapping back to [`HandlerId::FIRST_REQUEST`].
    pub const LAST_REQUEST: Self = Self(u32::MAX);

    /// Wrap a raw id.
    #[must_use]
    pub const fn new(id: u32) -> Self { Self(id) }

    /// Return the raw `u32`.
    #[must_use]
    pub const fn as_u32(self) -> u32 { self.0 }

    /// Whether the id lies in the range used for client requests.
    #[must_use]
    pub const fn is_request_range(self) -> bool { self.0 >= Self::FIRST_REQUEST.0 }

    const fn successor(self) -> Self {
        if self.0 == Self::LAST_REQUEST.0 {
            Self::FIRST_REQUEST
        } else {
            Self(self.0 + 1)
        }
    }
}

impl From<u32> for HandlerId {
    fn from(value: u32) -> Self { Self(value) }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:#010x}", self.0) }
}

/// Sequential allocator for request handler ids.
///
/// # Examples
///
/// ```
/// use gbxremote::{HandlerId, HandlerIdAllocator};
///
/// let ids = HandlerIdAllocator::new();
/// assert_eq!(ids.next_id(), HandlerId::FIRST_REQUEST);
/// assert_eq!(ids.next_id(), HandlerId::new(0x8000_0001));
/// ```
#[derive(Debug)]
pub struct HandlerIdAllocator {
    next: AtomicU32,
}

impl HandlerIdAllocator {
    /// Create an allocator whose first id is [`HandlerId::FIRST_REQUEST`].
    #[must_use]
    pub fn new() -> Self { Self::starting_at(HandlerId::FIRST_REQUEST) }

    /// Create an allocator whose first id is `first`.
    ///
    /// Ids below the request range are raised to
    /// [`HandlerId::FIRST_REQUEST`].
    #[must_use]
    pub fn starting_at(first: HandlerId) -> Self {
        let first = if first.is_request_range() {
            first
        } else {
            HandlerId::FIRST_REQUEST
        };
        Self {
            next: AtomicU32::new(first.as_u32()),
        }
    }

    /// Allocate the next id, wrapping after [`HandlerId::LAST_REQUEST`].
    ///
    /// Only uniqueness of the returned ids matters, so the counter uses
    /// relaxed ordering.
    pub fn next_id(&self) -> HandlerId {
        let previous = self
            .next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(HandlerId(current).successor().as_u32())
            });
        // The closure never returns `None`, so both arms carry the prior value.
        match previous {
            Ok(id) | Err(id) => HandlerId(id),
        }
    }
}

impl Default for HandlerIdAllocator {
    fn default() -> Self { Self::new() }
}
