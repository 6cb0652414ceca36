//! Fan-out of server notifications to registered listeners.
//!
//! Listeners run synchronously on the receive loop in registration order.
//! A listener that panics is logged and skipped; the remaining listeners
//! still run and the loop keeps reading.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        PoisonError,
        RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use log::error;

use crate::{metrics, panic::format_panic, trackmania::Callback, value::Value};

/// A server-initiated message that is not a reply to any request.
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    /// Method name carried by the payload.
    pub method: String,
    /// The known callback matching `method`, if any.
    pub callback: Option<Callback>,
    /// Positional arguments.
    pub params: Vec<Value>,
}

impl Notification {
    /// Build a notification, resolving `method` against [`Callback`].
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        let method = method.into();
        Self {
            callback: Callback::from_name(&method),
            method,
            params,
        }
    }
}

/// Handle returned by [`CallbackDispatcher::register`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Which notifications a listener receives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interest {
    /// Every notification, known or not.
    All,
    /// Only notifications for one callback.
    Only(Callback),
}

impl Interest {
    fn matches(self, notification: &Notification) -> bool {
        match self {
            Self::All => true,
            Self::Only(cb) => notification.callback == Some(cb),
        }
    }
}

impl From<Callback> for Interest {
    fn from(cb: Callback) -> Self { Self::Only(cb) }
}

type Listener = Arc<dyn Fn(&Notification) + Send + Sync>;

struct Registration {
    id: ListenerId,
    interest: Interest,
    listener: Listener,
}

/// Ordered registry of notification listeners.
#[derive(Default)]
pub struct CallbackDispatcher {
    listeners: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for CallbackDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackDispatcher")
            .field("listeners", &self.len())
            .finish_non_exhaustive()
    }
}

impl CallbackDispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append a listener. It runs after every listener registered before it.
    pub fn register<F>(&self, interest: impl Into<Interest>, listener: F) -> ListenerId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.write().push(Registration {
            id,
            interest: interest.into(),
            listener: Arc::new(listener),
        });
        id
    }

    /// Remove a listener. Returns `false` if `id` is not registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut listeners = self.write();
        let before = listeners.len();
        listeners.retain(|reg| reg.id != id);
        listeners.len() != before
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize { self.read().len() }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.read().is_empty() }

    /// Deliver `notification` to every matching listener in order.
    ///
    /// The listener set is captured before the first call, so listeners may
    /// register or unregister without deadlocking. Returns the number of
    /// listeners that completed without panicking.
    pub fn dispatch(&self, notification: &Notification) -> usize {
        let targets: Vec<(ListenerId, Listener)> = self
            .read()
            .iter()
            .filter(|reg| reg.interest.matches(notification))
            .map(|reg| (reg.id, Arc::clone(&reg.listener)))
            .collect();
        metrics::inc_notifications();

        let mut completed = 0;
        for (id, listener) in targets {
            match catch_unwind(AssertUnwindSafe(|| listener(notification))) {
                Ok(()) => completed += 1,
                Err(panic) => {
                    metrics::inc_listener_panics();
                    let panic_msg = format_panic(&*panic);
                    let method = &notification.method;
                    error!("callback listener panicked: panic={panic_msg}, listener={id:?}, method={method}");
                    tracing::error!(panic = %panic_msg, listener = ?id, %method, "callback listener panicked");
                }
            }
        }
        completed
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Registration>> {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Registration>> {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner)
    }
}
