//! Correlation table for requests awaiting a reply.
//!
//! Each outstanding request owns one single-use slot keyed by its
//! [`HandlerId`]. The receive loop completes slots as replies arrive and
//! fails every remaining slot when the connection ends. Once failed, the
//! table refuses new registrations so no caller can wait on a dead
//! connection.

use std::sync::OnceLock;

use dashmap::{DashMap, mapref::entry::Entry};
use log::debug;
use tokio::sync::oneshot;

use crate::{
    client::{ClientError, CloseReason},
    handler_id::HandlerId,
    marshal::Fault,
    metrics,
    value::Value,
};

/// Outcome delivered to a waiting caller.
pub type ReplyResult = Result<Value, ClientError>;

/// Receiving half of a pending request slot.
pub type ReplySlot = oneshot::Receiver<ReplyResult>;

/// Concurrent map from handler id to the caller awaiting that reply.
#[derive(Debug, Default)]
pub struct PendingRequestTable {
    slots: DashMap<HandlerId, oneshot::Sender<ReplyResult>>,
    closed: OnceLock<CloseReason>,
}

impl PendingRequestTable {
    /// Create an empty, open table.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Reserve the slot for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::DuplicateHandler`] if `id` is already pending
    /// and [`ClientError::Closed`] once [`fail_all`](Self::fail_all) has run.
    pub fn register(&self, id: HandlerId) -> Result<ReplySlot, ClientError> {
        self.ensure_open()?;
        let (tx, rx) = oneshot::channel();
        match self.slots.entry(id) {
            Entry::Occupied(_) => return Err(ClientError::DuplicateHandler(id)),
            Entry::Vacant(slot) => {
                slot.insert(tx);
            }
        }
        // `fail_all` may have drained the map between the first check and
        // the insert; re-check so the slot is never stranded.
        if let Err(err) = self.ensure_open() {
            self.slots.remove(&id);
            return Err(err);
        }
        metrics::set_pending(self.slots.len());
        Ok(rx)
    }

    /// Complete the request `id` with a successful value.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnexpectedHandler`] if nothing is pending for
    /// `id`.
    pub fn resolve_success(&self, id: HandlerId, value: Value) -> Result<(), ClientError> {
        self.complete(id, Ok(value))
    }

    /// Complete the request `id` with a remote fault.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnexpectedHandler`] if nothing is pending for
    /// `id`.
    pub fn resolve_fault(&self, id: HandlerId, fault: Fault) -> Result<(), ClientError> {
        self.complete(id, Err(ClientError::Fault(fault)))
    }

    /// Remove the slot for `id` without completing it.
    ///
    /// Returns `false` if nothing was pending for `id`.
    pub fn cancel(&self, id: HandlerId) -> bool {
        let removed = self.slots.remove(&id).is_some();
        metrics::set_pending(self.slots.len());
        removed
    }

    /// Fail every outstanding request with [`ClientError::Closed`] and refuse
    /// later registrations.
    ///
    /// Returns `true` for the call that closed the table. The first reason
    /// wins; later calls only drain slots that raced with the first.
    pub fn fail_all(&self, reason: CloseReason) -> bool {
        let first = self.closed.set(reason).is_ok();
        let reason = self.closed.get().cloned().unwrap_or(CloseReason::ClosedByClient);
        let ids: Vec<HandlerId> = self.slots.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, tx)) = self.slots.remove(&id) {
                // A dropped receiver means the caller stopped waiting.
                let _ = tx.send(Err(ClientError::Closed(reason.clone())));
            }
        }
        metrics::set_pending(0);
        first
    }

    /// Number of requests awaiting a reply.
    #[must_use]
    pub fn len(&self) -> usize { self.slots.len() }

    /// Whether no request is awaiting a reply.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    /// The reason the table was closed, if it has been.
    #[must_use]
    pub fn close_reason(&self) -> Option<&CloseReason> { self.closed.get() }

    fn ensure_open(&self) -> Result<(), ClientError> {
        match self.closed.get() {
            Some(reason) => Err(ClientError::Closed(reason.clone())),
            None => Ok(()),
        }
    }

    fn complete(&self, id: HandlerId, outcome: ReplyResult) -> Result<(), ClientError> {
        let (_, tx) = self
            .slots
            .remove(&id)
            .ok_or(ClientError::UnexpectedHandler(id))?;
        metrics::set_pending(self.slots.len());
        if tx.send(outcome).is_err() {
            debug!("discarding reply for abandoned request: handler={id}");
        }
        Ok(())
    }
}
