//! Background task that owns every read from the socket.
//!
//! Each frame is decoded and routed by payload shape: a payload naming a
//! method is a notification, anything else is the reply for its handler id.
//! Any fatal condition fails every pending request and ends the task.

use std::sync::Arc;

use futures::StreamExt;
use log::{debug, error, info};
use tokio::io::AsyncRead;
use tokio_util::{codec::FramedRead, sync::CancellationToken};

use super::{ClientError, CloseReason, runtime::Shared};
use crate::{
    dispatcher::Notification,
    frame::{GbxCodec, GbxFrame},
    marshal::Payload,
    metrics::{self, Direction},
};

/// Read frames until the peer closes, a fatal error occurs, or `shutdown`
/// fires.
pub(crate) async fn run<R>(
    mut frames: FramedRead<R, GbxCodec>,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    metrics::inc_connections();
    let reason = loop {
        let next = tokio::select! {
            biased;

            () = shutdown.cancelled() => break CloseReason::ClosedByClient,
            next = frames.next() => next,
        };
        match next {
            None => break CloseReason::ClosedByPeer,
            Some(Err(e)) => break CloseReason::from(e),
            Some(Ok(frame)) => {
                if let Err(reason) = route(&shared, frame) {
                    break reason;
                }
            }
        }
    };

    match &reason {
        CloseReason::ClosedByClient => debug!("receive loop stopped: reason={reason}"),
        CloseReason::ClosedByPeer => info!("server closed the connection"),
        _ => {
            error!("receive loop failed: reason={reason}");
            tracing::error!(%reason, "receive loop failed");
        }
    }
    shared.shut(reason);
    metrics::dec_connections();
}

/// Deliver one frame to its pending request or to the listeners.
fn route(shared: &Shared, frame: GbxFrame) -> Result<(), CloseReason> {
    metrics::inc_frames(Direction::Inbound);
    let handler = frame.handler;
    let payload = shared
        .marshaler
        .decode_payload(&frame.payload)
        .map_err(|e| CloseReason::Protocol(format!("undecodable payload for handler {handler}: {e}")))?;

    let resolved = match payload {
        Payload::Notification { method, params } => {
            shared.dispatcher.dispatch(&Notification::new(method, params));
            return Ok(());
        }
        Payload::Reply(value) => shared.pending.resolve_success(handler, value),
        Payload::Fault(fault) => {
            metrics::inc_faults();
            shared.pending.resolve_fault(handler, fault)
        }
    };
    match resolved {
        Ok(()) => Ok(()),
        Err(ClientError::UnexpectedHandler(id)) => {
            error!("reply for unexpected handler: handler={id}");
            Err(CloseReason::UnexpectedHandler(id))
        }
        Err(e) => Err(CloseReason::Protocol(e.to_string())),
    }
}
