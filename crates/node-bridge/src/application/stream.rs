//! # Stream Pump
//!
//! One receive loop shared by every server stream the bridge consumes.
//!
//! | Outcome | Result |
//! |---------|--------|
//! | token cancelled | `Ok(())` |
//! | end of stream | `Ok(())` |
//! | `Cancelled` status | `Ok(())` |
//! | other status | `Err(BridgeError::Rpc)` |
//! | consumer error | that error, no further receives |

use crate::error::{BridgeError, Result};
use crate::ports::RpcResult;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Drain `stream`, handing each item to `consumer` in arrival order.
///
/// The consumer runs inline, so the next item is not received before it
/// returns.
pub async fn listen_to_stream<T, S, F>(
    cancel: &CancellationToken,
    mut stream: S,
    mut consumer: F,
) -> Result<()>
where
    S: Stream<Item = RpcResult<T>> + Unpin,
    F: FnMut(T) -> Result<()>,
{
    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            next = stream.next() => next,
        };

        match next {
            None => {
                trace!("Stream ended");
                return Ok(());
            }
            Some(Err(status)) if status.is_cancelled() => return Ok(()),
            Some(Err(status)) => return Err(BridgeError::Rpc(status)),
            Some(Ok(item)) => consumer(item)?,
        }
    }
}
