// Turns Ctrl+C into pipeline cancellation.
//
// The lister stops at its next partition or blocked push and closes the job
// queue. Idle workers leave; azcopy processes already running are awaited.

use std::future::Future;
use std::io;

use blobmig_rs::PipelineCancellationToken;
use tokio::task::JoinHandle;
use tokio::{select, signal};
use tracing::{debug, warn};

pub fn spawn_ctrl_c_handler(cancellation_token: PipelineCancellationToken) -> JoinHandle<()> {
    tokio::spawn(cancel_on_interrupt(cancellation_token, signal::ctrl_c()))
}

async fn cancel_on_interrupt<F>(cancellation_token: PipelineCancellationToken, interrupt: F)
where
    F: Future<Output = io::Result<()>>,
{
    select! {
        _ = cancellation_token.cancelled() => {
            debug!("pipeline finished before any interrupt.");
        }
        result = interrupt => match result {
            Ok(()) => {
                warn!("interrupted. waiting for running transfers to finish.");
                cancellation_token.cancel();
            }
            Err(e) => {
                warn!(error = %e, "unable to listen for ctrl-c. interrupts are ignored.");
            }
        }
    }
}
