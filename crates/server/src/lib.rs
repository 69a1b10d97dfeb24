// crates/server/src/lib.rs
//! jobwatch server library.
//!
//! A fixed pool of worker tasks shares one TCP listener; each worker
//! loops accept → read one request line → write one response line →
//! close. There is no keep-alive: the protocol is strictly one
//! exchange per connection.

pub mod config;
pub mod handler;
pub mod proto;
pub mod state;

pub use config::{Config, DEFAULT_PORT, SPOOL_DIR_ENV};
pub use state::AppState;

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::handler::handle_line;
use crate::proto::malformed_response;

/// Serve queries on `listener` until cancelled. Spawns the configured
/// number of worker tasks and waits for all of them to wind down.
pub async fn run_server(listener: TcpListener, state: AppState, cancel: CancellationToken) {
    let listener = Arc::new(listener);
    let workers = state.config.workers.max(1);
    info!(workers, "query workers starting");

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        handles.push(tokio::spawn(worker_loop(
            worker_id,
            listener.clone(),
            state.clone(),
            cancel.clone(),
        )));
    }
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "query worker panicked");
        }
    }
    info!("query workers stopped");
}

async fn worker_loop(
    worker_id: usize,
    listener: Arc<TcpListener>,
    state: AppState,
    cancel: CancellationToken,
) {
    loop {
        let stream = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(worker_id, %peer, "connection accepted");
                    stream
                }
                Err(e) => {
                    // Transient accept failures (fd pressure, resets)
                    // must not kill the worker.
                    warn!(worker_id, error = %e, "accept failed");
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    continue;
                }
            },
        };

        if let Err(e) = handle_connection(stream, &state).await {
            debug!(worker_id, error = %e, "connection error");
        }
    }
}

/// Longest request the grammar can produce is a dotted timestamp plus
/// a qualified job id, well under this. Anything longer is garbage.
pub const MAX_REQUEST_BYTES: u64 = 512;

/// One request/response exchange. Read and write are both bounded by
/// the configured deadline so a stalled client cannot pin a worker
/// forever, and the request read is capped so a newline-less client
/// cannot grow the line buffer without bound.
async fn handle_connection(stream: TcpStream, state: &AppState) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader.take(MAX_REQUEST_BYTES));
    let mut line = String::new();

    let response = match tokio::time::timeout(
        state.config.io_timeout,
        reader.read_line(&mut line),
    )
    .await
    {
        // Deadline expired or the client closed without sending a
        // line: still answer, the contract is one response always.
        Err(_) | Ok(Ok(0)) => malformed_response(),
        Ok(Ok(_)) => handle_line(state, &line).await,
        Ok(Err(e)) => return Err(e),
    };

    tokio::time::timeout(
        state.config.io_timeout,
        writer.write_all(response.as_bytes()),
    )
    .await
    .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "response write timed out"))??;
    writer.shutdown().await
}
