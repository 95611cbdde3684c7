//! The dispatch loop (C6): accept connections, read one fixed-size chunk,
//! parse, route-match, invoke the worker, serialize the response, close. See
//! §4.4 and §5 — this loop never spawns a task per connection; it processes
//! connections strictly one at a time on the current-thread runtime so the
//! single engine context is never touched from two places at once.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::edge_runtime::EdgeRuntime;
use crate::engine;
use crate::error::EdgeError;
use crate::request;
use crate::response::{self, RespondWith};

/// The read ceiling from §4.4 step 1: a practical max request size of 16 KiB
/// including headers and body.
const READ_CEILING: usize = 16 * 1024;

pub async fn serve(runtime: &EdgeRuntime) -> anyhow::Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], runtime.config.port).into();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    serve_on(runtime, listener).await
}

/// Runs the accept loop against an already-bound listener. Split out from
/// `serve` so tests can bind to `127.0.0.1:0`, read back the OS-assigned
/// port, and drive requests against it.
pub async fn serve_on(runtime: &EdgeRuntime, listener: TcpListener) -> anyhow::Result<()> {
    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                if let Err(err) = handle_connection(runtime, socket).await {
                    tracing::warn!(%peer, error = %err, "connection error");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "accept failed");
            }
        }
    }
}

/// Maps the taxonomy in §7 (the hot-path rows) to the wire bytes for the
/// matching HTTP status. Matching on `EdgeError` directly, rather than
/// inlining each branch's bytes at its call site, is what the error-handling
/// design in §7 asks for: one place that shows the whole taxonomy.
fn to_wire(err: &EdgeError) -> &'static [u8] {
    match err {
        EdgeError::BadRequest => response::bad_request(),
        EdgeError::NoRouteMatch => response::not_found(),
        EdgeError::WorkerInvocation { .. } => response::internal_server_error(),
        other => unreachable!("{other} is not a hot-path error"),
    }
}

fn dispatch_request(runtime: &EdgeRuntime, buf: &[u8]) -> Result<Vec<u8>, EdgeError> {
    let parsed = request::parse(buf).ok_or(EdgeError::BadRequest)?;

    let worker_index = runtime.routes.find(&parsed.path).ok_or(EdgeError::NoRouteMatch)?;
    let worker = &runtime.workers[worker_index];

    runtime.engine.with(|ctx| -> Result<Vec<u8>, EdgeError> {
        let request_obj = request::build_engine_request(&ctx, &parsed).map_err(|err| EdgeError::WorkerInvocation {
            name: worker.name.clone(),
            message: err.to_string(),
        })?;
        let fetch = worker.fetch_callback(&ctx).map_err(|err| EdgeError::WorkerInvocation {
            name: worker.name.clone(),
            message: err.to_string(),
        })?;
        let receiver = worker.module_exports(&ctx).map_err(|err| EdgeError::WorkerInvocation {
            name: worker.name.clone(),
            message: err.to_string(),
        })?;

        match engine::call_with_receiver(&ctx, &fetch, receiver.into_value(), request::into_value(request_obj)) {
            Ok(value) => {
                let respond: RespondWith = response::extract(&value);
                Ok(response::serialize(&respond))
            }
            Err(message) => Err(EdgeError::WorkerInvocation {
                name: worker.name.clone(),
                message,
            }),
        }
    })
}

async fn handle_connection(runtime: &EdgeRuntime, mut socket: tokio::net::TcpStream) -> std::io::Result<()> {
    let mut buf = vec![0u8; READ_CEILING];
    let n = socket.read(&mut buf).await?;
    if n == 0 {
        return Ok(());
    }
    buf.truncate(n);

    let wire = match dispatch_request(runtime, &buf) {
        Ok(wire) => wire,
        Err(err @ EdgeError::WorkerInvocation { .. }) => {
            tracing::error!(error = %err, "worker invocation failed");
            to_wire(&err).to_vec()
        }
        Err(err) => to_wire(&err).to_vec(),
    };

    socket.write_all(&wire).await?;
    Ok(())
}
