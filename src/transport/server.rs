//! TCP acceptor
//!
//! Responsibilities:
//! - Bind the listening socket (a bind failure is fatal and reported)
//! - Accept connections and spawn one `Session` task per connection
//! - On shutdown, stop accepting, force-close every registered session, then
//!   release the listener

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::broker::Registry;
use crate::config::Settings;
use crate::session::{Session, SessionOptions};
use crate::utils::RelayError;

pub async fn bind(addr: &str) -> Result<TcpListener, RelayError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| RelayError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Accept connections on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    registry: Arc<Registry>,
    options: SessionOptions,
    shutdown: F,
) -> Result<(), RelayError>
where
    F: Future<Output = ()>,
{
    let local = listener.local_addr()?;
    info!("Relay listening on {local}");
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("Shutdown signal received; no longer accepting connections");
                break;
            }

            accepted = listener.accept() => {
                let (stream, addr) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        // Per-connection failures (e.g. reset before accept) are not fatal.
                        warn!("Failed to accept connection: {e}");
                        continue;
                    }
                };
                if let Err(e) = stream.set_nodelay(true) {
                    warn!(peer = %addr, "Failed to set TCP_NODELAY: {e}");
                }
                info!(peer = %addr, "Client connected");

                let session =
                    Session::new(stream, addr.to_string(), Arc::clone(&registry), options);
                tokio::spawn(session.run());
            }
        }
    }

    let closed = registry.close_all();
    info!("Closed {closed} registered session(s)");
    drop(listener);
    info!("Relay shutdown complete");
    Ok(())
}

/// Bind the address from `settings` and serve until `shutdown` resolves.
pub async fn start_server<F>(
    settings: &Settings,
    registry: Arc<Registry>,
    shutdown: F,
) -> Result<(), RelayError>
where
    F: Future<Output = ()>,
{
    let addr = settings.bind_addr();
    let listener = bind(&addr).await.inspect_err(|e| error!("{e}"))?;
    serve(
        listener,
        registry,
        SessionOptions::from(&settings.relay),
        shutdown,
    )
    .await
}
