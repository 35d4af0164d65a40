//! Server entry points.
//!
//! Two modes, selected by `REUSEPORT`:
//!
//! - default: one listener, one multi-thread tokio runtime
//! - reuseport: one accept loop per CPU core, each with its own
//!   `SO_REUSEPORT` listener — the kernel load-balances connections
//!   across cores, the architecture used by top TechEmpower entries
//!
//! Both modes shut down gracefully on SIGINT/SIGTERM via a watch channel.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::config::Config;
use crate::controllers::{self, AppState};
use crate::error::MazurkaError;
use crate::perf;
use crate::storage::WorldStore;

/// Run the server until a shutdown signal arrives.
pub async fn run(config: Config, store: Arc<dyn WorldStore>) -> Result<(), MazurkaError> {
    perf::init_date_cache();

    let app = controllers::router(AppState { store });
    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .map_err(|e| MazurkaError::Config(format!("invalid server address: {e}")))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    if config.reuseport {
        run_reuseport(addr, app, shutdown_rx).await
    } else {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("listening on http://{addr}");
        let mut rx = shutdown_rx;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.changed().await;
            })
            .await?;
        Ok(())
    }
}

/// One accept loop per CPU core, each on its own SO_REUSEPORT listener.
async fn run_reuseport(
    addr: SocketAddr,
    app: axum::Router,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<(), MazurkaError> {
    let num_cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    tracing::info!("listening on http://{addr} ({num_cores} accept loops, SO_REUSEPORT)");

    let mut handles = Vec::with_capacity(num_cores);
    for i in 0..num_cores {
        let listener = TcpListener::from_std(bind_reuseport(addr)?)?;
        let app = app.clone();
        let mut rx = shutdown_rx.clone();

        handles.push(tokio::spawn(async move {
            tracing::debug!("accept loop {i} started");
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.changed().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!("accept loop {i} failed: {e}");
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}

fn bind_reuseport(addr: SocketAddr) -> std::io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        if addr.is_ipv4() {
            socket2::Domain::IPV4
        } else {
            socket2::Domain::IPV6
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;
    socket.set_reuse_address(true)?;
    #[cfg(not(windows))]
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(16384)?;
    Ok(socket.into())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!("failed to install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
