//! In-process stand-in for the GPU guard backend: a fleet of fake GPU
//! nodes behind the same HTTP contract the console talks to.

pub mod api;
pub mod services;
pub mod types;

use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub use services::{Fleet, FleetConfig};

/// Serve the fleet on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, fleet: Arc<Fleet>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = api::create_router(fleet);
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
