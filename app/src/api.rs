//! The HTTP surface: a public read router backed by single store queries
//! and a private write router that acknowledges on shape and defers all
//! work to the ingest queue.

pub mod params;
pub mod private;
pub mod public;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use basilica_agora::ConsensusReader;
use color_eyre::eyre;
use tokio::net::TcpListener;

use crate::events::EventBus;
use crate::ingest::IngestHandle;
use crate::store::{Store, StoreError};

/// Shared state for every handler.
#[derive(Clone)]
pub struct ApiContext {
    pub store: Store,
    pub agora: Arc<dyn ConsensusReader>,
    pub events: Arc<EventBus>,
    pub ingest: IngestHandle,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400 with a textual reason.
    InvalidInput(String),
    /// 204 with an explanatory body.
    NotFound(String),
    /// 500; details stay in the logs.
    Storage(StoreError),
    /// 500; the consensus node did not answer.
    Upstream(eyre::Report),
}

impl ApiError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound(reason.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Storage(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidInput(reason) => (StatusCode::BAD_REQUEST, reason).into_response(),
            Self::NotFound(reason) => (StatusCode::NO_CONTENT, reason).into_response(),
            Self::Storage(e) => {
                tracing::error!(error = %e, "store failure serving request");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage failure").into_response()
            }
            Self::Upstream(e) => {
                tracing::error!(error = %e, "consensus node failure serving request");
                (StatusCode::INTERNAL_SERVER_ERROR, "consensus node unavailable").into_response()
            }
        }
    }
}

/// Binds the public read listener and serves until shutdown.
pub async fn serve_public(context: ApiContext, addr: SocketAddr) -> eyre::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "public API listening");
    axum::serve(listener, public::router(context)).await?;
    Ok(())
}

/// Binds the private write listener; only the consensus node should be
/// able to reach this address.
pub async fn serve_private(context: ApiContext, addr: SocketAddr) -> eyre::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "private intake listening");
    axum::serve(listener, private::router(context)).await?;
    Ok(())
}
