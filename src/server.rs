//! HTTP endpoint of the off-chain protocol.
//!
//! One route, `POST /v1/command`. The body is an opaque signed envelope; the
//! two required headers carry the per-attempt request id and the account id
//! the verification key is looked up under. Responses are signed envelopes
//! as well: 200 wraps a success response, 400 wraps a failure response with
//! errors, 500 means the engine itself failed and carries no envelope.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use offchain_client::http_header::{X_REQUEST_ID, X_VERIFICATION_KEY_ADDRESS};
use offchain_types::{CommandResponse, Error, codes};

use crate::engine::PaymentEngine;

/// The off-chain API router.
pub fn routes(engine: Arc<PaymentEngine>) -> Router {
    Router::new()
        .route("/v1/command", post(post_command))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

/// Serves the off-chain API until ctrl-c.
pub async fn serve(engine: Arc<PaymentEngine>, listener: TcpListener) -> std::io::Result<()> {
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    axum::serve(listener, routes(engine))
        .with_graceful_shutdown(shutdown)
        .await
}

/// `POST /v1/command`: one signed command request in, one signed command
/// response out.
#[instrument(skip_all)]
async fn post_command(
    State(engine): State<Arc<PaymentEngine>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(x_request_id) = header_value(&headers, X_REQUEST_ID) else {
        return missing_header(&engine, X_REQUEST_ID);
    };
    let Some(key_account_id) = header_value(&headers, X_VERIFICATION_KEY_ADDRESS) else {
        return missing_header(&engine, X_VERIFICATION_KEY_ADDRESS);
    };

    let (code, body) = engine
        .process_inbound(x_request_id, key_account_id, &body)
        .await;
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, body).into_response()
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn missing_header(engine: &PaymentEngine, name: &str) -> Response {
    tracing::warn!(header = name, "inbound request missing required header");
    let error = Error::protocol(
        codes::INVALID_REQUEST,
        Some(name.to_string()),
        Some("missing required header".to_string()),
    );
    let response = CommandResponse::failure(None, vec![error.object]);
    (StatusCode::BAD_REQUEST, engine.seal_response(&response)).into_response()
}
