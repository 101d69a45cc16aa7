//! HTTP Controller (Driver Adapter)
//!
//! Axum-based REST API in front of the channel dispatcher.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::application::ports::VenuePort;
use crate::application::services::{ChannelDispatcher, DispatchError};
use crate::application::use_cases::SignalError;
use crate::domain::signal::TradeSignal;
use crate::domain::tracked_order::{OrderKey, OrderStore};

use super::request::OrderQuery;
use super::response::{ApiErrorResponse, HealthResponse, SignalResponse};

/// Application state shared across handlers.
pub struct AppState<V, S>
where
    V: VenuePort + 'static,
    S: OrderStore + 'static,
{
    /// Per-channel signal dispatcher.
    pub dispatcher: Arc<ChannelDispatcher<V, S>>,
    /// Tracked-order store for lookups.
    pub store: Arc<S>,
    /// Venue name reported by health checks.
    pub venue: String,
    /// Application version.
    pub version: String,
}

impl<V, S> Clone for AppState<V, S>
where
    V: VenuePort + 'static,
    S: OrderStore + 'static,
{
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            store: Arc::clone(&self.store),
            venue: self.venue.clone(),
            version: self.version.clone(),
        }
    }
}

/// Create the HTTP router with all endpoints.
pub fn create_router<V, S>(state: AppState<V, S>) -> Router
where
    V: VenuePort + 'static,
    S: OrderStore + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/signals", post(submit_signal))
        .route("/v1/orders/{channel_id}/{order_id}", get(get_order))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check<V, S>(State(state): State<AppState<V, S>>) -> impl IntoResponse
where
    V: VenuePort + 'static,
    S: OrderStore + 'static,
{
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        venue: state.venue.clone(),
        channels: state.dispatcher.channel_count(),
    })
}

const fn status_for(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::Signal(signal) => match signal {
            SignalError::LookupMiss { .. } => StatusCode::NOT_FOUND,
            SignalError::Contract(_) | SignalError::Template(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            SignalError::PlacementFailed { .. }
            | SignalError::FallbackOperationFailed { .. }
            | SignalError::LegReplacementFailed { .. } => StatusCode::BAD_GATEWAY,
            SignalError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        DispatchError::QueueFull { .. } | DispatchError::ShutDown => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        DispatchError::WorkerStopped { .. } | DispatchError::Aborted { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Submit a signal and wait for it to be handled.
async fn submit_signal<V, S>(
    State(state): State<AppState<V, S>>,
    Json(signal): Json<TradeSignal>,
) -> impl IntoResponse
where
    V: VenuePort + 'static,
    S: OrderStore + 'static,
{
    tracing::debug!(
        signal_id = %signal.order_id,
        channel_id = %signal.channel_id,
        kind = %signal.kind,
        "Signal received over HTTP"
    );

    match state.dispatcher.submit(signal).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(SignalResponse {
                ok: true,
                outcome: Some(outcome),
                error: None,
            }),
        ),
        Err(err) => {
            tracing::warn!(error = %err, label = err.label(), "Signal not carried out");
            (
                status_for(&err),
                Json(SignalResponse {
                    ok: false,
                    outcome: None,
                    error: Some(ApiErrorResponse::new(err.label(), err.to_string())),
                }),
            )
        }
    }
}

/// Tracked-order lookup endpoint.
async fn get_order<V, S>(
    State(state): State<AppState<V, S>>,
    Path((channel_id, order_id)): Path<(String, String)>,
    Query(query): Query<OrderQuery>,
) -> impl IntoResponse
where
    V: VenuePort + 'static,
    S: OrderStore + 'static,
{
    let role = match query.role() {
        Ok(role) => role,
        Err(message) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!(ApiErrorResponse::new("invalid_role", message))),
            );
        }
    };

    let key = OrderKey::new(channel_id.into(), order_id.into(), role);
    match state.store.get(&key).await {
        Ok(Some(record)) => (StatusCode::OK, Json(serde_json::json!(record))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!(ApiErrorResponse::new(
                "not_found",
                format!("no tracked order {key}")
            ))),
        ),
        Err(e) => {
            tracing::error!(key = %key, error = %e, "Failed to load tracked order");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!(ApiErrorResponse::new(
                    "store",
                    e.to_string()
                ))),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    use crate::application::ports::{ExitModel, InMemoryAuditLog};
    use crate::application::services::DispatcherConfig;
    use crate::application::use_cases::SignalHandler;
    use crate::domain::instrument::ContractTable;
    use crate::domain::order_template::OrderTemplates;
    use crate::infrastructure::broker::PaperVenue;
    use crate::infrastructure::persistence::InMemoryOrderStore;

    fn create_test_state() -> AppState<PaperVenue, InMemoryOrderStore> {
        let store = Arc::new(InMemoryOrderStore::new());
        let handler = SignalHandler::new(
            Arc::new(PaperVenue::new(ExitModel::Attached)),
            Arc::clone(&store),
            Arc::new(ContractTable::default()),
            OrderTemplates::new(dec!(0.01)).unwrap(),
            Arc::new(InMemoryAuditLog::new()),
        );
        AppState {
            dispatcher: Arc::new(ChannelDispatcher::new(
                Arc::new(handler),
                DispatcherConfig::default(),
            )),
            store,
            venue: "paper".to_string(),
            version: "0.1.0-test".to_string(),
        }
    }

    fn post_signal(body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/signals")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_check_returns_ok() {
        let app = create_router(create_test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["venue"], "paper");
    }

    #[tokio::test]
    async fn open_signal_is_tracked() {
        let state = create_test_state();
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(post_signal(&serde_json::json!({
                "orderId": 17,
                "channelId": "chan",
                "ticker": "EUR.USD",
                "action": "BUY",
                "contractType": "LIMIT",
                "price": 1.1,
                "stopLoss": 1.05,
                "type": "OPEN"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["outcome"]["record"]["status"], "PENDING");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/orders/chan/17?role=main")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let record = json_body(response).await;
        assert_eq!(record["orderRole"], "MAIN");
    }

    #[tokio::test]
    async fn close_without_open_is_not_found() {
        let app = create_router(create_test_state());

        let response = app
            .oneshot(post_signal(&serde_json::json!({
                "orderId": "99",
                "channelId": "chan",
                "ticker": "EUR.USD",
                "action": "SELL",
                "contractType": "MARKET",
                "type": "CLOSE"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "lookup_miss");
    }

    #[tokio::test]
    async fn invalid_ticker_is_unprocessable() {
        let app = create_router(create_test_state());

        let response = app
            .oneshot(post_signal(&serde_json::json!({
                "orderId": "1",
                "channelId": "chan",
                "ticker": "EU",
                "action": "BUY",
                "contractType": "MARKET",
                "type": "OPEN"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn unknown_role_is_bad_request() {
        let app = create_router(create_test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/orders/chan/17?role=hedge")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
