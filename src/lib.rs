pub mod chat;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod receipts;
pub mod registry;
pub mod session;
pub mod store;
pub mod summary;

use std::sync::Arc;

use axum::{extract::FromRef, http::StatusCode, response::{IntoResponse, Response}, routing::get, Json, Router};
use serde_json::{json, Value};
use sqlx::SqlitePool;

pub use config::Config;
pub use error::{RelayError, RelayResult};

use dispatch::Dispatcher;
use receipts::ReadReceipts;
use registry::Registry;
use store::MessageStore;
use summary::{RoomSummaries, UserDirectory};

/// Engine components, wired once per process and shared by every session.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: MessageStore,
    pub registry: Arc<Registry>,
    pub dispatcher: Dispatcher,
    pub receipts: ReadReceipts,
    pub summaries: RoomSummaries,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, directory: Arc<dyn UserDirectory>) -> Self {
        let store = MessageStore::new(db_pool);
        let registry = Arc::new(Registry::new());
        let dispatcher = Dispatcher::new(registry.clone(), store.clone());
        let receipts = ReadReceipts::new(store.clone(), dispatcher.clone());
        let summaries = RoomSummaries::new(store.clone(), directory);

        Self {
            store,
            registry,
            dispatcher,
            receipts,
            summaries,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(status))
        .route("/ws", get(session::connect))
        .nest("/api/chat", chat::router())
}

async fn status() -> Json<Value> {
    Json(json!({ "status": "success", "message": "Api working" }))
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> RelayResult<String>;
    fn get_obj_field(&self, field: &str) -> RelayResult<&Value>;
}

impl GetField for serde_json::Value {
    fn get_str_field(&self, field: &str) -> RelayResult<String> {
        let value = self
            .get(field)
            .ok_or_else(|| RelayError::Validation(format!("expected {field}")))?
            .as_str()
            .ok_or_else(|| RelayError::Validation(format!("expected {field} to be a string")))?;

        if value.is_empty() {
            return Err(RelayError::Validation(format!("expected {field} to be non-empty")));
        }
        Ok(value.to_owned())
    }

    fn get_obj_field(&self, field: &str) -> RelayResult<&Value> {
        self.get(field)
            .filter(|value| value.is_object())
            .ok_or_else(|| RelayError::Validation(format!("expected {field} to be an object")))
    }
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0.downcast_ref::<RelayError>() {
            Some(err) if err.is_validation() => (StatusCode::BAD_REQUEST, "Bad Request"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Server Error"),
        };
        if status.is_server_error() {
            tracing::error!("request failed: {:#}", self.0);
        }

        (
            status,
            Json(json!({ "message": message, "error": self.0.to_string() })),
        )
            .into_response()
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(RelayError);
apperr_impl!(sqlx::Error);
