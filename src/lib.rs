pub mod api;
pub mod config;
pub mod error;
pub mod relay;
pub mod ws;

use std::time::Duration;

use axum::{
    Json, Router,
    extract::FromRef,
    http::{Method, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::error;

pub use error::{RelayError, RelayResult};
use relay::RelayHandle;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub relay: RelayHandle,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/ws", get(ws::relay_ws))
        .nest("/api", api::router())
        .layer(cors)
        .with_state(state)
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let Some(err) = self.0.downcast_ref::<RelayError>() else {
            error!("internal error: {:#}", self.0);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "code": "internal", "message": "Internal server error" })),
            )
                .into_response();
        };

        let status = match err {
            RelayError::RoomNotFound => StatusCode::NOT_FOUND,
            RelayError::Protected => StatusCode::FORBIDDEN,
            RelayError::DuplicateName => StatusCode::CONFLICT,
            RelayError::RoomLimitReached => StatusCode::TOO_MANY_REQUESTS,
            RelayError::InvalidName { .. } | RelayError::MalformedEvent(_) => {
                StatusCode::BAD_REQUEST
            }
            RelayError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(json!({ "code": err.code(), "message": err.to_string() })),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_errors_map_to_statuses() {
        let cases = [
            (RelayError::RoomNotFound, StatusCode::NOT_FOUND),
            (RelayError::Protected, StatusCode::FORBIDDEN),
            (RelayError::DuplicateName, StatusCode::CONFLICT),
            (RelayError::RoomLimitReached, StatusCode::TOO_MANY_REQUESTS),
            (
                RelayError::MalformedEvent("missing field `name`".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                RelayError::InvalidName { min: 2, max: 50 },
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn other_errors_are_internal() {
        let response = AppError::from(anyhow::anyhow!("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
