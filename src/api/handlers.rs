//! HTTP request handlers with OpenAPI documentation.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::error;
use utoipa::OpenApi;

use crate::app::{AppState, service::CREDIT_NOT_FOUND};
use crate::domain::{
    AppError, CreditId, CreditRecord, DeleteResponse, ErrorDetail, ErrorResponse,
    ExternalServiceError, FieldError, HealthResponse, HealthStatus, InsertCreditRecord,
    LedgerError, StoreError, ValidationError, WalletError,
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Carbon Credit Market API",
        version = "0.1.0",
        description = "Record store for tokenized carbon credits minted, listed and traded on a ledger",
        license(
            name = "MIT"
        )
    ),
    paths(
        list_credits_handler,
        create_credit_handler,
        get_credit_handler,
        update_credit_handler,
        delete_credit_handler,
        health_check_handler,
        liveness_handler,
        readiness_handler,
    ),
    components(
        schemas(
            CreditRecord,
            InsertCreditRecord,
            DeleteResponse,
            HealthResponse,
            HealthStatus,
            ErrorResponse,
            ErrorDetail,
            FieldError,
        )
    ),
    tags(
        (name = "credits", description = "Carbon credit records"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

/// List every credit record
#[utoipa::path(
    get,
    path = "/api/credits",
    tag = "credits",
    responses(
        (status = 200, description = "All records in id order", body = Vec<CreditRecord>),
        (status = 503, description = "Store closed", body = ErrorResponse)
    )
)]
pub async fn list_credits_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CreditRecord>>, AppError> {
    let credits = state.service.list().await?;
    Ok(Json(credits))
}

/// Create a credit record
#[utoipa::path(
    post,
    path = "/api/credits",
    tag = "credits",
    request_body = InsertCreditRecord,
    responses(
        (status = 200, description = "Record created", body = CreditRecord),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 503, description = "Store closed", body = ErrorResponse)
    )
)]
pub async fn create_credit_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CreditRecord>, AppError> {
    let Json(body) = payload.map_err(rejection_to_error)?;
    let record = state.service.create(&body).await?;
    Ok(Json(record))
}

/// Get a single credit record
#[utoipa::path(
    get,
    path = "/api/credits/{id}",
    tag = "credits",
    params(
        ("id" = u64, Path, description = "Credit ID")
    ),
    responses(
        (status = 200, description = "Record found", body = CreditRecord),
        (status = 404, description = "Credit not found", body = ErrorResponse)
    )
)]
pub async fn get_credit_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CreditRecord>, AppError> {
    let record = state.service.get(parse_id(&id)?).await?;
    Ok(Json(record))
}

/// Merge fields over an existing record
#[utoipa::path(
    patch,
    path = "/api/credits/{id}",
    tag = "credits",
    params(
        ("id" = u64, Path, description = "Credit ID")
    ),
    request_body(content = Object, description = "Any subset of the creation fields"),
    responses(
        (status = 200, description = "Record updated", body = CreditRecord),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 404, description = "Credit not found", body = ErrorResponse)
    )
)]
pub async fn update_credit_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CreditRecord>, AppError> {
    let Json(body) = payload.map_err(rejection_to_error)?;
    let id = parse_id(&id)?;
    let record = state.service.update(id, &body).await?;
    Ok(Json(record))
}

/// Delete a credit record
#[utoipa::path(
    delete,
    path = "/api/credits/{id}",
    tag = "credits",
    params(
        ("id" = u64, Path, description = "Credit ID")
    ),
    responses(
        (status = 200, description = "Record deleted", body = DeleteResponse),
        (status = 404, description = "Credit not found", body = ErrorResponse)
    )
)]
pub async fn delete_credit_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    state.service.delete(parse_id(&id)?).await?;
    Ok(Json(DeleteResponse { success: true }))
}

/// Detailed health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health status", body = HealthResponse)
    )
)]
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(state.service.health_check().await)
}

/// Kubernetes liveness probe
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Application is alive")
    )
)]
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness probe
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Application is ready to serve traffic"),
        (status = 503, description = "Store is closed or failing")
    )
)]
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.service.health_check().await.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Prometheus scrape endpoint; 404 when no recorder is installed.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Ids that do not parse can never match a record.
fn parse_id(raw: &str) -> Result<CreditId, AppError> {
    raw.parse::<CreditId>()
        .map_err(|_| StoreError::NotFound(CREDIT_NOT_FOUND.to_string()).into())
}

fn rejection_to_error(rejection: JsonRejection) -> AppError {
    AppError::Deserialization(rejection.body_text())
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details = None;
        let (status, error_type, message) = match &self {
            AppError::Store(store_err) => match store_err {
                StoreError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
                StoreError::Closed => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "service_unavailable",
                    self.to_string(),
                ),
                StoreError::Internal(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "store_error",
                    self.to_string(),
                ),
            },
            AppError::Validation(ValidationError::InvalidFormat(_)) => (
                StatusCode::BAD_REQUEST,
                "deserialization_error",
                self.to_string(),
            ),
            AppError::Validation(validation_err) => {
                let fields = validation_err.details();
                if !fields.is_empty() {
                    details = Some(fields);
                }
                (
                    StatusCode::BAD_REQUEST,
                    "validation_error",
                    self.to_string(),
                )
            }
            AppError::Deserialization(_) => (
                StatusCode::BAD_REQUEST,
                "deserialization_error",
                self.to_string(),
            ),
            AppError::BusinessRule(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "business_rule",
                msg.clone(),
            ),
            AppError::Wallet(wallet_err) => match wallet_err {
                WalletError::Unavailable => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "wallet_unavailable",
                    self.to_string(),
                ),
                WalletError::NotConnected | WalletError::Rejected(_) => (
                    StatusCode::BAD_REQUEST,
                    "wallet_error",
                    self.to_string(),
                ),
            },
            AppError::Ledger(ledger_err) => match ledger_err {
                LedgerError::Timeout(_) => {
                    (StatusCode::GATEWAY_TIMEOUT, "timeout", self.to_string())
                }
                _ => (StatusCode::BAD_GATEWAY, "ledger_error", self.to_string()),
            },
            AppError::ExternalService(ext_err) => match ext_err {
                ExternalServiceError::Timeout(_) => {
                    (StatusCode::GATEWAY_TIMEOUT, "timeout", self.to_string())
                }
                _ => (
                    StatusCode::BAD_GATEWAY,
                    "external_service_error",
                    self.to_string(),
                ),
            },
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                self.to_string(),
            ),
            AppError::Serialization(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "serialization_error",
                self.to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                self.to_string(),
            ),
            AppError::NotSupported(_) => (
                StatusCode::NOT_IMPLEMENTED,
                "not_supported",
                self.to_string(),
            ),
        };

        if status.is_server_error() {
            error!(error_type = %error_type, message = %message, "Server error");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                r#type: error_type.to_string(),
                message,
                details,
            },
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_uses_store_message() {
        let response = AppError::from(StoreError::NotFound(CREDIT_NOT_FOUND.into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json = body_json(response).await;
        assert_eq!(json["error"]["type"], "not_found");
        assert_eq!(json["error"]["message"], "Credit not found");
        assert!(json["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn test_validation_error_carries_details() {
        let err = ValidationError::Fields(vec![
            FieldError::new("owner", "Required"),
            FieldError::new("amount", "Expected number, received string"),
        ]);
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["error"]["type"], "validation_error");
        assert_eq!(json["error"]["details"].as_array().unwrap().len(), 2);
        assert_eq!(json["error"]["details"][0]["field"], "owner");
    }

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(AppError, StatusCode)> = vec![
            (StoreError::Closed.into(), StatusCode::SERVICE_UNAVAILABLE),
            (
                StoreError::Internal("x".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::Deserialization("bad json".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::BusinessRule("You cannot buy your own credits".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (WalletError::Unavailable.into(), StatusCode::SERVICE_UNAVAILABLE),
            (
                WalletError::Rejected("declined".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                LedgerError::Timeout("slow".into()).into(),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                LedgerError::Rpc("down".into()).into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ExternalServiceError::Unavailable("api".into()).into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::NotSupported("x".into()),
                StatusCode::NOT_IMPLEMENTED,
            ),
        ];

        for (err, expected) in cases {
            let label = err.to_string();
            assert_eq!(err.into_response().status(), expected, "{label}");
        }
    }

    #[tokio::test]
    async fn test_business_rule_message_is_bare() {
        let response =
            AppError::BusinessRule("You can only delete your own listings".into()).into_response();
        let json = body_json(response).await;
        assert_eq!(
            json["error"]["message"],
            "You can only delete your own listings"
        );
    }

    #[tokio::test]
    async fn test_non_object_body_is_deserialization_error() {
        let err = ValidationError::InvalidFormat("Expected object, received array".into());
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["error"]["type"], "deserialization_error");
    }

    #[test]
    fn test_parse_id_rejects_non_numeric() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(matches!(
            parse_id("abc"),
            Err(AppError::Store(StoreError::NotFound(_)))
        ));
        assert!(parse_id("-1").is_err());
    }

    #[test]
    fn test_openapi_lists_credit_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/credits"));
        assert!(doc.paths.paths.contains_key("/api/credits/{id}"));
    }
}
