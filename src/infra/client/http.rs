//! reqwest client for the credits HTTP API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::domain::{
    AppError, CreditId, CreditPatch, CreditRecord, CreditsApi, DeleteResponse, ErrorResponse,
    ExternalServiceError, InsertCreditRecord, StoreError, ValidationError,
};

/// Client-side access to `/api/credits`
pub struct HttpCreditsApi {
    http_client: Client,
    base_url: String,
}

impl HttpCreditsApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExternalServiceError::HttpError(e.to_string()))?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn with_defaults(base_url: &str) -> Result<Self, AppError> {
        Self::new(base_url, Duration::from_secs(30))
    }

    fn credits_url(&self) -> String {
        format!("{}/api/credits", self.base_url)
    }

    fn credit_url(&self, id: CreditId) -> String {
        format!("{}/api/credits/{}", self.base_url, id)
    }

    async fn send<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R, AppError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ExternalServiceError::Timeout(e.to_string())
            } else {
                ExternalServiceError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        debug!(status = %status, "Credits API responded");
        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Deserialization(e.to_string()))
    }
}

/// Map an error response back onto the domain taxonomy.
async fn error_from_response(status: StatusCode, response: Response) -> AppError {
    let body = response.text().await.unwrap_or_default();
    let parsed = serde_json::from_str::<ErrorResponse>(&body).ok();
    let message = parsed
        .as_ref()
        .map(|r| r.error.message.clone())
        .unwrap_or_else(|| body.clone());

    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(message).into(),
        StatusCode::BAD_REQUEST => match parsed.and_then(|r| r.error.details) {
            Some(details) if !details.is_empty() => ValidationError::Fields(details).into(),
            _ => ValidationError::InvalidFormat(message).into(),
        },
        StatusCode::SERVICE_UNAVAILABLE => ExternalServiceError::Unavailable(message).into(),
        _ => ExternalServiceError::UnexpectedStatus {
            status: status.as_u16(),
            message,
        }
        .into(),
    }
}

#[async_trait]
impl CreditsApi for HttpCreditsApi {
    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<CreditRecord>, AppError> {
        self.send(self.http_client.get(self.credits_url())).await
    }

    #[instrument(skip(self, input), fields(owner = %input.owner))]
    async fn create(&self, input: &InsertCreditRecord) -> Result<CreditRecord, AppError> {
        self.send(self.http_client.post(self.credits_url()).json(input))
            .await
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, id: CreditId, patch: &CreditPatch) -> Result<CreditRecord, AppError> {
        self.send(self.http_client.patch(self.credit_url(id)).json(patch))
            .await
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: CreditId) -> Result<(), AppError> {
        let _: DeleteResponse = self.send(self.http_client.delete(self.credit_url(id))).await?;
        Ok(())
    }
}
