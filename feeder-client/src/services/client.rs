//! Thin JSON-over-HTTP wrapper shared by every service client.

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::ServiceError;
use super::types::ErrorEnvelope;

/// How much of an undecodable body is kept for diagnostics.
const BODY_SNIPPET_CHARS: usize = 500;

/// One backend service: a shared HTTP client plus that service's base URL.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl ServiceClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ServiceError> {
        self.send(self.http.get(self.url(path)).query(query)).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        self.send(self.http.post(self.url(path)).json(body)).await
    }

    /// POST with an empty JSON object, for action endpoints.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        self.post(path, &serde_json::json!({})).await
    }

    /// DELETE, ignoring any response body.
    pub async fn delete(&self, path: &str) -> Result<(), ServiceError> {
        let response = self.http.delete(self.url(path)).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ServiceError> {
        let response = check_status(request.send().await?).await?;
        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| ServiceError::Json {
            message: e.to_string(),
            body: Some(body.chars().take(BODY_SNIPPET_CHARS).collect()),
        })
    }
}

/// Turn a non-success status into the matching [`ServiceError`].
///
/// The services report failures as `{"success": false, "message": ...}`;
/// validation failures sometimes carry a serializer error dict instead. The
/// envelope message is preferred, falling back to the raw body so the user
/// still sees the service's own words.
async fn check_status(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .and_then(|env| env.message)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                body.chars().take(BODY_SNIPPET_CHARS).collect()
            }
        });

    Err(ServiceError::from_status(status.as_u16(), message))
}

/// The services sometimes answer 200 with `success: false`. Treat that as
/// the status the message implies.
pub(super) fn check_envelope(success: bool, message: Option<String>) -> Result<(), ServiceError> {
    if success {
        return Ok(());
    }
    let message = message.unwrap_or_else(|| "request failed".to_string());
    let status = if message.to_ascii_lowercase().contains("not found") {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::BAD_REQUEST
    };
    Err(ServiceError::from_status(status.as_u16(), message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ErrorClass;

    #[test]
    fn trailing_slash_trimmed() {
        let client = ServiceClient::new(reqwest::Client::new(), "http://localhost:8001/api/");
        assert_eq!(client.base_url(), "http://localhost:8001/api");
        assert_eq!(client.url("/users/"), "http://localhost:8001/api/users/");
    }

    #[test]
    fn envelope_failure_classified() {
        assert!(check_envelope(true, None).is_ok());

        let err = check_envelope(false, Some("Driver not found".into())).unwrap_err();
        assert_eq!(err.class(), ErrorClass::NotFound);

        let err = check_envelope(false, Some("Invalid station".into())).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Validation);
        assert_eq!(err.to_string(), "Invalid station");
    }
}
