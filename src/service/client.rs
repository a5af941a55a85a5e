//! Agreement service client.

use super::types::{ActionBody, AgreementAction, ApiEnvelope, RawAgreementPayload, RequestContext};
use crate::http::{HttpClient, HttpRequest, HttpResponse, TransportError};
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Broad classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Timeout, connection failure or other transport problem
    Network,
    /// The service answered with a non-2xx status
    HttpStatus,
    /// The response body did not have the expected shape
    Decode,
}

/// Failure of an agreement service call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to decode response: {message}")]
    Decode { message: String, body: Option<String> },
}

impl ApiError {
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            ApiError::Transport(TransportError::Status { .. }) => ApiErrorKind::HttpStatus,
            ApiError::Transport(_) => ApiErrorKind::Network,
            ApiError::Decode { .. } => ApiErrorKind::Decode,
        }
    }

    /// HTTP status, when the service answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Transport(TransportError::Status { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Raw response body, when one was received.
    pub fn body(&self) -> Option<&str> {
        match self {
            ApiError::Transport(TransportError::Status { body, .. }) => Some(body),
            ApiError::Decode { body, .. } => body.as_deref(),
            _ => None,
        }
    }

    fn decode(err: serde_json::Error, response: &HttpResponse) -> Self {
        ApiError::Decode {
            message: err.to_string(),
            body: Some(response.text()),
        }
    }
}

/// Remote operations the controller depends on.
#[async_trait]
pub trait AgreementService: Send + Sync {
    /// Fetch the agreement content named `content_name`.
    async fn fetch_document(
        &self,
        ctx: &RequestContext,
        content_name: &str,
    ) -> Result<RawAgreementPayload, ApiError>;

    /// Report a user action on the content item `item_id`.
    async fn submit_action(
        &self,
        ctx: &RequestContext,
        item_id: &str,
        action: AgreementAction,
    ) -> Result<(), ApiError>;
}

/// [`AgreementService`] over HTTP.
#[derive(Debug, Clone)]
pub struct AgreementClient {
    http: HttpClient,
}

impl AgreementClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// URL an action on `item_id` is posted to.
    pub fn action_url(route: &str, item_id: &str) -> String {
        format!("{}/{}", route.trim_end_matches('/'), item_id)
    }

    fn fetch_request(ctx: &RequestContext, content_name: &str) -> HttpRequest {
        HttpRequest::get(&ctx.route)
            .header("Accept", "application/json")
            .query("appId", &ctx.app_id)
            .query("version", &ctx.app_version)
            .query("deviceId", &ctx.device_id)
            .query("sdkVersion", &ctx.sdk_version)
            .query("name", content_name)
    }

    fn action_request(
        ctx: &RequestContext,
        item_id: &str,
        action: AgreementAction,
    ) -> Result<HttpRequest, ApiError> {
        let body = ActionBody {
            app_id: &ctx.app_id,
            version: &ctx.app_version,
            device_id: &ctx.device_id,
            sdk_version: &ctx.sdk_version,
            action,
        };
        let body = serde_json::to_value(&body).map_err(|e| {
            ApiError::Transport(TransportError::Request(format!(
                "failed to encode action: {e}"
            )))
        })?;

        Ok(HttpRequest::post(Self::action_url(&ctx.route, item_id))
            .header("Accept", "application/json")
            .json(body))
    }
}

#[async_trait]
impl AgreementService for AgreementClient {
    async fn fetch_document(
        &self,
        ctx: &RequestContext,
        content_name: &str,
    ) -> Result<RawAgreementPayload, ApiError> {
        let response = self
            .http
            .request(&Self::fetch_request(ctx, content_name))
            .await?;

        if response.is_empty() {
            debug!(status = response.status, "Empty agreement response");
            return Ok(RawAgreementPayload::default());
        }

        let envelope: ApiEnvelope = response
            .json()
            .map_err(|e| ApiError::decode(e, &response))?;
        Ok(envelope.data.unwrap_or_default())
    }

    async fn submit_action(
        &self,
        ctx: &RequestContext,
        item_id: &str,
        action: AgreementAction,
    ) -> Result<(), ApiError> {
        let request = Self::action_request(ctx, item_id, action)?;
        self.http.request(&request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RequestContext {
        RequestContext {
            route: "https://x/api/".to_string(),
            app_id: "A".to_string(),
            app_version: "1.0.0".to_string(),
            device_id: "dev-1".to_string(),
            sdk_version: "0.1.0".to_string(),
        }
    }

    #[test]
    fn test_action_url() {
        assert_eq!(AgreementClient::action_url("https://x/api", "42"), "https://x/api/42");
        assert_eq!(AgreementClient::action_url("https://x/api/", "42"), "https://x/api/42");
    }

    #[test]
    fn test_fetch_request_parameters() {
        let request = AgreementClient::fetch_request(&ctx(), "Privacy");
        let keys: Vec<&str> = request.query.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["appId", "version", "deviceId", "sdkVersion", "name"]);
        assert!(request.query.contains(&("name".to_string(), "Privacy".to_string())));
    }

    #[test]
    fn test_action_request_body() {
        let request = AgreementClient::action_request(&ctx(), "42", AgreementAction::View).unwrap();
        assert_eq!(request.url, "https://x/api/42");
        let body = request.body.unwrap();
        assert_eq!(body["action"], "VIEW");
        assert_eq!(body["appId"], "A");
        assert_eq!(body["version"], "1.0.0");
    }

    #[test]
    fn test_error_classification() {
        let err = ApiError::from(TransportError::Status {
            status: 404,
            body: "missing".into(),
        });
        assert_eq!(err.kind(), ApiErrorKind::HttpStatus);
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.body(), Some("missing"));

        let err = ApiError::from(TransportError::Timeout);
        assert_eq!(err.kind(), ApiErrorKind::Network);
        assert_eq!(err.status(), None);

        let err = ApiError::Decode {
            message: "expected value".into(),
            body: Some("<html>".into()),
        };
        assert_eq!(err.kind(), ApiErrorKind::Decode);
        assert_eq!(err.body(), Some("<html>"));
    }
}
