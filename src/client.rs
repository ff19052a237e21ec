use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::settings::ApiCredentials;
use crate::sse::process_sse;
use crate::stream::FragmentStream;
use crate::types::{ChatCompletion, CompletionRequest, CompletionResult};

const COMPLETIONS_PATH: &str = "chat/completions";

/// A completion service.
///
/// [`OpenAi`] talks to the real endpoint; the interactive loop and the memory
/// adapter only depend on this trait.
#[async_trait]
pub trait Completions: Send + Sync {
    /// Perform a buffered completion.
    ///
    /// An error payload inside a successful response is returned as the result
    /// text.  A response with no completion object fails with [`Error::NoResponse`].
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult>;

    /// Open a streaming completion.
    ///
    /// A rate-limited request yields an already finished [`FragmentStream`] whose
    /// [`FragmentStream::rate_limit`] is set, rather than an error.
    async fn complete_stream(&self, request: &CompletionRequest) -> Result<FragmentStream>;
}

/// Client for an OpenAI-compatible chat completion API.
#[derive(Debug, Clone)]
pub struct OpenAi {
    credentials: ApiCredentials,
    client: ReqwestClient,
    endpoint: Url,
}

impl OpenAi {
    /// Create a new client.
    pub fn new(credentials: ApiCredentials) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(credentials.timeout())
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;
        let endpoint = credentials.base_url().join(COMPLETIONS_PATH)?;

        Ok(Self {
            credentials,
            client,
            endpoint,
        })
    }

    /// Create a client from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::new(ApiCredentials::from_env()?)
    }

    /// The URL completions are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.credentials.api_key()))
            .map_err(|_| Error::configuration("API key contains invalid header characters"))?;
        headers.insert(header::AUTHORIZATION, bearer);
        Ok(headers)
    }

    async fn post(&self, request: &CompletionRequest, headers: HeaderMap) -> Result<Response> {
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            streaming = request.streaming,
            "sending completion request"
        );
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(headers)
            .json(&request.body())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {e}"),
                        Some(self.credentials.timeout().as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
                }
            })?;
        tracing::debug!(status = %response.status(), "completion response received");
        Ok(response)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|val| val.to_str().ok())
            .map(String::from);

        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.trim().parse::<u64>().ok());

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<ErrorDetail>,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            #[serde(rename = "type")]
            error_type: Option<String>,
            message: Option<String>,
            param: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let detail = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error);
        let error_type = detail.as_ref().and_then(|e| e.error_type.clone());
        let error_message = detail
            .as_ref()
            .and_then(|e| e.message.clone())
            .unwrap_or_else(|| error_body.clone());
        let error_param = detail.as_ref().and_then(|e| e.param.clone());

        match status_code {
            400 => Error::bad_request(error_message, error_param),
            401 => Error::authentication(error_message),
            403 => Error::permission(error_message),
            404 => Error::not_found(error_message),
            408 => Error::timeout(error_message, None),
            429 => Error::rate_limit(error_message, retry_after),
            500 => Error::internal_server(error_message, request_id),
            502..=504 => Error::service_unavailable(error_message, retry_after),
            _ => Error::api(status_code, error_type, error_message, request_id),
        }
    }
}

#[async_trait]
impl Completions for OpenAi {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult> {
        let request = request.clone().streaming(false);
        let response = self.post(&request, self.default_headers()?).await?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let body = response.text().await.map_err(|e| {
            Error::http_client(format!("Failed to read response: {e}"), Some(Box::new(e)))
        })?;
        interpret_completion(&body)
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<FragmentStream> {
        let request = request.clone().streaming(true);

        let mut headers = self.default_headers()?;
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let response = self.post(&request, headers).await?;

        if !response.status().is_success() {
            let err = Self::process_error_response(response).await;
            if err.is_rate_limit() {
                tracing::warn!(error = %err, "completion request rate limited");
                return Ok(FragmentStream::rate_limited(err));
            }
            return Err(err);
        }

        Ok(FragmentStream::from_events(process_sse(response.bytes_stream())))
    }
}

/// Turn a successful buffered response body into a result.
///
/// - an empty body or JSON `null` is [`Error::NoResponse`];
/// - an `error` payload becomes a [`CompletionResult::ServiceMessage`];
/// - otherwise the first choice's content is the result;
/// - a completion object with neither choices nor error is [`Error::NoResponse`].
pub fn interpret_completion(body: &str) -> Result<CompletionResult> {
    let body = body.trim();
    if body.is_empty() {
        return Err(Error::no_response("the service returned an empty body"));
    }
    let Some(completion) = serde_json::from_str::<Option<ChatCompletion>>(body)? else {
        return Err(Error::no_response("the service returned no completion"));
    };
    if let Some(error) = completion.error {
        tracing::info!(message = %error.message, "service returned an error payload");
        return Ok(CompletionResult::ServiceMessage(error.message));
    }
    completion
        .choices
        .into_iter()
        .next()
        .map(|choice| CompletionResult::Full(choice.message.content))
        .ok_or_else(|| Error::no_response("the completion contained no choices"))
}
