use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{ApiEnvelope, BackendApi, TransitionAck, TransitionRequest};
use crate::config::{BackendConfig, BearerToken};
use crate::domain::order::{Order, OrderCommand, OrderId, OrderStatus, RemoteFailure};
use crate::metrics::DispatchMetrics;
use crate::utils::{CircuitBreaker, CircuitBreakerError, CircuitState};

/// reqwest client for the storefront order endpoints.
///
/// Transport failures (timeouts, refused connections) go through a circuit
/// breaker; HTTP error statuses do not, since the server answered.
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    token: Option<BearerToken>,
    circuit_breaker: CircuitBreaker,
    metrics: Option<Arc<DispatchMetrics>>,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("invalid backend base URL: {}", config.base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("backend base URL cannot carry a path: {}", config.base_url);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
            circuit_breaker: CircuitBreaker::new("order-api", config.circuit_breaker.clone()),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<DispatchMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state().await
    }

    /// `{base}/order/{id}[/{action}]`
    fn endpoint(&self, order_id: &OrderId, action: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was ruled out in `new`
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("order").push(order_id.as_str());
            if let Some(action) = action {
                segments.push(action);
            }
        }
        url
    }

    async fn send(&self, request: RequestBuilder, request_id: Uuid) -> Result<Response, RemoteFailure> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        };
        let request = request.header("X-Request-Id", request_id.to_string());

        let result = self.circuit_breaker.call(request.send()).await;

        if let Some(metrics) = &self.metrics {
            metrics.set_circuit_breaker_state(self.circuit_breaker.state().await.as_gauge());
        }

        match result {
            Ok(response) => Ok(response),
            Err(CircuitBreakerError::CircuitOpen) => {
                tracing::warn!(request_id = %request_id, "Circuit breaker open - backend call skipped");
                Err(RemoteFailure::Unreachable("circuit breaker open".to_string()))
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                let reason = if e.is_timeout() {
                    format!("request timed out: {e}")
                } else if e.is_connect() {
                    format!("connection failed: {e}")
                } else {
                    e.to_string()
                };
                tracing::error!(request_id = %request_id, error = %reason, "Backend transport failure");
                Err(RemoteFailure::Unreachable(reason))
            }
        }
    }
}

/// Unwrap the `{success, message, data}` envelope, classifying failures
async fn read_data(order_id: &OrderId, response: Response) -> Result<Option<Value>, RemoteFailure> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| RemoteFailure::Unreachable(format!("failed to read response body: {e}")))?;

    let envelope: Option<ApiEnvelope> = serde_json::from_str(&body).ok();
    let message = envelope
        .as_ref()
        .and_then(|envelope| envelope.message.clone())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("no message").to_string()
            } else {
                body.clone()
            }
        });

    match status {
        StatusCode::NOT_FOUND => Err(RemoteFailure::NotFound(order_id.clone())),
        StatusCode::CONFLICT => {
            let remote_status = envelope
                .and_then(|envelope| envelope.data)
                .and_then(|data| data.get("status").and_then(Value::as_str).map(str::to_string))
                .and_then(|raw| raw.parse::<OrderStatus>().ok());
            Err(RemoteFailure::Conflict {
                message,
                remote_status,
            })
        }
        StatusCode::REQUEST_TIMEOUT
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => Err(RemoteFailure::Unreachable(format!("{status}: {message}"))),
        s if !s.is_success() => Err(RemoteFailure::Rejected {
            status: Some(s.as_u16()),
            message,
        }),
        s => match envelope {
            Some(envelope) if envelope.success => Ok(envelope.data),
            Some(_) => Err(RemoteFailure::Rejected {
                status: Some(s.as_u16()),
                message,
            }),
            None => Err(RemoteFailure::Rejected {
                status: Some(s.as_u16()),
                message: "response is not a JSON envelope".to_string(),
            }),
        },
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn submit(&self, request: &TransitionRequest) -> Result<TransitionAck, RemoteFailure> {
        let transition = request.command.transition();
        let url = self.endpoint(&request.order_id, Some(transition.as_str()));

        let builder = match &request.command {
            OrderCommand::Cancel { reason } => self
                .client
                .post(url)
                .json(&json!({ "cancelReason": reason.as_str() })),
            _ => self.client.post(url),
        };

        tracing::debug!(
            order_id = %request.order_id,
            transition = %transition,
            role = %request.actor.role,
            request_id = %request.request_id,
            "Submitting transition to backend"
        );

        let response = self.send(builder, request.request_id).await?;

        match read_data(&request.order_id, response).await? {
            None | Some(Value::Null) => Ok(TransitionAck::default()),
            Some(data) => serde_json::from_value(data).map_err(|e| RemoteFailure::Rejected {
                status: None,
                message: format!("unexpected transition payload: {e}"),
            }),
        }
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, RemoteFailure> {
        let url = self.endpoint(order_id, None);
        let response = self.send(self.client.get(url), Uuid::new_v4()).await?;

        let data = read_data(order_id, response)
            .await?
            .ok_or_else(|| RemoteFailure::Rejected {
                status: None,
                message: "order payload missing".to_string(),
            })?;

        serde_json::from_value(data).map_err(|e| RemoteFailure::Rejected {
            status: None,
            message: format!("invalid order payload: {e}"),
        })
    }
}
