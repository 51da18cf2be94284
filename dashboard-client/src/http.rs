use crate::config::ClientConfig;
use crate::credentials::Credentials;
use error_stack::{Report, ResultExt};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use sync_engine::entity::EntityId;
use sync_engine::envelope;
use sync_engine::error::RequestError;
use sync_engine::query::QueryParams;
use sync_engine::transport::{Transport, TransportResult, Verb};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, thiserror::Error)]
#[error("failed to build the http transport")]
pub struct TransportError;

/// One request, kept as data so it can be sent a second time after re-authentication.
struct Call<'a> {
    method: Method,
    url: Url,
    query: Vec<(String, String)>,
    body: Option<&'a Value>,
}

/// [`Transport`] over HTTP, speaking the dashboard's REST conventions.
pub struct HttpTransport<C> {
    client: Client,
    base_url: Url,
    timeout: Duration,
    credentials: C,
}

impl<C> HttpTransport<C>
where
    C: Credentials,
{
    pub fn new(config: &ClientConfig, credentials: C) -> Result<Self, Report<TransportError>> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .change_context(TransportError)?;
        Self::with_client(client, config, credentials)
    }

    /// Uses a preconfigured client. The client's own timeout, if any, still applies.
    pub fn with_client(
        client: Client,
        config: &ClientConfig,
        credentials: C,
    ) -> Result<Self, Report<TransportError>> {
        let base_url = Url::parse(&config.api_url)
            .change_context(TransportError)
            .attach_with(|| format!("api url '{}'", config.api_url))?;
        if base_url.cannot_be_a_base() {
            return Err(Report::new(TransportError)
                .attach(format!("api url '{}' cannot take path segments", config.api_url)));
        }

        Ok(Self {
            client,
            base_url,
            timeout: config.request_timeout,
            credentials,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `resource` and `id` are each pushed as one percent-encoded path segment.
    fn url(&self, resource: &str, id: Option<&EntityId>) -> Url {
        let mut url = self.base_url.clone();
        // base urls that cannot take segments are rejected in `with_client`
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(resource);
            if let Some(id) = id {
                segments.push(&id.to_string());
            }
        }
        url
    }

    async fn builder(&self, call: &Call<'_>) -> RequestBuilder {
        let mut builder = self.client.request(call.method.clone(), call.url.clone());
        if !call.query.is_empty() {
            builder = builder.query(&call.query);
        }
        if let Some(body) = call.body {
            builder = builder.json(body);
        }
        if let Some(token) = self.credentials.token().await {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn attempt(&self, call: &Call<'_>) -> TransportResult<Response> {
        self.builder(call)
            .await
            .send()
            .await
            .map_err(|e| self.send_error(e))
    }

    /// Sends `call`. A `401` is answered by re-authenticating and, if that worked,
    /// sending the call one more time. The second answer is final either way.
    #[instrument(skip_all, name = "http#execute", fields(method = %call.method, url = %call.url))]
    async fn execute(&self, call: Call<'_>) -> TransportResult<Value> {
        let response = self.attempt(&call).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return self.finish(response).await;
        }

        if self.credentials.reauthenticate().await {
            info!("re-authenticated after 401, replaying request once");
            let replayed = self.attempt(&call).await?;
            return self.finish(replayed).await;
        }

        warn!("request unauthorized and re-authentication failed");
        self.finish(response).await
    }

    async fn finish(&self, response: Response) -> TransportResult<Value> {
        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| self.send_error(e))?;

        if status.is_success() {
            if bytes.is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_slice(&bytes).map_err(|e| RequestError::Decode(e.to_string()));
        }

        let message = serde_json::from_slice::<Value>(&bytes)
            .ok()
            .as_ref()
            .and_then(envelope::error_message);
        debug!(status = status.as_u16(), ?message, "request failed");
        Err(RequestError::server(status.as_u16(), message))
    }

    fn send_error(&self, error: reqwest::Error) -> RequestError {
        if error.is_timeout() {
            RequestError::Timeout(self.timeout)
        } else {
            RequestError::Network(error.to_string())
        }
    }
}

impl<C> Transport for HttpTransport<C>
where
    C: Credentials,
{
    async fn list(&self, resource: &str, params: &QueryParams) -> TransportResult<Value> {
        self.execute(Call {
            method: Method::GET,
            url: self.url(resource, None),
            query: params.to_pairs(),
            body: None,
        })
        .await
    }

    async fn get(&self, resource: &str, id: &EntityId) -> TransportResult<Value> {
        self.execute(Call {
            method: Method::GET,
            url: self.url(resource, Some(id)),
            query: Vec::new(),
            body: None,
        })
        .await
    }

    async fn send(
        &self,
        verb: Verb,
        resource: &str,
        id: Option<&EntityId>,
        body: Option<&Value>,
    ) -> TransportResult<Value> {
        let method = match verb {
            Verb::Create => Method::POST,
            Verb::Update => Method::PUT,
            Verb::Delete => Method::DELETE,
        };
        self.execute(Call {
            method,
            url: self.url(resource, id),
            query: Vec::new(),
            body,
        })
        .await
    }
}
