use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Supplies the bearer token for outgoing requests and renews it when the server
/// answers `401`.
pub trait Credentials: Send + Sync + 'static {
    fn token(&self) -> impl Future<Output = Option<String>> + Send;

    /// Tries to obtain fresh credentials. `true` means the failed request is worth
    /// replaying.
    fn reauthenticate(&self) -> impl Future<Output = bool> + Send {
        async { false }
    }
}

impl<T> Credentials for Arc<T>
where
    T: Credentials,
{
    async fn token(&self) -> Option<String> {
        (**self).token().await
    }

    async fn reauthenticate(&self) -> bool {
        (**self).reauthenticate().await
    }
}

/// Sends no `Authorization` header at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl Credentials for NoCredentials {
    async fn token(&self) -> Option<String> {
        None
    }
}

/// A fixed token that cannot be renewed.
#[derive(Debug, Clone)]
pub struct StaticToken(Arc<str>);

impl StaticToken {
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self(token.into())
    }
}

impl Credentials for StaticToken {
    async fn token(&self) -> Option<String> {
        Some(self.0.to_string())
    }
}

/// A token that some other part of the application (a sign-in flow, a refresh task)
/// replaces over time. Re-authentication succeeds when the token changed since it was
/// last handed out.
#[derive(Debug, Clone, Default)]
pub struct SharedToken {
    inner: Arc<RwLock<TokenState>>,
}

#[derive(Debug, Default)]
struct TokenState {
    current: Option<String>,
    handed_out: Option<String>,
}

impl SharedToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(TokenState {
                current: Some(token.into()),
                handed_out: None,
            })),
        }
    }

    pub async fn set(&self, token: impl Into<String>) {
        self.inner.write().await.current = Some(token.into());
    }

    pub async fn clear(&self) {
        self.inner.write().await.current = None;
    }
}

impl Credentials for SharedToken {
    async fn token(&self) -> Option<String> {
        let mut state = self.inner.write().await;
        state.handed_out = state.current.clone();
        state.current.clone()
    }

    async fn reauthenticate(&self) -> bool {
        let state = self.inner.read().await;
        let renewed = state.current.is_some() && state.current != state.handed_out;
        debug!(renewed, "shared token re-authentication");
        renewed
    }
}
