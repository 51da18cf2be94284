use crate::service::ResourceService;
use axum::extract::FromRef;
use std::sync::Arc;

#[derive(Clone)]
pub struct ServerState {
    pub service: ResourceService,
    pub metrics_enabled: bool,
    /// When set, every resource request must carry `Authorization: Bearer <token>`.
    pub token: Option<Arc<str>>,
}

impl ServerState {
    pub fn new_with_metrics(service: ResourceService) -> Self {
        Self {
            service,
            metrics_enabled: true,
            token: None,
        }
    }

    pub fn new_without_metrics(service: ResourceService) -> Self {
        Self {
            service,
            metrics_enabled: false,
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<Arc<str>>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl FromRef<ServerState> for ResourceService {
    fn from_ref(input: &ServerState) -> Self {
        input.service.clone()
    }
}
