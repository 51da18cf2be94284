use crate::entity::EntityId;
use crate::error::RequestError;
use crate::query::QueryParams;
use crate::resource::ResourceDescriptor;
use crate::transport::{Transport, TransportResult, Verb};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) static PIPELINES: ResourceDescriptor =
    ResourceDescriptor::new("pipelines", "Pipeline", "Pipelines");
pub(crate) static STAGES: ResourceDescriptor =
    ResourceDescriptor::new("lead-stages", "Lead stage", "LeadStages");

struct Scripted {
    delay: Duration,
    outcome: TransportResult<Value>,
}

#[derive(Debug, PartialEq, Clone)]
pub(crate) struct Recorded {
    pub method: &'static str,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Answers calls in order from a script, whatever the call is.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    calls: AtomicUsize,
    recorded: Mutex<Vec<Recorded>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, body: Value) -> Self {
        self.respond_after(Duration::ZERO, body)
    }

    pub fn respond_after(self, delay: Duration, body: Value) -> Self {
        self.push(delay, Ok(body))
    }

    pub fn fail(self, error: RequestError) -> Self {
        self.fail_after(Duration::ZERO, error)
    }

    pub fn fail_after(self, delay: Duration, error: RequestError) -> Self {
        self.push(delay, Err(error))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }

    pub fn last_path(&self) -> Option<String> {
        self.recorded.lock().unwrap().last().map(|r| r.path.clone())
    }

    fn push(self, delay: Duration, outcome: TransportResult<Value>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted { delay, outcome });
        self
    }

    async fn answer(&self, recorded: Recorded) -> TransportResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.recorded.lock().unwrap().push(recorded);

        let next = self.script.lock().unwrap().pop_front();
        let Some(Scripted { delay, outcome }) = next else {
            return Err(RequestError::Network("no scripted response left".to_string()));
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}

impl Transport for ScriptedTransport {
    async fn list(&self, resource: &str, params: &QueryParams) -> TransportResult<Value> {
        self.answer(Recorded {
            method: "GET",
            path: resource.to_string(),
            query: params.to_pairs(),
            body: None,
        })
        .await
    }

    async fn get(&self, resource: &str, id: &EntityId) -> TransportResult<Value> {
        self.answer(Recorded {
            method: "GET",
            path: format!("{resource}/{id}"),
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
        let path = match id {
            Some(id) => format!("{resource}/{id}"),
            None => resource.to_string(),
        };
        self.answer(Recorded {
            method: verb.method(),
            path,
            query: Vec::new(),
            body: body.cloned(),
        })
        .await
    }
}
