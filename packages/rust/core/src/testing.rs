//! Scripted generation backend for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use sidequest_shared::{Result, SidequestError};

use crate::generation::{GenerationRequest, GenerationService};
use crate::trace::StageId;

pub(crate) enum Reply {
    Text(String),
    Fail(&'static str),
    Hang,
}

/// Answers each stage with a fixed reply and records what it was sent.
#[derive(Default)]
pub(crate) struct ScriptedGeneration {
    replies: HashMap<StageId, Reply>,
    requests: Mutex<Vec<(StageId, Value)>>,
}

impl ScriptedGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, stage: StageId, reply: Reply) -> Self {
        self.replies.insert(stage, reply);
        self
    }

    pub fn json(self, stage: StageId, value: Value) -> Self {
        self.reply(stage, Reply::Text(value.to_string()))
    }

    pub fn calls(&self) -> Vec<StageId> {
        self.requests.lock().unwrap().iter().map(|(s, _)| *s).collect()
    }

    pub fn payload(&self, stage: StageId) -> Option<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, p)| p.clone())
    }
}

#[async_trait]
impl GenerationService for ScriptedGeneration {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push((request.stage, request.payload));

        match self.replies.get(&request.stage) {
            Some(Reply::Text(text)) => Ok(text.clone()),
            Some(Reply::Fail(message)) => Err(SidequestError::Generation((*message).to_string())),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(SidequestError::Generation(format!(
                "no scripted reply for {}",
                request.stage
            ))),
        }
    }
}
