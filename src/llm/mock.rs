use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::{LanguageModel, OutputSchema, Prompt};

type Handler = Box<dyn Fn(&Prompt, Option<&OutputSchema>) -> Result<Value> + Send + Sync>;

/// Deterministic model for tests: answers via a closure and records every call
pub struct MockModel {
    handler: Handler,
    calls: Mutex<Vec<RecordedCall>>,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: String,
    pub user: String,
    pub schema: Option<String>,
}

impl MockModel {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Prompt, Option<&OutputSchema>) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always returns the same value
    pub fn returning(value: Value) -> Self {
        Self::new(move |_, _| Ok(value.clone()))
    }

    /// Every call fails
    pub fn failing() -> Self {
        Self::new(|_, _| Err(anyhow::anyhow!("connection reset")))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn invoke(&self, prompt: &Prompt, schema: Option<&OutputSchema>) -> Result<Value> {
        self.calls.lock().unwrap().push(RecordedCall {
            system: prompt.system.clone(),
            user: prompt.user.clone(),
            schema: schema.map(|s| s.name.clone()),
        });
        (self.handler)(prompt, schema)
    }
}
