#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use ideo_api::{MemoryStore, Pipeline, PipelineConfig, ReferenceQuery};
use ideo_core::{
    CallerIdentity, ReferenceOrder, ReferenceRecord, ReferenceZone, TemplateVariant,
    UsageCommitPolicy,
};
use ideo_suggest::{GenerationRequest, Generator, ProviderError};
use tokio::sync::Barrier;

/// Generator double: answers with a fixed reply (or fails) and remembers what
/// it was asked.
pub struct ScriptedGenerator {
    reply: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    roles: Mutex<Vec<String>>,
    gate: Option<Arc<Barrier>>,
}

impl ScriptedGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            roles: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            ..Self::replying("")
        }
    }

    /// Hold every call until `parties` calls are in flight at once.
    pub fn gated(mut self, parties: usize) -> Self {
        self.gate = Some(Arc::new(Barrier::new(parties)));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn roles(&self) -> Vec<String> {
        self.roles.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.to_string());
        self.roles.lock().unwrap().push(request.role_framing.to_string());
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
        self.reply
            .clone()
            .ok_or_else(|| ProviderError::Chat("scripted failure".to_string()))
    }
}

pub fn config(limit: u32) -> PipelineConfig {
    PipelineConfig {
        daily_limit: limit,
        model: "gpt-4o".to_string(),
        template: TemplateVariant::DirectTopic,
        time_zone: ReferenceZone::Utc,
        usage_commit: UsageCommitPolicy::BestEffort,
        references: ReferenceQuery {
            limit: 25,
            order: ReferenceOrder::Store,
            label_column: None,
        },
    }
}

pub fn caller(id: &str) -> CallerIdentity {
    CallerIdentity::parse(Some(id)).unwrap()
}

/// Store with `used` ledger rows stamped now and one reference row per title.
pub fn seeded_store(id: &str, used: usize, titles: &[&str]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let who = caller(id);
    let now = Utc::now();
    for _ in 0..used {
        store.seed_usage(&who, now);
    }
    for title in titles {
        store.seed_reference(&who, ReferenceRecord::titled(*title), 0);
    }
    store
}

pub fn pipeline(
    store: &Arc<MemoryStore>,
    generator: &Arc<ScriptedGenerator>,
    config: PipelineConfig,
) -> Pipeline {
    Pipeline::new(store.clone(), generator.clone(), config)
}
