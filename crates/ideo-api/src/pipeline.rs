use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use ideo_core::{
    CallerIdentity, QuotaWindow, ReferenceZone, Settings, TemplateVariant, UsageCommitPolicy,
};
use ideo_suggest::{GenerationRequest, Generator, ROLE_FRAMING};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::error::{Dependency, PipelineError};
use crate::fetch::ReferenceFetcher;
use crate::quota::{QuotaDecision, QuotaGuard};
use crate::store::{RecordStore, ReferenceQuery};

/// Successful response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Idea {
    pub idea: String,
}

/// Linear request states. Any state but `Responded` can move to the error
/// outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Authenticated,
    QuotaChecked,
    ReferencesFetched,
    PromptRendered,
    Generated,
    Logged,
    Responded,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::Authenticated => "authenticated",
            Stage::QuotaChecked => "quota_checked",
            Stage::ReferencesFetched => "references_fetched",
            Stage::PromptRendered => "prompt_rendered",
            Stage::Generated => "generated",
            Stage::Logged => "logged",
            Stage::Responded => "responded",
        }
    }
}

fn enter(stage: Stage) {
    tracing::Span::current().record("stage", stage.as_str());
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub daily_limit: u32,
    pub model: String,
    pub template: TemplateVariant,
    pub time_zone: ReferenceZone,
    pub usage_commit: UsageCommitPolicy,
    pub references: ReferenceQuery,
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            daily_limit: settings.daily_limit,
            model: settings.model.clone(),
            template: settings.template,
            time_zone: settings.time_zone,
            usage_commit: settings.usage_commit,
            references: ReferenceQuery {
                limit: settings.max_references,
                order: settings.reference_order,
                label_column: settings.reference_label.clone(),
            },
        }
    }
}

/// Quota check, reference fetch, prompt render, generation, usage commit. In
/// that order, one stage at a time, stopping at the first failure.
#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn RecordStore>,
    guard: QuotaGuard,
    fetcher: ReferenceFetcher,
    generator: Arc<dyn Generator>,
    config: Arc<PipelineConfig>,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn RecordStore>,
        generator: Arc<dyn Generator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            guard: QuotaGuard::new(store.clone()),
            fetcher: ReferenceFetcher::new(store.clone(), config.references.clone()),
            store,
            generator,
            config: Arc::new(config),
        }
    }

    /// Handle one request for the identity taken from the request header.
    pub async fn run(&self, raw_identity: Option<&str>) -> Result<Idea, PipelineError> {
        let span = tracing::info_span!(
            "idea.generate",
            caller = tracing::field::Empty,
            stage = Stage::Start.as_str(),
            outcome = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        );
        let started = Instant::now();

        let result = self.execute(raw_identity).instrument(span.clone()).await;

        span.record("latency_ms", started.elapsed().as_millis() as u64);
        span.in_scope(|| match &result {
            Ok(_) => {
                enter(Stage::Responded);
                span.record("outcome", "ok");
                tracing::info!("idea generated");
            }
            Err(err) => {
                span.record("outcome", err.kind());
                if err.is_refusal() {
                    tracing::info!(error = %err, "request refused");
                } else {
                    tracing::error!(error = %err, "request failed");
                }
            }
        });
        result
    }

    async fn execute(&self, raw_identity: Option<&str>) -> Result<Idea, PipelineError> {
        let caller = CallerIdentity::parse(raw_identity).ok_or(PipelineError::Unauthenticated)?;
        tracing::Span::current().record("caller", caller.as_str());
        enter(Stage::Authenticated);

        let limit = self.config.daily_limit;
        let window = QuotaWindow::current(self.config.time_zone, Utc::now());
        match self.guard.check(&caller, limit, &window).await {
            QuotaDecision::Allowed { used } => {
                tracing::debug!(used, limit, "quota available");
            }
            QuotaDecision::Denied { used } => {
                return Err(PipelineError::QuotaExceeded { used, limit });
            }
            QuotaDecision::Unavailable(reason) => {
                return Err(PipelineError::DependencyUnavailable {
                    dependency: Dependency::QuotaCheck,
                    reason,
                });
            }
        }
        enter(Stage::QuotaChecked);

        let references = self
            .fetcher
            .fetch(&caller)
            .await
            .map_err(PipelineError::NoReferenceData)?;
        tracing::debug!(count = references.len(), "references fetched");
        enter(Stage::ReferencesFetched);

        let template = ideo_suggest::template(self.config.template);
        let prompt = ideo_suggest::render(template, &references);
        enter(Stage::PromptRendered);

        let idea = self
            .generator
            .generate(&GenerationRequest {
                prompt: &prompt,
                role_framing: ROLE_FRAMING,
                model: &self.config.model,
            })
            .await?;
        enter(Stage::Generated);

        self.commit_usage(&caller).await?;
        enter(Stage::Logged);

        Ok(Idea { idea })
    }

    async fn commit_usage(&self, caller: &CallerIdentity) -> Result<(), PipelineError> {
        let Err(err) = self.store.insert_usage(caller).await else {
            return Ok(());
        };
        match self.config.usage_commit {
            UsageCommitPolicy::BestEffort => {
                // the generation is already paid for; the ledger undercounts
                tracing::error!(error = %err, "usage commit failed, returning idea anyway");
                Ok(())
            }
            UsageCommitPolicy::Required => Err(PipelineError::DependencyUnavailable {
                dependency: Dependency::UsageCommit,
                reason: err.to_string(),
            }),
        }
    }
}
