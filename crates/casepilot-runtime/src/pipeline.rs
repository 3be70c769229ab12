//! Wiring of the investigation pipeline: run, persist, review, replay.

use casepilot_config::CasepilotConfig;
use casepilot_core::{CriticVerdict, InvestigationRequest, Result, RunResult, ToolGateway, TraceStore};
use casepilot_llm::LlmProvider;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::critic::Critic;
use crate::investigator::Investigator;
use crate::prompts;
use crate::replay::{Paraphraser, ReplayEngine};

/// Owns every long-lived component. Built once at startup.
pub struct Pipeline {
    investigator: Arc<Investigator>,
    critic: Arc<Critic>,
    store: Arc<dyn TraceStore>,
    replay: ReplayEngine,
}

impl Pipeline {
    pub fn new(
        investigator: Arc<Investigator>,
        critic: Arc<Critic>,
        replay: ReplayEngine,
        store: Arc<dyn TraceStore>,
    ) -> Self {
        Self {
            investigator,
            critic,
            store,
            replay,
        }
    }

    /// Build all components from configuration around one provider, gateway and store.
    pub fn from_config(
        config: &CasepilotConfig,
        provider: Arc<dyn LlmProvider>,
        gateway: Arc<dyn ToolGateway>,
        store: Arc<dyn TraceStore>,
    ) -> Result<Self> {
        let system_prompt = prompts::load_system_prompt(config.agent.system_prompt_file.as_deref())?;
        let investigator = Arc::new(
            Investigator::new(Arc::clone(&provider), gateway, config.agent.clone())
                .with_system_prompt(system_prompt),
        );
        let critic = Arc::new(Critic::new(Arc::clone(&provider), config.critic.clone()));
        let paraphraser = Paraphraser::new(
            provider,
            config.replay.model.clone(),
            config.replay.max_tokens,
        );
        let replay = ReplayEngine::new(
            Arc::clone(&investigator),
            paraphraser,
            Arc::clone(&store),
            config.replay.clone(),
        );
        Ok(Self::new(investigator, critic, replay, store))
    }

    pub fn investigator(&self) -> &Investigator {
        &self.investigator
    }

    pub fn critic(&self) -> &Critic {
        &self.critic
    }

    pub fn replay(&self) -> &ReplayEngine {
        &self.replay
    }

    pub fn store(&self) -> &Arc<dyn TraceStore> {
        &self.store
    }

    /// Run and persist an investigation; the critic reviews it in the background.
    pub async fn investigate(&self, request: &InvestigationRequest) -> RunResult {
        let run = self.investigator.run(request).await;
        self.persist(&run, request);
        self.spawn_review(&run);
        run
    }

    /// Run and persist an investigation, then wait for the critic.
    pub async fn investigate_reviewed(
        &self,
        request: &InvestigationRequest,
    ) -> (RunResult, Option<CriticVerdict>) {
        let run = self.investigator.run(request).await;
        self.persist(&run, request);
        if !self.should_review(&run) {
            return (run, None);
        }
        let verdict = self.critic.review_run(&run).await.into_verdict();
        if let Err(e) = self.store.save_critic(run.trace_id, &verdict) {
            warn!(trace_id = %run.trace_id, error = %e, "failed to persist critic verdict");
        }
        (run, Some(verdict))
    }

    fn should_review(&self, run: &RunResult) -> bool {
        self.critic.is_enabled() && !run.is_failed()
    }

    fn persist(&self, run: &RunResult, request: &InvestigationRequest) {
        if let Err(e) = self.store.save_run(run, request) {
            warn!(trace_id = %run.trace_id, error = %e, "failed to persist run trace");
        }
    }

    fn spawn_review(&self, run: &RunResult) {
        if !self.should_review(run) {
            debug!(trace_id = %run.trace_id, "skipping critic review");
            return;
        }
        let critic = Arc::clone(&self.critic);
        let store = Arc::clone(&self.store);
        let run = run.clone();
        tokio::spawn(async move {
            let outcome = critic.review_run(&run).await;
            if let Err(e) = store.save_critic(run.trace_id, outcome.verdict()) {
                warn!(trace_id = %run.trace_id, error = %e, "failed to persist critic verdict");
            }
        });
    }
}
