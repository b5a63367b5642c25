//! Everything a stage needs besides its inputs.

use pipeline::{ConfigError, PipelineConfig, PipelineMetrics, Rubric, Stage, StageSettings};

use crate::{CompletionError, LlmGateway, PromptLibrary};

/// Shared, read-only state for one run's stages.
#[derive(Debug, Clone)]
pub struct NodeContext {
    pub gateway: LlmGateway,
    pub prompts: PromptLibrary,
    pub rubric: Rubric,
    pub config: PipelineConfig,
}

impl NodeContext {
    /// Validates `config` once; stages assume it is valid from then on.
    pub fn new(
        gateway: LlmGateway,
        prompts: PromptLibrary,
        rubric: Rubric,
        config: PipelineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            gateway,
            prompts,
            rubric,
            config,
        })
    }

    pub fn settings(&self, stage: Stage) -> StageSettings {
        self.config.stages.get(stage)
    }

    /// Makes one completion call on behalf of `stage` and records its cost,
    /// including the cost of a call that fails.
    pub async fn call(
        &self,
        stage: Stage,
        system: &str,
        user: &str,
        metrics: &mut PipelineMetrics,
    ) -> Result<String, CompletionError> {
        match self
            .gateway
            .complete(system, user, self.settings(stage))
            .await
        {
            Ok(completion) => {
                metrics.record(stage, &completion.record);
                Ok(completion.text)
            }
            Err(failure) => {
                metrics.record(stage, &failure.record);
                Err(failure.error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pipeline::{CompletionResponse, LlmError};

    use super::*;
    use crate::testing::{scripted_context, ScriptedProvider};

    #[tokio::test]
    async fn failed_calls_are_recorded() {
        let provider = Arc::new(ScriptedProvider::from_queue([
            Err(LlmError::Http("reset".into())),
            Err(LlmError::Http("reset".into())),
            Err(LlmError::Http("reset".into())),
            Ok(CompletionResponse::text("ok")),
        ]));
        let ctx = scripted_context(&provider);
        let mut metrics = PipelineMetrics::new();

        let err = ctx
            .call(Stage::Extract, "system", "user", &mut metrics)
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::ExhaustedRetries { attempts: 3, .. }));

        let text = ctx
            .call(Stage::Extract, "system", "user", &mut metrics)
            .await
            .unwrap();
        assert_eq!(text, "ok");

        let extract = metrics.stage(Stage::Extract);
        assert_eq!(extract.calls, 2);
        assert_eq!(extract.failures, 1);
        assert_eq!(extract.retries, 2);
    }
}
