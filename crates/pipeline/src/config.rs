//! Run configuration.
//!
//! The pipeline places no constraints on where these values come from; the
//! CLI fills them from flags and defaults. [`PipelineConfig::validate`] is
//! called once before a run starts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Stage};

/// Sampling settings for the completion calls of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageSettings {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl StageSettings {
    pub const fn new(temperature: f64, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }
}

/// Bounded fixed-delay retry for a single completion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Pause between attempts. Never grows.
    pub delay: Duration,
    /// Longest service-requested pause (`Retry-After`) honoured.
    pub max_server_delay: Duration,
}

impl RetrySettings {
    /// Default cap on a service-requested pause.
    pub const DEFAULT_MAX_SERVER_DELAY: Duration = Duration::from_secs(30);
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
            max_server_delay: Self::DEFAULT_MAX_SERVER_DELAY,
        }
    }
}

/// Per-stage sampling settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageTable {
    pub draft: StageSettings,
    pub extract: StageSettings,
    pub score: StageSettings,
    pub select: StageSettings,
    pub synthesize: StageSettings,
    pub validate: StageSettings,
}

impl StageTable {
    pub fn get(&self, stage: Stage) -> StageSettings {
        match stage {
            Stage::Draft => self.draft,
            Stage::Extract => self.extract,
            Stage::Score => self.score,
            Stage::Select => self.select,
            Stage::Synthesize => self.synthesize,
            Stage::Validate => self.validate,
        }
    }
}

impl Default for StageTable {
    fn default() -> Self {
        Self {
            draft: StageSettings::new(0.7, 4000),
            extract: StageSettings::new(0.3, 4000),
            score: StageSettings::new(0.2, 4000),
            select: StageSettings::new(0.4, 6000),
            synthesize: StageSettings::new(0.7, 8000),
            validate: StageSettings::new(0.2, 4000),
        }
    }
}

/// Everything one run needs to know besides its inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Drafts to generate before synthesis.
    pub draft_count: u32,
    /// Independent scoring votes per card.
    pub scoring_votes: u32,
    /// Synthesize/validate attempts before giving up.
    pub max_synthesis_attempts: u32,
    /// Approximate length of the final article.
    pub target_word_count: u32,
    /// Whole-request attempts per draft during extraction.
    pub extraction_attempts: u32,
    pub stages: StageTable,
    pub retry: RetrySettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            draft_count: 10,
            scoring_votes: 3,
            max_synthesis_attempts: 3,
            target_word_count: 1500,
            extraction_attempts: 3,
            stages: StageTable::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Checks that every count is positive and every temperature usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let counts = [
            ("draft_count", self.draft_count),
            ("scoring_votes", self.scoring_votes),
            ("max_synthesis_attempts", self.max_synthesis_attempts),
            ("target_word_count", self.target_word_count),
            ("extraction_attempts", self.extraction_attempts),
            ("retry.attempts", self.retry.attempts),
        ];
        for (field, value) in counts {
            if value == 0 {
                return Err(ConfigError::ZeroCount { field });
            }
        }

        for stage in Stage::ALL {
            let settings = self.stages.get(stage);
            if !settings.temperature.is_finite() || settings.temperature < 0.0 {
                return Err(ConfigError::InvalidTemperature {
                    field: stage_temperature_field(stage),
                    value: settings.temperature,
                });
            }
            if settings.max_tokens == 0 {
                return Err(ConfigError::ZeroCount {
                    field: stage_max_tokens_field(stage),
                });
            }
        }

        Ok(())
    }
}

fn stage_temperature_field(stage: Stage) -> &'static str {
    match stage {
        Stage::Draft => "stages.draft.temperature",
        Stage::Extract => "stages.extract.temperature",
        Stage::Score => "stages.score.temperature",
        Stage::Select => "stages.select.temperature",
        Stage::Synthesize => "stages.synthesize.temperature",
        Stage::Validate => "stages.validate.temperature",
    }
}

fn stage_max_tokens_field(stage: Stage) -> &'static str {
    match stage {
        Stage::Draft => "stages.draft.max_tokens",
        Stage::Extract => "stages.extract.max_tokens",
        Stage::Score => "stages.score.max_tokens",
        Stage::Select => "stages.select.max_tokens",
        Stage::Synthesize => "stages.synthesize.max_tokens",
        Stage::Validate => "stages.validate.max_tokens",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(PipelineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_votes_are_rejected() {
        let config = PipelineConfig {
            scoring_votes: 0,
            ..PipelineConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroCount {
                field: "scoring_votes"
            })
        );
    }

    #[test]
    fn negative_temperature_is_rejected() {
        let mut config = PipelineConfig::default();
        config.stages.synthesize.temperature = -0.1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTemperature {
                field: "stages.synthesize.temperature",
                ..
            })
        ));
    }

    #[test]
    fn stage_lookup_matches_fields() {
        let table = StageTable::default();
        assert_eq!(table.get(Stage::Select).max_tokens, 6000);
        assert_eq!(table.get(Stage::Score).temperature, 0.2);
    }
}
