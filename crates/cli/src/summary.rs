//! End-of-run summary lines.

use nodes::PipelineOutcome;
use pipeline::{PipelineMetrics, StageMetrics};
use tracing::info;

/// One row of the metrics table, as logged.
fn metrics_row(label: &str, m: &StageMetrics) -> String {
    format!(
        "{label:<11} calls={:<3} retries={:<2} failed={:<2} words_in={:<7} words_out={:<7} tokens_in={:<7} tokens_out={:<7} latency={:.1}s",
        m.calls,
        m.retries,
        m.failures,
        m.words_in,
        m.words_out,
        m.prompt_tokens.as_u64(),
        m.completion_tokens.as_u64(),
        m.latency_ms as f64 / 1000.0,
    )
}

/// The per-stage table followed by the total row.
pub fn metrics_table(metrics: &PipelineMetrics) -> Vec<String> {
    let mut rows: Vec<String> = metrics
        .stages()
        .map(|(stage, m)| metrics_row(stage.as_str(), m))
        .collect();
    rows.push(metrics_row("total", &metrics.total()));
    rows
}

/// Logs the outcome of a synthesis run.
pub fn log_outcome(outcome: &PipelineOutcome) {
    let verdict = if outcome.validation.passed {
        "PASSED"
    } else {
        "FAILED"
    };
    info!(
        run_id = %outcome.run_id,
        sources = outcome.source_count,
        cards = outcome.cards.len(),
        scores = outcome.scores.len(),
        attempts = outcome.attempts,
        overall = outcome.validation.quality_scores.overall,
        threshold = outcome.validation.target_threshold,
        "synthesis {verdict} after {} attempt(s)",
        outcome.attempts
    );
    for issue in &outcome.validation.issues {
        info!("unresolved issue: {issue}");
    }
}

/// Logs the metrics table, one line per stage.
pub fn log_metrics(metrics: &PipelineMetrics) {
    for row in metrics_table(metrics) {
        info!("{row}");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pipeline::{CallRecord, Stage, TokenCount};

    use super::*;

    #[test]
    fn table_lists_called_stages_then_total() {
        let mut metrics = PipelineMetrics::new();
        let call = CallRecord {
            words_in: 100,
            words_out: 40,
            prompt_tokens: TokenCount::new(130),
            completion_tokens: TokenCount::new(55),
            latency: Duration::from_millis(1500),
            attempts: 2,
            failed: false,
        };
        metrics.record(Stage::Score, &call);
        metrics.record(Stage::Extract, &call);
        metrics.record(Stage::Score, &call);

        let rows = metrics_table(&metrics);

        assert_eq!(rows.len(), 3);
        assert!(rows[0].starts_with("extract"));
        assert!(rows[1].starts_with("score"));
        assert!(rows[1].contains("calls=2"));
        assert!(rows[1].contains("retries=2"));
        assert!(rows[2].starts_with("total"));
        assert!(rows[2].contains("calls=3"));
        assert!(rows[2].contains("latency=4.5s"));
    }

    #[test]
    fn empty_metrics_still_have_a_total_row() {
        let rows = metrics_table(&PipelineMetrics::new());
        assert_eq!(rows.len(), 1);
        assert!(rows[0].contains("calls=0"));
    }
}
