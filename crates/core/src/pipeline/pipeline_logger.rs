use std::collections::HashMap;

/// Cross-cutting logger for swap pipeline events.
///
/// Decouples the use case from specific output mechanisms so callers can
/// observe stage timings without changing the orchestration code.
pub trait PipelineLogger: Send {
    /// Record how long a named pipeline stage took for one request.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces found in the target).
    fn metric(&mut self, name: &str, value: f64);

    /// Emit a summary of everything recorded so far. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
///
/// Used by tests where logger output is irrelevant.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
}

/// Running count and total for one stage or metric.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aggregate {
    pub count: u64,
    pub total: f64,
}

impl Aggregate {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// `log`-backed logger for a long-running service.
///
/// Each timing is emitted at debug level as it happens; aggregates are kept
/// as running totals so memory stays constant however many requests pass
/// through.
#[derive(Default)]
pub struct LogPipelineLogger {
    timings: HashMap<String, Aggregate>,
    metrics: HashMap<String, Aggregate>,
}

impl LogPipelineLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the formatted summary string, or `None` if no data recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }
        let mut lines = vec!["Pipeline summary:".to_string()];

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, agg) in stages {
            lines.push(format!(
                "  {stage:8}: avg {:6.1}ms  total {:8.0}ms  ({} runs)",
                agg.average(),
                agg.total,
                agg.count
            ));
        }

        let mut names: Vec<_> = self.metrics.iter().collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        for (name, agg) in names {
            lines.push(format!("  {name}: avg {:.1}", agg.average()));
        }
        Some(lines.join("\n"))
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        log::debug!("{stage} took {duration_ms:.1}ms");
        self.timings
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().record(value);
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
