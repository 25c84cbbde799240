use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for scheduler events on the result-assembly path.
///
/// Called from a single thread per session; implementations never need
/// internal locking.
pub trait PipelineLogger: Send {
    /// Duration of one named stage (`detect`, `assemble`) for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Point-in-time sample such as face count or in-flight depth.
    fn metric(&mut self, name: &str, value: f64);

    /// Called once when a session stops. Default: no-op.
    fn summary(&mut self) {}
}

/// Discards everything.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Aggregate {
    count: usize,
    total: f64,
    max: f64,
}

impl Aggregate {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.max = self.max.max(value);
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Aggregates per-stage timings and metrics for the session and reports them
/// through `log::info!` when the session stops.
///
/// Aggregates are cleared after each summary so a restarted session starts
/// from zero.
pub struct SummaryPipelineLogger {
    timings: BTreeMap<String, Aggregate>,
    metrics: BTreeMap<String, Aggregate>,
    session_start: Instant,
}

impl SummaryPipelineLogger {
    pub fn new() -> Self {
        Self {
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            session_start: Instant::now(),
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_s = self.session_start.elapsed().as_secs_f64();
        let mut lines = vec![format!("Detection session summary ({elapsed_s:.1}s):")];

        for (stage, agg) in &self.timings {
            lines.push(format!(
                "  {stage:10}: {count:5} calls  avg {avg:6.1}ms  max {max:6.1}ms",
                count = agg.count,
                avg = agg.mean(),
                max = agg.max,
            ));
        }
        for (name, agg) in &self.metrics {
            lines.push(format!("  {name}: avg {:.1}  max {:.0}", agg.mean(), agg.max));
        }

        if let Some(detect) = self.timings.get("detect") {
            if elapsed_s > 0.0 {
                let rate = detect.count as f64 / elapsed_s;
                lines.push(format!("  Detection rate: {rate:.1}/s"));
            }
        }

        Some(lines.join("\n"))
    }

    pub fn timing_count(&self, stage: &str) -> usize {
        self.timings.get(stage).map_or(0, |a| a.count)
    }

    pub fn timing_mean(&self, stage: &str) -> Option<f64> {
        self.timings.get(stage).map(Aggregate::mean)
    }

    pub fn metric_mean(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(Aggregate::mean)
    }

    pub fn metric_max(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(|a| a.max)
    }
}

impl Default for SummaryPipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineLogger for SummaryPipelineLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings.entry(stage.to_string()).or_default().record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().record(value);
    }

    fn summary(&mut self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n{text}");
        }
        self.timings.clear();
        self.metrics.clear();
        self.session_start = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullPipelineLogger;
        logger.timing("detect", 5.0);
        logger.metric("faces", 2.0);
        logger.summary();
    }

    #[test]
    fn test_timing_aggregates() {
        let mut logger = SummaryPipelineLogger::new();
        logger.timing("detect", 10.0);
        logger.timing("detect", 30.0);
        logger.timing("assemble", 1.0);

        assert_eq!(logger.timing_count("detect"), 2);
        assert_relative_eq!(logger.timing_mean("detect").unwrap(), 20.0);
        assert_eq!(logger.timing_count("assemble"), 1);
        assert_eq!(logger.timing_count("missing"), 0);
    }

    #[test]
    fn test_metric_mean_and_max() {
        let mut logger = SummaryPipelineLogger::new();
        logger.metric("in_flight", 1.0);
        logger.metric("in_flight", 2.0);
        logger.metric("in_flight", 0.0);

        assert_relative_eq!(logger.metric_mean("in_flight").unwrap(), 1.0);
        assert_relative_eq!(logger.metric_max("in_flight").unwrap(), 2.0);
    }

    #[test]
    fn test_summary_lists_stages_and_metrics() {
        let mut logger = SummaryPipelineLogger::new();
        logger.timing("detect", 12.0);
        logger.metric("faces", 3.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Detection session summary"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("faces: avg 3.0"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(SummaryPipelineLogger::new().summary_string().is_none());
    }

    #[test]
    fn test_summary_resets_aggregates() {
        let mut logger = SummaryPipelineLogger::new();
        logger.timing("detect", 12.0);
        logger.summary();
        assert_eq!(logger.timing_count("detect"), 0);
        assert!(logger.summary_string().is_none());
    }
}
