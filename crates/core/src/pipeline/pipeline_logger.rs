use std::collections::HashMap;
use std::time::Instant;

/// Observability hook for worker cycles.
///
/// Owned by the worker context, so implementations need no locking. The
/// capture context never logs through it; drop counts live in
/// [`SchedulerStats`](super::frame_scheduler::SchedulerStats).
pub trait PipelineLogger: Send {
    /// Record how long a named stage took within one cycle.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces detected, faces skipped).
    fn metric(&mut self, name: &str, value: f64);

    /// A cycle finished and published `published` results.
    fn cycle_completed(&mut self, frame_id: u64, published: usize);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything. Used by tests and embedders with their own telemetry.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn cycle_completed(&mut self, _frame_id: u64, _published: usize) {}
    fn info(&mut self, _message: &str) {}
}

/// Running count, sum and max of one named series.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SeriesStats {
    pub count: u64,
    pub sum: f64,
    pub max: f64,
}

impl SeriesStats {
    fn record(&mut self, value: f64) {
        self.max = if self.count == 0 { value } else { self.max.max(value) };
        self.count += 1;
        self.sum += value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Aggregates per-stage timings and metrics across cycles and reports
/// them through `log`.
///
/// Each series keeps only its running aggregate, so memory stays constant
/// however long the camera runs. A one-line status is logged every
/// `report_every` cycles.
pub struct StatsPipelineLogger {
    report_every: usize,
    timings: HashMap<String, SeriesStats>,
    metrics: HashMap<String, SeriesStats>,
    start_time: Instant,
    cycles: usize,
    last_frame_id: Option<u64>,
}

impl StatsPipelineLogger {
    pub fn new(report_every: usize) -> Self {
        Self {
            report_every: report_every.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            cycles: 0,
            last_frame_id: None,
        }
    }

    pub fn cycles(&self) -> usize {
        self.cycles
    }

    pub fn timings_for(&self, stage: &str) -> Option<&SeriesStats> {
        self.timings.get(stage)
    }

    pub fn metrics_for(&self, name: &str) -> Option<&SeriesStats> {
        self.metrics.get(name)
    }

    /// Returns the formatted summary, or `None` if no cycle completed.
    pub fn summary_string(&self) -> Option<String> {
        if self.cycles == 0 {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Pipeline summary ({} cycles, {elapsed_s:.1}s):",
            self.cycles
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            lines.push(format!(
                "  {stage:10}: avg {:6.1}ms  max {:6.1}ms  ({} samples)",
                durations.mean(),
                durations.max,
                durations.count
            ));
        }

        let mut names: Vec<_> = self.metrics.keys().collect();
        names.sort();
        for name in names {
            lines.push(format!("  {name}: avg {:.1}", self.metrics[name].mean()));
        }

        if elapsed_s > 0.0 {
            lines.push(format!(
                "  Cycle rate: {:.1} cycles/s",
                self.cycles as f64 / elapsed_s
            ));
        }

        Some(lines.join("\n"))
    }
}

impl Default for StatsPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for StatsPipelineLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().record(value);
    }

    fn cycle_completed(&mut self, frame_id: u64, published: usize) {
        self.cycles += 1;
        self.last_frame_id = Some(frame_id);
        if self.cycles % self.report_every == 0 {
            log::info!(
                "Cycle {} (frame {frame_id}): {published} faces published",
                self.cycles
            );
        }
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullPipelineLogger;
        logger.timing("detect", 5.0);
        logger.metric("faces", 3.0);
        logger.cycle_completed(1, 0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timing_records_values() {
        let mut logger = StatsPipelineLogger::new(10);
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);
        logger.timing("classify", 5.0);

        let detect = logger.timings_for("detect").unwrap();
        assert_eq!(detect.count, 2);
        assert!((detect.mean() - 25.0).abs() < f64::EPSILON);
        assert!((detect.max - 30.0).abs() < f64::EPSILON);
        assert_eq!(logger.timings_for("classify").unwrap().count, 1);
        assert!(logger.timings_for("crop").is_none());
    }

    #[test]
    fn test_metric_records_values() {
        let mut logger = StatsPipelineLogger::new(10);
        logger.metric("faces", 3.0);
        logger.metric("faces", 4.0);
        assert!((logger.metrics_for("faces").unwrap().mean() - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_max_tracks_negative_series() {
        let mut stats = SeriesStats::default();
        stats.record(-3.0);
        stats.record(-1.0);
        assert!((stats.max + 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_retained_state_is_bounded_over_long_runs() {
        let mut logger = StatsPipelineLogger::new(1_000_000);
        for id in 0..100_000u64 {
            logger.timing("detect", 1.0);
            logger.timing("crop", 2.0);
            logger.metric("faces", 1.0);
            logger.cycle_completed(id, 1);
        }

        assert_eq!(logger.timings.len(), 2);
        assert_eq!(logger.metrics.len(), 1);
        assert_eq!(logger.timings_for("detect").unwrap().count, 100_000);
        assert!((logger.metrics_for("faces").unwrap().mean() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cycle_completed_counts() {
        let mut logger = StatsPipelineLogger::new(2);
        for id in [1, 4, 9] {
            logger.cycle_completed(id, 1);
        }
        assert_eq!(logger.cycles(), 3);
        assert_eq!(logger.last_frame_id, Some(9));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        let mut logger = StatsPipelineLogger::new(10);
        logger.timing("detect", 1.0);
        assert!(logger.summary_string().is_none());
    }

    #[test]
    fn test_summary_includes_stages_and_metrics() {
        let mut logger = StatsPipelineLogger::new(10);
        logger.timing("detect", 20.0);
        logger.timing("detect", 40.0);
        logger.metric("degenerate_faces", 1.0);
        logger.cycle_completed(1, 2);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Pipeline summary (1 cycles"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("avg   30.0ms"));
        assert!(summary.contains("max   40.0ms"));
        assert!(summary.contains("degenerate_faces: avg 1.0"));
    }

    #[test]
    fn test_report_every_is_at_least_one() {
        let logger = StatsPipelineLogger::new(0);
        assert_eq!(logger.report_every, 1);
    }

    #[test]
    fn test_default_reporting_interval() {
        assert_eq!(StatsPipelineLogger::default().report_every, 30);
    }
}
