//! Detector execution engine with parallel support
//!
//! The DetectorEngine orchestrates the execution of all registered
//! detectors:
//! - Runs detectors in parallel using rayon
//! - Isolates panics and detector-local errors from sibling detectors
//! - Deduplicates identical findings by (detector, sorted entity set)
//! - Collects and aggregates patterns, sorted by severity
//! - Reports progress through callbacks
//!
//! Detectors are independent pure functions of the snapshot, so execution
//! order is unspecified; the dedup + sort step makes the returned list
//! order-independent and deterministic.

use crate::detectors::base::{DetectionSummary, Detector, DetectorResult, ProgressCallback};
use crate::models::{InvestigationSnapshot, Pattern};
use anyhow::Result;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Maximum patterns to keep to prevent memory exhaustion
const MAX_PATTERNS_LIMIT: usize = 10_000;

/// Orchestrates pattern detection across all registered detectors
pub struct DetectorEngine {
    /// Registered detectors
    detectors: Vec<Arc<dyn Detector>>,
    /// Number of worker threads for parallel execution
    workers: usize,
    /// Maximum patterns to return (prevents memory issues on large snapshots)
    max_patterns: usize,
    /// Progress callback for reporting execution status
    progress_callback: Option<ProgressCallback>,
}

impl DetectorEngine {
    /// Create a new detector engine
    ///
    /// # Arguments
    /// * `workers` - Number of worker threads (0 = auto-detect)
    pub fn new(workers: usize) -> Self {
        let actual_workers = if workers == 0 {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
                .min(16) // Cap at 16 threads
        } else {
            workers
        };

        Self {
            detectors: Vec::new(),
            workers: actual_workers,
            max_patterns: MAX_PATTERNS_LIMIT,
            progress_callback: None,
        }
    }

    /// Set the maximum number of patterns to return
    pub fn with_max_patterns(mut self, max: usize) -> Self {
        self.max_patterns = max;
        self
    }

    /// Set a progress callback
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Register a detector
    pub fn register(&mut self, detector: Arc<dyn Detector>) {
        debug!("Registering detector: {}", detector.name());
        self.detectors.push(detector);
    }

    /// Register multiple detectors at once
    pub fn register_all(&mut self, detectors: impl IntoIterator<Item = Arc<dyn Detector>>) {
        for detector in detectors {
            self.register(detector);
        }
    }

    /// Get the number of registered detectors
    pub fn detector_count(&self) -> usize {
        self.detectors.len()
    }

    /// Get names of all registered detectors
    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Run all detectors and collect patterns
    ///
    /// # Returns
    /// All patterns from all detectors, deduplicated and sorted by severity
    /// (highest first), ties broken by detector name and entity set.
    pub fn run(&self, snapshot: &InvestigationSnapshot) -> Result<Vec<Pattern>> {
        let (patterns, _summary) = self.run_detailed(snapshot)?;
        Ok(patterns)
    }

    /// Run all detectors and return patterns plus per-run statistics
    pub fn run_detailed(
        &self,
        snapshot: &InvestigationSnapshot,
    ) -> Result<(Vec<Pattern>, DetectionSummary)> {
        let start = Instant::now();
        info!(
            investigation = %snapshot.investigation_id,
            "Starting detection with {} detectors on {} workers",
            self.detectors.len(),
            self.workers
        );

        // Progress tracking
        let completed = Arc::new(AtomicUsize::new(0));
        let total = self.detectors.len();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()?;

        let results: Vec<DetectorResult> = pool.install(|| {
            self.detectors
                .par_iter()
                .map(|detector| {
                    let result = self.run_single_detector(detector, snapshot);

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref callback) = self.progress_callback {
                        callback(detector.name(), done, total);
                    }

                    result
                })
                .collect()
        });

        let mut all_patterns: Vec<Pattern> = Vec::new();
        let mut summary = DetectionSummary::default();

        for result in results {
            summary.add_result(&result);
            if result.success {
                all_patterns.extend(result.patterns);
            } else if let Some(err) = &result.error {
                warn!("Detector {} failed: {}", result.detector_name, err);
            }
        }

        // Deduplicate identical findings by (detector, sorted entity set).
        // Pattern IDs are deterministic hashes of exactly that pair.
        let mut seen: HashSet<String> = HashSet::new();
        all_patterns.retain(|p| seen.insert(p.id.clone()));

        // Severity-descending, then stable tie-break for determinism
        all_patterns.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.detector.cmp(&b.detector))
                .then_with(|| a.entities.cmp(&b.entities))
        });

        if all_patterns.len() > self.max_patterns {
            warn!(
                "Truncating patterns from {} to {} (max limit)",
                all_patterns.len(),
                self.max_patterns
            );
            all_patterns.truncate(self.max_patterns);
        }

        summary.total_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Detection complete: {} patterns from {}/{} detectors in {}ms",
            all_patterns.len(),
            summary.detectors_succeeded,
            summary.detectors_run,
            summary.total_duration_ms
        );

        Ok((all_patterns, summary))
    }

    /// Run a single detector with error handling and timing
    fn run_single_detector(
        &self,
        detector: &Arc<dyn Detector>,
        snapshot: &InvestigationSnapshot,
    ) -> DetectorResult {
        let name = detector.name().to_string();
        let start = Instant::now();

        debug!("Running detector: {}", name);

        // Wrap in catch_unwind so one panicking detector never aborts siblings
        let scan_result =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| detector.scan(snapshot)));

        match scan_result {
            Ok(Ok(patterns)) => {
                let duration = start.elapsed().as_millis() as u64;
                debug!(
                    "Detector {} found {} patterns in {}ms",
                    name,
                    patterns.len(),
                    duration
                );
                DetectorResult::success(name, patterns, duration)
            }
            Ok(Err(e)) => {
                let duration = start.elapsed().as_millis() as u64;
                // Downgrade to debug - detectors commonly skip on missing fields
                debug!("Detector {} skipped (scan error): {}", name, e);
                DetectorResult::failure(name, e.to_string(), duration)
            }
            Err(panic_info) => {
                let duration = start.elapsed().as_millis() as u64;
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                error!("Detector {} panicked: {}", name, panic_msg);
                DetectorResult::failure(name, format!("Panic: {}", panic_msg), duration)
            }
        }
    }
}

impl Default for DetectorEngine {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Builder for DetectorEngine with fluent API
pub struct DetectorEngineBuilder {
    workers: usize,
    max_patterns: usize,
    detectors: Vec<Arc<dyn Detector>>,
    progress_callback: Option<ProgressCallback>,
}

impl DetectorEngineBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            workers: 0,
            max_patterns: MAX_PATTERNS_LIMIT,
            detectors: Vec::new(),
            progress_callback: None,
        }
    }

    /// Set number of worker threads
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set maximum patterns
    pub fn max_patterns(mut self, max: usize) -> Self {
        self.max_patterns = max;
        self
    }

    /// Add a detector
    pub fn detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Add multiple detectors
    pub fn detectors(mut self, detectors: impl IntoIterator<Item = Arc<dyn Detector>>) -> Self {
        self.detectors.extend(detectors);
        self
    }

    /// Set progress callback
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Build the engine
    pub fn build(self) -> DetectorEngine {
        let mut engine = DetectorEngine::new(self.workers).with_max_patterns(self.max_patterns);

        if let Some(callback) = self.progress_callback {
            engine = engine.with_progress_callback(callback);
        }

        engine.register_all(self.detectors);
        engine
    }
}

impl Default for DetectorEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    // Mock detector for testing
    struct MockDetector {
        name: &'static str,
        patterns_count: usize,
    }

    impl Detector for MockDetector {
        fn name(&self) -> &'static str {
            self.name
        }

        fn description(&self) -> &'static str {
            "Mock detector for testing"
        }

        fn scan(&self, _snapshot: &InvestigationSnapshot) -> Result<Vec<Pattern>> {
            Ok((0..self.patterns_count)
                .map(|i| {
                    Pattern::new(
                        self.name,
                        Severity::Medium,
                        0.8,
                        format!("Pattern {}", i),
                        "Test pattern",
                        vec![format!("e{i}")],
                    )
                })
                .collect())
        }
    }

    struct PanickyDetector;

    impl Detector for PanickyDetector {
        fn name(&self) -> &'static str {
            "PanickyDetector"
        }

        fn description(&self) -> &'static str {
            "Always panics"
        }

        fn scan(&self, _snapshot: &InvestigationSnapshot) -> Result<Vec<Pattern>> {
            panic!("boom");
        }
    }

    fn empty_snapshot() -> InvestigationSnapshot {
        InvestigationSnapshot::new("inv-test")
    }

    #[test]
    fn test_engine_creation() {
        let engine = DetectorEngine::new(4);
        assert_eq!(engine.workers, 4);
        assert_eq!(engine.detector_count(), 0);
    }

    #[test]
    fn test_engine_default_workers() {
        let engine = DetectorEngine::new(0);
        assert!(engine.workers > 0);
        assert!(engine.workers <= 16);
    }

    #[test]
    fn test_register_detectors() {
        let mut engine = DetectorEngine::new(2);

        engine.register(Arc::new(MockDetector {
            name: "Detector1",
            patterns_count: 5,
        }));
        engine.register(Arc::new(MockDetector {
            name: "Detector2",
            patterns_count: 3,
        }));

        assert_eq!(engine.detector_count(), 2);
        assert_eq!(engine.detector_names(), vec!["Detector1", "Detector2"]);
    }

    #[test]
    fn test_panicking_detector_does_not_abort_siblings() {
        let engine = DetectorEngineBuilder::new()
            .workers(2)
            .detector(Arc::new(PanickyDetector))
            .detector(Arc::new(MockDetector {
                name: "Healthy",
                patterns_count: 2,
            }))
            .build();

        let (patterns, summary) = engine.run_detailed(&empty_snapshot()).unwrap();
        assert_eq!(patterns.len(), 2);
        assert_eq!(summary.detectors_failed, 1);
        assert_eq!(summary.detectors_succeeded, 1);
    }

    #[test]
    fn test_duplicate_findings_are_deduplicated() {
        // Two registrations of the same detector produce identical
        // (detector, entity set) pairs, so only one copy survives.
        let engine = DetectorEngineBuilder::new()
            .workers(2)
            .detector(Arc::new(MockDetector {
                name: "Dup",
                patterns_count: 2,
            }))
            .detector(Arc::new(MockDetector {
                name: "Dup",
                patterns_count: 2,
            }))
            .build();

        let patterns = engine.run(&empty_snapshot()).unwrap();
        assert_eq!(patterns.len(), 2);
    }

    #[test]
    fn test_max_patterns_truncation() {
        let engine = DetectorEngineBuilder::new()
            .max_patterns(3)
            .detector(Arc::new(MockDetector {
                name: "Many",
                patterns_count: 10,
            }))
            .build();

        let patterns = engine.run(&empty_snapshot()).unwrap();
        assert_eq!(patterns.len(), 3);
    }

    #[test]
    fn test_builder() {
        let engine = DetectorEngineBuilder::new()
            .workers(4)
            .max_patterns(100)
            .detector(Arc::new(MockDetector {
                name: "Test",
                patterns_count: 1,
            }))
            .build();

        assert_eq!(engine.workers, 4);
        assert_eq!(engine.max_patterns, 100);
        assert_eq!(engine.detector_count(), 1);
    }
}
