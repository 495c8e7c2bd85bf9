//! End-to-end tests for the job engine
//!
//! Exercise the full path a request takes after intake: submission through
//! the facade, concurrent execution on the worker pool, persistence into a
//! real JSON-file store, and the graceful-shutdown drain.

#[cfg(test)]
mod engine_integration_tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use statflow::dataset::{DatasetRecord, DatasetView, ReadyLatch};
    use statflow::engine::{JobEngine, JobKind, JobParams};
    use statflow::store::{JsonFileStore, ResultStore};

    const QUESTION: &str = "Percent of adults aged 18 years and older who have obesity";

    fn record(location: &str, value: f64) -> DatasetRecord {
        DatasetRecord {
            location: location.to_string(),
            question: QUESTION.to_string(),
            value,
            strat_category: Some("Age (years)".to_string()),
            strat_value: Some("35 - 44".to_string()),
        }
    }

    fn dataset() -> Arc<DatasetView> {
        Arc::new(DatasetView::new(vec![
            record("Ohio", 29.4),
            record("New Mexico", 27.7),
            record("Tennessee", 44.2),
            record("Ohio", 31.6),
        ]))
    }

    fn started_latch() -> Arc<ReadyLatch> {
        let latch = Arc::new(ReadyLatch::new());
        latch.set();
        latch
    }

    #[test]
    fn test_every_job_queued_before_shutdown_gets_a_result() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path()).unwrap());
        let engine = Arc::new(
            JobEngine::start(dataset(), store.clone(), started_latch(), Some(4)).unwrap(),
        );

        // Several submitters racing the way concurrent HTTP handlers would
        let mut submitters = Vec::new();
        for _ in 0..4 {
            let engine = Arc::clone(&engine);
            submitters.push(thread::spawn(move || {
                let mut ids = Vec::new();
                for i in 0..25 {
                    let kind = match i % 4 {
                        0 => JobKind::StatesMean,
                        1 => JobKind::GlobalMean,
                        2 => JobKind::DiffFromMean,
                        _ => JobKind::MeanByCategory,
                    };
                    if let Some(id) = engine.submit(kind, JobParams::question(QUESTION)) {
                        ids.push(id);
                    }
                }
                ids
            }));
        }

        let submitted: Vec<u64> = submitters
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(submitted.len(), 100);

        engine.shutdown();
        engine.join();

        // Drained: counter at zero, admission closed, result per job
        assert_eq!(engine.active_job_count(), 0);
        assert!(!engine.admission_open());
        for id in &submitted {
            assert!(store.has(*id), "missing result for job {}", id);
        }

        // Ids form a gap-free strictly increasing sequence from 1
        let unique: HashSet<u64> = submitted.iter().copied().collect();
        assert_eq!(unique.len(), 100);
        assert_eq!(*submitted.iter().min().unwrap(), 1);
        assert_eq!(*submitted.iter().max().unwrap(), 100);
    }

    #[test]
    fn test_submissions_after_shutdown_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path()).unwrap());
        let engine =
            JobEngine::start(dataset(), store.clone(), started_latch(), Some(2)).unwrap();

        let before = engine
            .submit(JobKind::StatesMean, JobParams::question(QUESTION))
            .unwrap();
        engine.shutdown();

        assert_eq!(
            engine.submit(JobKind::StatesMean, JobParams::question(QUESTION)),
            None
        );
        // A second shutdown is a no-op, not a second round of sentinels
        engine.shutdown();

        engine.join();
        assert!(store.has(before));
        assert_eq!(engine.last_job_id(), before);
    }

    #[test]
    fn test_results_match_known_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path()).unwrap());
        let engine =
            JobEngine::start(dataset(), store.clone(), started_latch(), Some(2)).unwrap();

        let states_id = engine
            .submit(JobKind::StatesMean, JobParams::question(QUESTION))
            .unwrap();
        let global_id = engine
            .submit(JobKind::GlobalMean, JobParams::question(QUESTION))
            .unwrap();
        let diff_id = engine
            .submit(
                JobKind::StateDiffFromMean,
                JobParams::question_and_state(QUESTION, "Ohio"),
            )
            .unwrap();

        engine.shutdown();
        engine.join();

        let states = store.get(states_id).unwrap().unwrap();
        let keys: Vec<&String> = states.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["New Mexico", "Ohio", "Tennessee"]);
        assert!((states["Ohio"].as_f64().unwrap() - 30.5).abs() < 1e-9);

        let global = store.get(global_id).unwrap().unwrap();
        assert!((global["global_mean"].as_f64().unwrap() - 33.225).abs() < 1e-9);

        let diff = store.get(diff_id).unwrap().unwrap();
        assert!((diff["Ohio"].as_f64().unwrap() - 2.725).abs() < 1e-9);
    }

    #[test]
    fn test_empty_aggregate_stores_error_payload() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path()).unwrap());
        let engine =
            JobEngine::start(dataset(), store.clone(), started_latch(), Some(1)).unwrap();

        let id = engine
            .submit(JobKind::GlobalMean, JobParams::question("unknown question"))
            .unwrap();

        engine.shutdown();
        engine.join();

        let payload = store.get(id).unwrap().unwrap();
        assert_eq!(payload["status"], "error");
        assert!(payload["reason"].as_str().unwrap().contains("no data"));
    }

    #[test]
    fn test_active_count_reaches_zero_without_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path()).unwrap());
        let engine =
            JobEngine::start(dataset(), store.clone(), started_latch(), Some(2)).unwrap();

        for _ in 0..10 {
            engine
                .submit(JobKind::Best5, JobParams::question(QUESTION))
                .unwrap();
        }

        // Poll until the pool drains; jobs run to completion on their own
        let mut drained = false;
        for _ in 0..200 {
            if engine.active_job_count() == 0 {
                drained = true;
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(drained, "active count never reached zero");
        assert!(engine.admission_open());

        engine.shutdown();
        engine.join();
    }
}
