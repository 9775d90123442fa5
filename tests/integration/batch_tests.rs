//! Batch orchestrator scenarios

use crate::common::{orchestrator, settings, urls, FakeAnalyzer, FakeFetcher, Step};
use std::time::{Duration, Instant};
use sumi_lens::analyze::AnalysisOptions;
use sumi_lens::pipeline::BatchSettings;
use sumi_lens::report::{Stage, UrlStatus};
use sumi_lens::retry::FailureKind;
use sumi_lens::LensError;

#[tokio::test]
async fn test_results_follow_submission_order() {
    let fetcher = FakeFetcher::new();
    let analyzer = FakeAnalyzer::new();
    let list: Vec<String> = (0..8).map(|i| format!("https://site{}.test/page", i)).collect();

    // later URLs finish first
    for (i, url) in list.iter().enumerate() {
        fetcher.delay(url, Duration::from_millis(10 * (8 - i as u64)));
    }

    let report = orchestrator(fetcher, analyzer, settings())
        .run_batch(list.clone(), AnalysisOptions::default(), Some(8), None)
        .await
        .unwrap();

    assert_eq!(report.total, 8);
    assert_eq!(report.results.len(), 8);
    let got: Vec<_> = report.results.iter().map(|r| r.url.clone()).collect();
    assert_eq!(got, list);
    assert_eq!(report.succeeded, 8);
}

#[tokio::test]
async fn test_mixed_batch_scenario() {
    let fetcher = FakeFetcher::new();
    let analyzer = FakeAnalyzer::new();
    analyzer.script(
        "https://ratelimited.test/b",
        vec![Step::RateLimited(None), Step::RateLimited(Some(Duration::from_millis(5)))],
    );

    let report = orchestrator(fetcher.clone(), analyzer, settings())
        .run_batch(
            urls(&["https://ok.test/a", "not-a-url", "https://ratelimited.test/b"]),
            AnalysisOptions::default(),
            None,
            None,
        )
        .await
        .unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);

    let invalid = &report.results[1];
    assert_eq!(invalid.status(), UrlStatus::Error);
    assert_eq!(invalid.error().unwrap().kind, FailureKind::InvalidInput);
    assert_eq!(invalid.attempts, 0);

    let limited = &report.results[2];
    assert_eq!(limited.status(), UrlStatus::Success);
    assert_eq!(limited.attempts, 3);

    // the invalid URL never reached the fetcher
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_empty_batch_is_rejected() {
    let result = orchestrator(FakeFetcher::new(), FakeAnalyzer::new(), settings())
        .run_batch(Vec::new(), AnalysisOptions::default(), None, None)
        .await;

    assert!(matches!(result, Err(LensError::InvalidInput(_))));
}

#[tokio::test]
async fn test_oversized_batch_is_rejected() {
    let settings = BatchSettings {
        max_batch_size: 2,
        ..settings()
    };
    let fetcher = FakeFetcher::new();
    let result = orchestrator(fetcher.clone(), FakeAnalyzer::new(), settings)
        .run_batch(
            urls(&["https://a.test/", "https://b.test/", "https://c.test/"]),
            AnalysisOptions::default(),
            None,
            None,
        )
        .await;

    assert!(matches!(result, Err(LensError::InvalidInput(_))));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_permanent_failure_takes_one_attempt() {
    let fetcher = FakeFetcher::new();
    fetcher.script("https://gone.test/", vec![Step::Fail(FailureKind::Permanent)]);

    let report = orchestrator(fetcher.clone(), FakeAnalyzer::new(), settings())
        .run_batch(urls(&["https://gone.test/"]), AnalysisOptions::default(), None, None)
        .await
        .unwrap();

    let result = &report.results[0];
    let error = result.error().unwrap();
    assert_eq!(error.kind, FailureKind::Permanent);
    assert_eq!(error.stage, Stage::Fetch);
    assert_eq!(result.attempts, 1);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_transient_failure_exhausts_attempts() {
    let fetcher = FakeFetcher::new();
    let analyzer = FakeAnalyzer::new();
    analyzer.script(
        "https://flaky.test/",
        vec![Step::Fail(FailureKind::Transient); 5],
    );

    let report = orchestrator(fetcher, analyzer.clone(), settings())
        .run_batch(urls(&["https://flaky.test/"]), AnalysisOptions::default(), None, None)
        .await
        .unwrap();

    let result = &report.results[0];
    let error = result.error().unwrap();
    assert_eq!(error.kind, FailureKind::Transient);
    assert_eq!(error.stage, Stage::Analysis);
    assert_eq!(result.analyze_attempts, 3);
    assert_eq!(result.attempts, 3);
    assert_eq!(analyzer.calls(), 3);
}

#[tokio::test]
async fn test_every_result_has_exactly_one_outcome() {
    let fetcher = FakeFetcher::new();
    let analyzer = FakeAnalyzer::new();
    fetcher.script("https://b.test/", vec![Step::Fail(FailureKind::Permanent)]);
    analyzer.script("https://c.test/", vec![Step::Fail(FailureKind::Transient); 3]);

    let report = orchestrator(fetcher, analyzer, settings())
        .run_batch(
            urls(&["https://a.test/", "https://b.test/", "https://c.test/", "ftp://d.test/"]),
            AnalysisOptions::default(),
            None,
            None,
        )
        .await
        .unwrap();

    for result in &report.results {
        assert!(result.result().is_some() ^ result.error().is_some());
    }
    assert_eq!(report.succeeded + report.failed, report.total);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.errors.len(), 3);
}

#[tokio::test]
async fn test_concurrency_never_exceeds_bound() {
    let fetcher = FakeFetcher::new();
    let list: Vec<String> = (0..20).map(|i| format!("https://host{}.test/", i)).collect();
    for url in &list {
        fetcher.delay(url, Duration::from_millis(20));
    }

    let handle = orchestrator(fetcher, FakeAnalyzer::new(), settings())
        .submit_batch(list, AnalysisOptions::default(), Some(3), None)
        .unwrap();
    let limiter = handle.limiter().clone();
    let report = handle.wait().await.unwrap();

    assert_eq!(report.succeeded, 20);
    assert_eq!(limiter.max_concurrent(), 3);
    assert!(limiter.peak() <= 3, "peak was {}", limiter.peak());
    assert_eq!(limiter.in_flight(), 0);
}

#[tokio::test]
async fn test_single_slot_serializes_work() {
    let delay = Duration::from_millis(50);
    let fetcher = FakeFetcher::new();
    let list: Vec<String> = (0..5).map(|i| format!("https://slow{}.test/", i)).collect();
    for url in &list {
        fetcher.delay(url, delay);
    }

    let started = Instant::now();
    let report = orchestrator(fetcher, FakeAnalyzer::new(), settings())
        .run_batch(list, AnalysisOptions::default(), Some(1), None)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.succeeded, 5);
    assert!(elapsed >= delay * 5, "took {:?}", elapsed);
    assert!(report.duration >= delay * 5);
}

#[tokio::test]
async fn test_out_of_range_concurrency_is_clamped() {
    let orchestrator = orchestrator(FakeFetcher::new(), FakeAnalyzer::new(), settings());

    let low = orchestrator
        .submit_batch(urls(&["https://a.test/"]), AnalysisOptions::default(), Some(0), None)
        .unwrap();
    assert_eq!(low.limiter().max_concurrent(), 1);
    assert!(low.wait().await.is_ok());

    let high = orchestrator
        .submit_batch(urls(&["https://a.test/"]), AnalysisOptions::default(), Some(64), None)
        .unwrap();
    assert_eq!(high.limiter().max_concurrent(), 10);
    assert!(high.wait().await.is_ok());
}

#[tokio::test]
async fn test_deadline_turns_unfinished_work_into_timeouts() {
    let fetcher = FakeFetcher::new();
    fetcher.script("https://hang1.test/", vec![Step::Hang]);
    fetcher.script("https://hang2.test/", vec![Step::Hang]);

    let settings = BatchSettings {
        deadline: Duration::from_millis(100),
        grace: Duration::from_millis(200),
        ..settings()
    };

    let started = Instant::now();
    let report = orchestrator(fetcher, FakeAnalyzer::new(), settings)
        .run_batch(
            urls(&["https://hang1.test/", "https://fast.test/", "https://hang2.test/"]),
            AnalysisOptions::default(),
            None,
            None,
        )
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(2), "took {:?}", elapsed);
    assert_eq!(report.total, 3);
    assert_eq!(report.succeeded, 1);
    assert!(report.results[1].is_success());
    for index in [0, 2] {
        let error = report.results[index].error().unwrap();
        assert_eq!(error.kind, FailureKind::Timeout);
        assert_eq!(error.stage, Stage::Fetch);
    }
    assert_eq!(report.count_kind(FailureKind::Timeout), 2);
}

#[tokio::test]
async fn test_deadline_while_waiting_for_admission() {
    let fetcher = FakeFetcher::new();
    fetcher.script("https://hang.test/", vec![Step::Hang]);

    let settings = BatchSettings {
        deadline: Duration::from_millis(50),
        grace: Duration::from_millis(200),
        ..settings()
    };

    let handle = orchestrator(fetcher.clone(), FakeAnalyzer::new(), settings)
        .submit_batch(
            urls(&["https://hang.test/", "https://queued1.test/", "https://queued2.test/"]),
            AnalysisOptions::default(),
            Some(1),
            None,
        )
        .unwrap();
    let limiter = handle.limiter().clone();
    let report = handle.wait().await.unwrap();

    assert_eq!(report.failed, 3);
    assert_eq!(report.results[0].error().unwrap().stage, Stage::Fetch);
    for queued in &report.results[1..] {
        let error = queued.error().unwrap();
        assert_eq!(error.kind, FailureKind::Timeout);
        assert_eq!(error.stage, Stage::Admission);
        assert_eq!(queued.attempts, 0);
    }
    assert_eq!(fetcher.calls(), 1);
    assert!(limiter.is_closed());
    assert!(limiter.acquire().await.is_none());
}

#[tokio::test]
async fn test_deadline_interrupts_retry_backoff() {
    let analyzer = FakeAnalyzer::new();
    analyzer.script(
        "https://slow-down.test/",
        vec![Step::RateLimited(Some(Duration::from_secs(3600)))],
    );

    let settings = BatchSettings {
        deadline: Duration::from_millis(100),
        grace: Duration::from_millis(200),
        ..settings()
    };

    let started = Instant::now();
    let report = orchestrator(FakeFetcher::new(), analyzer.clone(), settings)
        .run_batch(urls(&["https://slow-down.test/"]), AnalysisOptions::default(), None, None)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(800), "took {:?}", elapsed);
    let result = &report.results[0];
    let error = result.error().unwrap();
    assert_eq!(error.kind, FailureKind::Timeout);
    assert_eq!(error.stage, Stage::Analysis);
    assert_eq!(result.fetch_attempts, 1);
    assert_eq!(result.analyze_attempts, 1);
    // the second attempt never started
    assert_eq!(analyzer.calls(), 1);
}

#[tokio::test]
async fn test_stages_have_independent_retry_budgets() {
    let fetcher = FakeFetcher::new();
    let analyzer = FakeAnalyzer::new();
    fetcher.script(
        "https://bumpy.test/",
        vec![Step::Fail(FailureKind::Transient), Step::Fail(FailureKind::Transient)],
    );
    analyzer.script(
        "https://bumpy.test/",
        vec![Step::RateLimited(None), Step::RateLimited(None)],
    );

    let report = orchestrator(fetcher.clone(), analyzer.clone(), settings())
        .run_batch(urls(&["https://bumpy.test/"]), AnalysisOptions::default(), None, None)
        .await
        .unwrap();

    let result = &report.results[0];
    assert!(result.is_success());
    assert_eq!(result.fetch_attempts, 3);
    assert_eq!(result.analyze_attempts, 3);
    assert_eq!(result.attempts, 5);
    assert_eq!(fetcher.calls(), 3);
    assert_eq!(analyzer.calls(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_aborted_slot_records_time_until_cancel() {
    let fetcher = FakeFetcher::new();
    fetcher.script("https://stuck.test/", vec![Step::Block(Duration::from_millis(600))]);

    let settings = BatchSettings {
        deadline: Duration::from_secs(30),
        grace: Duration::from_millis(50),
        ..settings()
    };

    let handle = orchestrator(fetcher, FakeAnalyzer::new(), settings)
        .submit_batch(urls(&["https://stuck.test/"]), AnalysisOptions::default(), None, None)
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();
    let report = handle.wait().await.unwrap();

    let result = &report.results[0];
    let error = result.error().unwrap();
    assert_eq!(error.kind, FailureKind::Timeout);
    assert_eq!(error.stage, Stage::Fetch);
    assert!(result.duration >= Duration::from_millis(50));
    assert!(result.duration < Duration::from_secs(5), "recorded {:?}", result.duration);
    assert_eq!(result.attempts, 0);
}

#[tokio::test]
async fn test_panicking_collaborator_is_isolated() {
    let fetcher = FakeFetcher::new();
    fetcher.script("https://boom.test/", vec![Step::Panic, Step::Panic, Step::Panic]);

    let report = orchestrator(fetcher, FakeAnalyzer::new(), settings())
        .run_batch(
            urls(&["https://fine.test/", "https://boom.test/", "https://also-fine.test/"]),
            AnalysisOptions::default(),
            None,
            None,
        )
        .await
        .unwrap();

    assert_eq!(report.succeeded, 2);
    let error = report.results[1].error().unwrap();
    assert_eq!(error.kind, FailureKind::Transient);
    assert!(error.message.contains("scripted panic"));
}

#[tokio::test]
async fn test_panic_then_recovery() {
    let fetcher = FakeFetcher::new();
    fetcher.script("https://once.test/", vec![Step::Panic]);

    let report = orchestrator(fetcher, FakeAnalyzer::new(), settings())
        .run_batch(urls(&["https://once.test/"]), AnalysisOptions::default(), None, None)
        .await
        .unwrap();

    assert!(report.results[0].is_success());
    assert_eq!(report.results[0].fetch_attempts, 2);
    assert_eq!(report.results[0].attempts, 2);
}

#[tokio::test]
async fn test_progress_and_cancel() {
    let fetcher = FakeFetcher::new();
    fetcher.script("https://hang.test/", vec![Step::Hang]);

    let handle = orchestrator(fetcher, FakeAnalyzer::new(), settings())
        .submit_batch(
            urls(&["https://quick.test/", "bad url", "https://hang.test/"]),
            AnalysisOptions::default(),
            None,
            None,
        )
        .unwrap();

    // wait until everything but the hanging URL is terminal
    let control = handle.control();
    let mut waited = Duration::ZERO;
    while control.progress().completed < 2 && waited < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }
    let progress = handle.progress();
    assert_eq!(progress.total, 3);
    assert_eq!(progress.completed, 2);
    assert!(!progress.is_complete());

    handle.cancel();
    let report = handle.wait().await.unwrap();

    assert!(control.progress().is_complete());
    assert_eq!(report.results[0].status(), UrlStatus::Success);
    assert_eq!(report.results[1].error().unwrap().kind, FailureKind::InvalidInput);
    assert_eq!(report.results[2].error().unwrap().kind, FailureKind::Timeout);
}

#[tokio::test]
async fn test_report_statistics() {
    let fetcher = FakeFetcher::new();
    fetcher.script("https://down.test/", vec![Step::Fail(FailureKind::Permanent)]);

    let report = orchestrator(fetcher, FakeAnalyzer::new(), settings())
        .run_batch(
            urls(&["https://news.test/1", "https://news.test/2", "https://down.test/"]),
            AnalysisOptions::default(),
            None,
            None,
        )
        .await
        .unwrap();

    assert_eq!(report.category_distribution.get("news.test"), Some(&2));
    assert_eq!(report.average_quality_score, Some(0.5));
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].url, "https://down.test/");
    assert!(report.completed_at >= report.started_at);
}
