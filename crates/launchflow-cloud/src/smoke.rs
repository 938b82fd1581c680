//! End-to-end HTTP smoke test
//!
//! After a public deploy the domain is probed until enough URLs answer.
//! A 2xx/3xx response scores 1, a 4xx scores 0.5 (the origin is reachable
//! even if the path is wrong), anything else scores 0. The test passes once
//! the score reaches half the number of URLs.

use crate::error::Result;
use crate::model::ExposureMode;
use crate::reporter::Reporter;
use crate::waiter::{Clock, ConvergenceTarget, WaitOutcome, await_terminal};
use async_trait::async_trait;
use std::time::Duration;

/// Per-request timeout
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a single HTTP GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    Status(u16),
    Unreachable(String),
}

impl ProbeResult {
    /// Score in half points
    fn half_points(&self) -> usize {
        match self {
            ProbeResult::Status(code) if (200..400).contains(code) => 2,
            ProbeResult::Status(code) if (400..500).contains(code) => 1,
            _ => 0,
        }
    }
}

#[async_trait]
pub trait HttpProbe: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> ProbeResult;
}

/// Sum of half points for a round of probes
pub fn score(results: &[ProbeResult]) -> usize {
    results.iter().map(ProbeResult::half_points).sum()
}

/// `score >= total * 0.5`, in half points
pub fn passes(half_points: usize, total: usize) -> bool {
    total > 0 && half_points >= total
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeTest {
    pub urls: Vec<String>,
    /// Pause before the first round, for DNS to start propagating
    pub initial_wait: Duration,
    pub interval: Duration,
    pub budget: Duration,
}

impl SmokeTest {
    /// URLs probed for a deployed domain
    pub fn for_domain(domain: &str, mode: ExposureMode, cdn_domain: Option<&str>) -> Self {
        let (urls, initial_wait) = match mode {
            ExposureMode::Production => {
                let mut urls = vec![format!("https://{}", domain), format!("http://{}", domain)];
                if let Some(cdn) = cdn_domain {
                    urls.push(format!("https://{}", cdn));
                }
                (urls, Duration::from_secs(30))
            }
            ExposureMode::Lightweight => (vec![format!("http://{}", domain)], Duration::from_secs(15)),
        };

        Self {
            urls,
            initial_wait,
            interval: Duration::from_secs(10),
            budget: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeReport {
    pub passed: bool,
    /// Last round's results, paired with their URLs
    pub results: Vec<(String, ProbeResult)>,
}

/// Probe every URL each round until the round passes or the budget runs out.
///
/// Never fails the deploy; a miss is reported as a warning.
pub async fn run_smoke_test(
    clock: &dyn Clock,
    reporter: &dyn Reporter,
    probe: &dyn HttpProbe,
    test: &SmokeTest,
) -> Result<SmokeReport> {
    if test.urls.is_empty() {
        return Ok(SmokeReport {
            passed: true,
            results: Vec::new(),
        });
    }

    reporter.note(&format!(
        "Waiting {}s for DNS before probing {}",
        test.initial_wait.as_secs(),
        test.urls.join(", ")
    ));
    clock.sleep(test.initial_wait).await;

    let target = ConvergenceTarget::new("HTTP smoke test", test.budget, test.interval);
    reporter.wait_started(&target);

    let total = test.urls.len();
    let outcome = await_terminal(
        clock,
        &target,
        || async {
            let mut round = Vec::with_capacity(total);
            for url in &test.urls {
                let result = probe.get(url, PROBE_TIMEOUT).await;
                tracing::debug!(url = %url, ?result, "probe");
                round.push((url.clone(), result));
            }
            Ok(round)
        },
        |round: &Vec<(String, ProbeResult)>| {
            let results: Vec<ProbeResult> = round.iter().map(|(_, r)| r.clone()).collect();
            passes(score(&results), total)
        },
        |_| false,
    )
    .await?;
    reporter.wait_finished(&target);

    let report = match outcome {
        WaitOutcome::Converged(results) => SmokeReport {
            passed: true,
            results,
        },
        WaitOutcome::TimedOut { last, waited } => {
            reporter.warn(&format!(
                "Smoke test did not pass within {}s; DNS or the CDN may still be propagating",
                waited.as_secs()
            ));
            SmokeReport {
                passed: false,
                results: last.unwrap_or_default(),
            }
        }
        WaitOutcome::Failed(results) => SmokeReport {
            passed: false,
            results,
        },
    };

    for (url, result) in &report.results {
        match result {
            ProbeResult::Status(code) => reporter.note(&format!("{} -> {}", url, code)),
            ProbeResult::Unreachable(reason) => reporter.note(&format!("{} -> {}", url, reason)),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::TracingReporter;
    use crate::waiter::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProbe {
        calls: AtomicUsize,
        /// Status returned once this many calls have happened
        ready_after: usize,
        status: u16,
    }

    #[async_trait]
    impl HttpProbe for ScriptedProbe {
        async fn get(&self, _url: &str, _timeout: Duration) -> ProbeResult {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n >= self.ready_after {
                ProbeResult::Status(self.status)
            } else {
                ProbeResult::Unreachable("connection refused".into())
            }
        }
    }

    #[test]
    fn test_scoring() {
        let results = vec![
            ProbeResult::Status(200),
            ProbeResult::Status(404),
            ProbeResult::Unreachable("timeout".into()),
        ];
        assert_eq!(score(&results), 3);
        // 1.5 >= 3 * 0.5
        assert!(passes(score(&results), 3));

        let results = vec![ProbeResult::Status(404), ProbeResult::Status(502)];
        assert!(!passes(score(&results), 2));
        assert!(passes(score(&[ProbeResult::Status(301)]), 1));
        assert!(!passes(0, 0));
    }

    #[test]
    fn test_urls_per_mode() {
        let test = SmokeTest::for_domain(
            "app.example.com",
            ExposureMode::Production,
            Some("d111.cloudfront.net"),
        );
        assert_eq!(
            test.urls,
            vec![
                "https://app.example.com",
                "http://app.example.com",
                "https://d111.cloudfront.net"
            ]
        );
        assert_eq!(test.initial_wait, Duration::from_secs(30));

        let test = SmokeTest::for_domain("app.example.com", ExposureMode::Lightweight, None);
        assert_eq!(test.urls, vec!["http://app.example.com"]);
        assert_eq!(test.budget, Duration::from_secs(600));
    }

    #[tokio::test]
    async fn test_passes_after_retries() {
        let clock = ManualClock::new();
        let probe = ScriptedProbe {
            calls: AtomicUsize::new(0),
            ready_after: 2,
            status: 200,
        };
        let test = SmokeTest::for_domain("app.example.com", ExposureMode::Lightweight, None);

        let report = run_smoke_test(&clock, &TracingReporter, &probe, &test)
            .await
            .unwrap();

        assert!(report.passed);
        // initial wait plus two retry intervals
        assert_eq!(clock.now(), Duration::from_secs(15 + 20));
    }

    #[tokio::test]
    async fn test_gives_up_without_error() {
        let clock = ManualClock::new();
        let probe = ScriptedProbe {
            calls: AtomicUsize::new(0),
            ready_after: usize::MAX,
            status: 200,
        };
        let test = SmokeTest::for_domain("app.example.com", ExposureMode::Lightweight, None);

        let report = run_smoke_test(&clock, &TracingReporter, &probe, &test)
            .await
            .unwrap();

        assert!(!report.passed);
        assert_eq!(clock.now(), Duration::from_secs(15 + 600));
        assert_eq!(report.results.len(), 1);
    }
}
