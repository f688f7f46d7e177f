//! Notifying the coordinating service of published results.
//!
//! Every published table is announced with a POST whose body is the table's
//! relative path. The run is identified by headers:
//!
//! | header         | value                          |
//! |----------------|--------------------------------|
//! | `result-id`    | `job.result_id`                |
//! | `process-type` | process type code (`D04`, ...) |
//! | `start-time`   | period start, `%Y-%m-%dT%H:%M:%SZ` |
//! | `end-time`     | period end, same format        |
//!
//! Snapshot notifications from master-data maintenance carry no settled
//! period, so the time headers are left out. A status outside 2xx fails the
//! notification. Nothing is retried.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use settle_core::{Notifier, ProcessType, PublishedLocation, SettleResult};
use tracing::{debug, info};

use crate::config::{CoordinatorConfig, SettleConfig};

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// HTTP client for the coordinator's result and snapshot receivers.
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    result_url: Option<String>,
    snapshot_url: Option<String>,
    result_id: String,
    process_type: ProcessType,
    /// Settled period; `None` for snapshot-only clients.
    period: Option<(DateTime<Utc>, DateTime<Utc>)>,
    agent: ureq::Agent,
}

impl CoordinatorClient {
    pub fn new(
        result_url: impl Into<String>,
        result_id: impl Into<String>,
        process_type: ProcessType,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            result_url: Some(result_url.into()),
            snapshot_url: None,
            result_id: result_id.into(),
            process_type,
            period: Some((start_time, end_time)),
            agent: ureq::Agent::new(),
        }
    }

    /// Client built from the `[coordinator]` section alone. It can announce
    /// snapshots; announcing results also needs [`CoordinatorClient::from_config`].
    pub fn from_coordinator_config(coordinator: &CoordinatorConfig) -> Self {
        let agent = if coordinator.timeout_secs > 0 {
            ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(coordinator.timeout_secs))
                .build()
        } else {
            ureq::Agent::new()
        };
        Self {
            result_url: coordinator.result_url.clone(),
            snapshot_url: coordinator.snapshot_url.clone(),
            result_id: String::new(),
            process_type: ProcessType::default(),
            period: None,
            agent,
        }
    }

    /// Client for the run described by `config`.
    pub fn from_config(config: &SettleConfig) -> Result<Self> {
        if config.coordinator.result_url.is_none() {
            bail!("coordinator.result_url is not set");
        }
        let (Some(beginning), Some(end)) = (config.job.beginning, config.job.end) else {
            bail!("job.beginning and job.end are required");
        };
        Ok(Self {
            result_id: config.job.result_id.clone(),
            process_type: config.job.process_type,
            period: Some((beginning, end)),
            ..Self::from_coordinator_config(&config.coordinator)
        })
    }

    pub fn with_snapshot_url(mut self, url: impl Into<String>) -> Self {
        self.snapshot_url = Some(url.into());
        self
    }

    pub fn request_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("result-id", self.result_id.clone()),
            ("process-type", self.process_type.code().to_string()),
        ];
        if let Some((start, end)) = self.period {
            headers.push(("start-time", start.format(TIME_FORMAT).to_string()));
            headers.push(("end-time", end.format(TIME_FORMAT).to_string()));
        }
        headers.push(("Content-Type", "text/plain".to_string()));
        headers
    }

    fn post(&self, url: &str, body: &str) -> Result<()> {
        let mut request = self.agent.post(url);
        for (name, value) in self.request_headers() {
            request = request.set(name, &value);
        }
        let response = match request.send_string(body) {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                bail!("coordinator at {url} rejected '{body}': HTTP {code}")
            }
            Err(err) => return Err(anyhow!(err)).with_context(|| format!("posting to {url}")),
        };
        if !(200..300).contains(&response.status()) {
            bail!(
                "coordinator at {url} rejected '{body}': HTTP {}",
                response.status()
            );
        }
        debug!(url, body, status = response.status(), "coordinator acknowledged");
        Ok(())
    }

    /// Announce a published result table.
    pub fn notify_result(&self, path: &str) -> Result<()> {
        let Some(url) = self.result_url.as_deref() else {
            bail!("coordinator.result_url is not set");
        };
        if self.period.is_none() {
            bail!("result notification for '{path}' needs the settled period");
        }
        self.post(url, path)
    }

    /// Announce a master-data snapshot. A no-op when no snapshot URL is configured.
    pub fn notify_snapshot(&self, path: &str) -> Result<()> {
        match self.snapshot_url.as_deref() {
            Some(url) => self.post(url, path),
            None => {
                debug!(path, "no snapshot receiver configured");
                Ok(())
            }
        }
    }
}

impl Notifier for CoordinatorClient {
    fn notify(&self, location: &PublishedLocation) -> SettleResult<()> {
        self.notify_result(&location.path)?;
        info!(table = %location.name, path = %location.path, "coordinator notified");
        Ok(())
    }
}

/// Notifier used when no coordinator is configured: records each location in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, location: &PublishedLocation) -> SettleResult<()> {
        info!(
            table = %location.name,
            path = %location.path,
            rows = location.rows,
            "result ready (coordinator disabled)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn client() -> CoordinatorClient {
        CoordinatorClient::new(
            "http://127.0.0.1:9/result",
            "run-7",
            ProcessType::BalanceFixing,
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn headers_identify_the_run() {
        let headers = client().request_headers();
        let get = |name: &str| {
            headers
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.as_str())
        };
        assert_eq!(get("result-id"), Some("run-7"));
        assert_eq!(get("process-type"), Some("D04"));
        assert_eq!(get("start-time"), Some("2020-01-01T00:00:00Z"));
        assert_eq!(get("end-time"), Some("2020-01-02T00:00:00Z"));
    }

    #[test]
    fn missing_result_url_is_rejected() {
        let config = SettleConfig::default();
        assert!(CoordinatorClient::from_config(&config).is_err());
    }

    #[test]
    fn from_config_copies_the_job() {
        let config = SettleConfig::from_toml_str(
            r#"
            [job]
            beginning = "2020-01-01T00:00:00Z"
            end = "2020-01-02T00:00:00Z"
            result_id = "abc"
            process_type = "D05"

            [coordinator]
            enabled = true
            result_url = "http://localhost:7071/api/ResultReceiver"
            snapshot_url = "http://localhost:7071/api/SnapshotReceiver"
            timeout_secs = 5
            "#,
        )
        .unwrap();
        let client = CoordinatorClient::from_config(&config).unwrap();
        assert_eq!(client.result_url.as_deref(), Some("http://localhost:7071/api/ResultReceiver"));
        assert_eq!(client.snapshot_url.as_deref(), Some("http://localhost:7071/api/SnapshotReceiver"));
        assert!(client
            .request_headers()
            .contains(&("process-type", "D05".to_string())));
    }

    #[test]
    fn snapshot_client_needs_no_job_window() {
        let config = SettleConfig::from_toml_str(
            r#"
            [coordinator]
            enabled = true
            snapshot_url = "http://localhost:7071/api/SnapshotReceiver"
            "#,
        )
        .unwrap();
        assert!(CoordinatorClient::from_config(&config).is_err());

        let client = CoordinatorClient::from_coordinator_config(&config.coordinator);
        assert_eq!(client.snapshot_url.as_deref(), Some("http://localhost:7071/api/SnapshotReceiver"));
        let headers = client.request_headers();
        assert!(headers.iter().all(|(name, _)| *name != "start-time" && *name != "end-time"));
        assert!(client.notify_result("Results/s/grid_loss.json").is_err());
    }

    #[test]
    fn unreachable_coordinator_is_an_error() {
        // port 9 (discard) is not expected to accept HTTP
        let err = client().notify_result("Results/s/grid_loss.json");
        assert!(err.is_err());
    }

    #[test]
    fn snapshot_without_url_is_a_no_op() {
        client().notify_snapshot("snapshot.json").unwrap();
    }
}
