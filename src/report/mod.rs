// src/report/mod.rs
// =============================================================================
// This module builds the "which paths did we see on which host" report.
//
// It reads its own fork of the job stream (so it sees every job the workers
// see) until the stream closes, then hands back one aggregate:
//
//   {"example.test": ["/", "/a"], "other.test": ["/b"]}
//
// Hosts come out sorted; paths stay in the order the jobs were queued.
// =============================================================================

use crate::messaging::Backlog;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DomainsReport {
    hosts: BTreeMap<String, Vec<String>>,
}

impl DomainsReport {
    // Records one address. Addresses that don't parse, or have no host, are
    // skipped.
    pub fn observe(&mut self, address: &str) {
        let parsed = match Url::parse(address) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(address, "not reporting unparseable address: {e}");
                return;
            }
        };
        let Some(host) = parsed.host_str() else {
            return;
        };
        let host = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        self.hosts
            .entry(host)
            .or_default()
            .push(parsed.path().to_string());
    }

    pub fn paths(&self, host: &str) -> Option<&[String]> {
        self.hosts.get(host).map(Vec::as_slice)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }

    pub fn total(&self) -> usize {
        self.hosts.values().map(Vec::len).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// Drains the backlog in the background and resolves to the finished report
// once the backlog is closed
pub fn domains_report(backlog: Backlog<String>) -> JoinHandle<DomainsReport> {
    tokio::spawn(async move {
        let mut report = DomainsReport::default();
        while let Some(address) = backlog.recv().await {
            report.observe(&address);
        }
        debug!(addresses = report.total(), "domains report complete");
        report
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{queue, Dispatcher};

    #[test]
    fn test_groups_paths_by_host() {
        let mut report = DomainsReport::default();
        for address in [
            "http://example.test/",
            "http://other.test/b",
            "http://example.test/a",
            "http://localhost:8000/x",
            "not a url",
        ] {
            report.observe(address);
        }

        assert_eq!(
            report.hosts().collect::<Vec<_>>(),
            vec!["example.test", "localhost:8000", "other.test"]
        );
        assert_eq!(report.paths("example.test").unwrap(), ["/", "/a"]);
        assert_eq!(report.total(), 4);
    }

    #[test]
    fn test_json_shape() {
        let mut report = DomainsReport::default();
        report.observe("http://example.test/a");
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({ "example.test": ["/a"] }));
    }

    #[tokio::test]
    async fn test_report_resolves_when_backlog_closes() {
        let (dispatcher, backlog) = queue::new::<String>(4);
        let handle = domains_report(backlog);
        dispatcher.dispatch("http://example.test/x".to_string()).await;
        dispatcher.close();

        let report = handle.await.unwrap();
        assert_eq!(report.paths("example.test").unwrap(), ["/x"]);
    }
}
