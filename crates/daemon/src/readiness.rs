//! Readiness probes: the ledger and lifecycle actor always, plus optional
//! external dependencies (Postgres/Redis address probes, NATS/MinIO health
//! URLs) when configured.

use crate::env::CloudProbes;
use crate::lifecycle::LifecycleHandle;
use flowforge_ledger::Ledger;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Readiness report returned by `/readyz`.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    pub ready: bool,
    pub checks: BTreeMap<String, bool>,
}

pub struct Readiness {
    probes: CloudProbes,
    http: reqwest::Client,
}

impl Readiness {
    pub fn new(probes: CloudProbes) -> Self {
        let http = reqwest::Client::builder()
            .timeout(probes.probe_timeout)
            .build()
            .unwrap_or_default();
        Self { probes, http }
    }

    pub async fn check(&self, ledger: &Ledger, lifecycle: &LifecycleHandle) -> ReadinessReport {
        let mut checks = BTreeMap::new();

        let database = ledger.list_baseline_states().is_ok();
        checks.insert("database".to_string(), database);

        let lifecycle_up = !lifecycle.is_closed();
        checks.insert("lifecycle".to_string(), lifecycle_up);

        let mut externals_ok = true;
        if let Some(addr) = &self.probes.postgres_addr {
            let ok = tcp_probe(addr, self.probes.probe_timeout).await;
            externals_ok &= ok;
            checks.insert("postgres".to_string(), ok);
        }
        if let Some(addr) = &self.probes.redis_addr {
            let ok = tcp_probe(addr, self.probes.probe_timeout).await;
            externals_ok &= ok;
            checks.insert("redis".to_string(), ok);
        }
        if let Some(url) = &self.probes.nats_health_url {
            let ok = self.http_probe(url).await;
            externals_ok &= ok;
            checks.insert("nats".to_string(), ok);
        }
        if let Some(url) = &self.probes.minio_health_url {
            let ok = self.http_probe(url).await;
            externals_ok &= ok;
            checks.insert("minio".to_string(), ok);
        }

        let mut ready = database && lifecycle_up;
        if self.probes.required {
            ready &= externals_ok;
        }
        ReadinessReport { ready, checks }
    }

    async fn http_probe(&self, url: &str) -> bool {
        match self.http.get(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

async fn tcp_probe(addr: &str, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, tokio::net::TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

#[cfg(test)]
#[path = "readiness_tests.rs"]
mod tests;
