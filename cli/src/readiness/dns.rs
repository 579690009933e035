//! DNS propagation state machine
//!
//! Polls a set of domains until each resolves to the expected target. Each
//! unresolved domain is checked against two independent public resolvers
//! (DNS-over-HTTPS JSON endpoints) plus the system resolver; a domain is
//! resolved as soon as any of them returns the expected target, and is
//! never re-checked afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::cancel::CancelSignal;
use crate::errors::DeployError;
use crate::readiness::PollSpec;

/// 120 attempts at 5s intervals: a 10-minute propagation budget
pub const DNS_PROPAGATION: PollSpec = PollSpec {
    max_attempts: 120,
    interval_secs: 5,
    first_interval_secs: 5,
};

/// A single DNS resolver the loop can query
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Resolver name for the per-domain report
    fn name(&self) -> &str;

    /// Answer records (A targets and CNAME chain entries) for a domain
    async fn lookup(&self, domain: &str) -> Result<Vec<String>, DeployError>;
}

/// Response shape shared by the Google and Cloudflare DoH JSON APIs
#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    data: String,
}

/// DNS-over-HTTPS resolver against a JSON query endpoint
pub struct DohResolver {
    name: String,
    endpoint: String,
    client: reqwest::Client,
}

impl DohResolver {
    pub fn new(name: &str, endpoint: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            client,
        }
    }

    /// Google public DNS JSON API
    pub fn google() -> Self {
        Self::new("google", "https://dns.google/resolve")
    }

    /// Cloudflare public DNS JSON API
    pub fn cloudflare() -> Self {
        Self::new("cloudflare", "https://cloudflare-dns.com/dns-query")
    }
}

#[async_trait]
impl DnsResolver for DohResolver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, domain: &str) -> Result<Vec<String>, DeployError> {
        let response: DohResponse = self
            .client
            .get(&self.endpoint)
            .query(&[("name", domain), ("type", "A")])
            .header("accept", "application/dns-json")
            .send()
            .await?
            .json()
            .await?;

        Ok(response
            .answer
            .into_iter()
            .map(|a| a.data.trim_end_matches('.').to_string())
            .collect())
    }
}

/// System resolver via the OS lookup path
pub struct SystemResolver;

#[async_trait]
impl DnsResolver for SystemResolver {
    fn name(&self) -> &str {
        "system"
    }

    async fn lookup(&self, domain: &str) -> Result<Vec<String>, DeployError> {
        let addrs = tokio::net::lookup_host((domain, 443))
            .await
            .map_err(DeployError::IoError)?;
        Ok(addrs.map(|a| a.ip().to_string()).collect())
    }
}

/// The default resolver set: two public resolvers plus the system one
pub fn default_resolvers() -> Vec<Arc<dyn DnsResolver>> {
    vec![
        Arc::new(DohResolver::google()),
        Arc::new(DohResolver::cloudflare()),
        Arc::new(SystemResolver),
    ]
}

/// Per-domain outcome of one propagation wait
#[derive(Debug, Clone)]
pub struct DnsOutcome {
    /// Attempt number at which each domain first resolved
    pub resolved_at: BTreeMap<String, u32>,

    /// Domains still unresolved when the budget ran out
    pub unresolved: Vec<String>,
}

impl DnsOutcome {
    pub fn timed_out(&self) -> bool {
        !self.unresolved.is_empty()
    }

    /// Per-domain status lines for the timeout report
    pub fn report_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .resolved_at
            .iter()
            .map(|(domain, attempt)| format!("{}: resolved (attempt {})", domain, attempt))
            .collect();
        lines.extend(
            self.unresolved
                .iter()
                .map(|domain| format!("{}: NOT propagated", domain)),
        );
        lines
    }
}

/// Wait for every domain to resolve to `expected`.
///
/// Returns the outcome even on timeout; the caller decides whether a
/// timeout is fatal. Only cancellation is surfaced as an error.
pub async fn wait_for_propagation(
    spec: &PollSpec,
    domains: &[String],
    expected: &str,
    resolvers: &[Arc<dyn DnsResolver>],
    cancel: &CancelSignal,
) -> Result<DnsOutcome, DeployError> {
    let mut pending: Vec<String> = domains.to_vec();
    let mut resolved_at = BTreeMap::new();

    for attempt in 1..=spec.max_attempts {
        if cancel.is_cancelled() {
            return Err(DeployError::Cancelled);
        }

        let mut still_pending = Vec::new();
        for domain in pending {
            if domain_resolves(&domain, expected, resolvers).await {
                info!("Domain {} resolved on attempt {}", domain, attempt);
                resolved_at.insert(domain, attempt);
            } else {
                still_pending.push(domain);
            }
        }
        pending = still_pending;

        if pending.is_empty() {
            return Ok(DnsOutcome {
                resolved_at,
                unresolved: Vec::new(),
            });
        }

        if attempt < spec.max_attempts {
            debug!(
                "DNS attempt {}/{}: {} domain(s) pending",
                attempt,
                spec.max_attempts,
                pending.len()
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(DeployError::Cancelled),
                _ = sleep(spec.interval_after(attempt)) => {}
            }
        }
    }

    Ok(DnsOutcome {
        resolved_at,
        unresolved: pending,
    })
}

async fn domain_resolves(
    domain: &str,
    expected: &str,
    resolvers: &[Arc<dyn DnsResolver>],
) -> bool {
    for resolver in resolvers {
        match resolver.lookup(domain).await {
            Ok(answers) => {
                if answers.iter().any(|a| a == expected) {
                    debug!("{} answered {} for {}", resolver.name(), expected, domain);
                    return true;
                }
            }
            // Resolver failures just mean "not propagated yet from here"
            Err(e) => debug!("{} lookup failed for {}: {}", resolver.name(), domain, e),
        }
    }
    false
}
