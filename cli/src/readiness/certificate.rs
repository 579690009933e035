//! Certificate issuance state machine
//!
//! Polls the ingress controller's ACME credential store until it grows past
//! a minimum size, which is the observable signal that certificates were
//! issued and persisted. A timeout here is always fatal; there is no safe
//! partially-issued TLS state.

use std::sync::Arc;

use tracing::debug;

use crate::adapters::ClusterOps;
use crate::cancel::CancelSignal;
use crate::errors::DeployError;
use crate::readiness::{poll, PollSpec};

/// 30 attempts at 10s intervals, first wait extended to 20s so the loop
/// absorbs resolver propagation delay before hammering the store
pub const CERTIFICATE_ISSUANCE: PollSpec = PollSpec {
    max_attempts: 30,
    interval_secs: 10,
    first_interval_secs: 20,
};

/// An empty or freshly-initialized store is well below this
pub const MIN_ACME_STORE_BYTES: u64 = 1024;

/// Wait until the ACME store reports at least [`MIN_ACME_STORE_BYTES`].
///
/// Returns the observed size on success.
pub async fn wait_for_issuance(
    spec: &PollSpec,
    cluster: &Arc<dyn ClusterOps>,
    cancel: &CancelSignal,
) -> Result<u64, DeployError> {
    poll(spec, cancel, "certificate issuance", |attempt| {
        let cluster = cluster.clone();
        async move {
            let size = cluster.acme_store_size().await.unwrap_or(0);
            debug!(
                "Certificate attempt {}: ACME store is {} bytes",
                attempt, size
            );
            Ok(if size >= MIN_ACME_STORE_BYTES {
                Some(size)
            } else {
                None
            })
        }
    })
    .await
}
