//! Process-local metrics
//!
//! A CLI run is short, so nothing is scraped. The recorder collects what the
//! libraries emit during the run and the summary is logged at debug level on
//! exit:
//!
//! - `aps_auth_token_requests_total` (counter): labels `grant_type`, `outcome`

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install metrics recorder")
}

/// The rendered sample lines, without `# TYPE`/`# HELP` comments.
pub fn summary(handle: &PrometheusHandle) -> String {
    handle
        .render()
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}
