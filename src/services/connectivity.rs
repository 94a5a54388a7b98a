use crate::error::{Result, TrustError};
use std::time::Duration;

pub trait ConnectivityProbe {
    fn check(&self) -> Result<()>;
}

/// Plain HTTP request to a captive-portal style endpoint. Any response,
/// including an error status, proves the network path is up.
pub struct HttpProbe {
    pub url: String,
    pub timeout: Duration,
}

impl HttpProbe {
    pub fn new(url: &str, timeout_ms: u64) -> Self {
        Self {
            url: url.to_string(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

impl ConnectivityProbe for HttpProbe {
    fn check(&self) -> Result<()> {
        let unreachable = |reason: String| TrustError::NoConnectivity {
            url: self.url.clone(),
            reason,
        };
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| unreachable(e.to_string()))?;
        let resp = client
            .get(&self.url)
            .send()
            .map_err(|e| unreachable(e.to_string()))?;
        tracing::debug!(url = %self.url, status = %resp.status(), "connectivity ok");
        Ok(())
    }
}

/// Used when the check is disabled in settings or on the command line.
pub struct SkipProbe;

impl ConnectivityProbe for SkipProbe {
    fn check(&self) -> Result<()> {
        tracing::debug!("connectivity check skipped");
        Ok(())
    }
}
