//! Waiting for the page to settle after navigation and after each action.

use crate::browser::BrowserSession;
use crate::config::SettleConfig;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Page snapshot compared between polls: ready state, element count, resource count
const IDLE_PROBE_SCRIPT: &str = r#"JSON.stringify([document.readyState, document.getElementsByTagName('*').length, performance.getEntriesByType('resource').length])"#;

#[async_trait]
pub trait SettleStrategy: Send + Sync {
    /// Return once the page is considered stable. Never fails; a strategy
    /// that cannot decide just stops waiting.
    async fn settle(&self, browser: &dyn BrowserSession);
}

pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl SettleStrategy for FixedDelay {
    async fn settle(&self, _browser: &dyn BrowserSession) {
        log::debug!("Settling for {:?}", self.delay);
        tokio::time::sleep(self.delay).await;
    }
}

/// Polls the page until its probe stays unchanged for `quiet_period` with
/// `document.readyState == "complete"`, or until `timeout`.
pub struct IdleDetection {
    poll_interval: Duration,
    quiet_period: Duration,
    timeout: Duration,
}

impl IdleDetection {
    pub fn new(poll_interval: Duration, quiet_period: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            quiet_period,
            timeout,
        }
    }
}

#[async_trait]
impl SettleStrategy for IdleDetection {
    async fn settle(&self, browser: &dyn BrowserSession) {
        let started = Instant::now();
        let mut last_probe: Option<String> = None;
        let mut quiet_since = Instant::now();

        loop {
            if started.elapsed() >= self.timeout {
                log::warn!("Page not idle after {:?}, continuing anyway", self.timeout);
                return;
            }

            match browser.execute_script(IDLE_PROBE_SCRIPT).await {
                Ok(probe) => {
                    let complete = probe.contains("\"complete\"");
                    if !complete || last_probe.as_deref() != Some(probe.as_str()) {
                        quiet_since = Instant::now();
                        last_probe = Some(probe);
                    } else if quiet_since.elapsed() >= self.quiet_period {
                        log::debug!("Page idle after {:?}", started.elapsed());
                        return;
                    }
                }
                Err(e) => {
                    log::warn!("Idle probe failed ({}), waiting {:?} instead", e, self.quiet_period);
                    tokio::time::sleep(self.quiet_period).await;
                    return;
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

impl From<&SettleConfig> for Box<dyn SettleStrategy> {
    fn from(config: &SettleConfig) -> Self {
        match config {
            SettleConfig::FixedDelay(delay) => Box::new(FixedDelay::new(*delay)),
            SettleConfig::IdleDetection {
                poll_interval,
                quiet_period,
                timeout,
            } => Box::new(IdleDetection::new(*poll_interval, *quiet_period, *timeout)),
        }
    }
}
