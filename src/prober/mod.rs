//! Turns one dictionary path into one classified HTTP response.

pub mod blacklist;
pub mod policy;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::Method;
use thiserror::Error;
use tracing::debug;

use crate::connection::{Attempt, Response, Throttle, Transport};

pub use blacklist::Blacklist;
pub use policy::StatusPolicy;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("request for '{path}' failed after {attempts} attempts: {reason}")]
    Request {
        path: String,
        attempts: u32,
        reason: String,
    },

    #[error("request for '{path}' failed: {reason}")]
    Fatal { path: String, reason: String },

    #[error("request for '{path}' interrupted")]
    Interrupted { path: String },
}

impl ProbeError {
    pub fn path(&self) -> &str {
        match self {
            ProbeError::Request { path, .. }
            | ProbeError::Fatal { path, .. }
            | ProbeError::Interrupted { path } => path,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeResult {
    pub path: String,
    pub response: Response,
}

#[derive(Debug)]
pub struct ProbeOptions {
    /// Target base URL, ending with `/`.
    pub base_url: String,
    pub method: Method,
    pub max_retries: u32,
    pub policy: StatusPolicy,
    pub blacklist: Blacklist,
    pub throttle: Throttle,
}

impl ProbeOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            method: Method::GET,
            max_retries: DEFAULT_MAX_RETRIES,
            policy: StatusPolicy::default(),
            blacklist: Blacklist::new(),
            throttle: Throttle::unlimited(),
        }
    }
}

pub struct Prober {
    transport: Arc<dyn Transport>,
    options: ProbeOptions,
}

impl Prober {
    pub fn new(transport: Arc<dyn Transport>, mut options: ProbeOptions) -> Self {
        if !options.base_url.ends_with('/') {
            options.base_url.push('/');
        }
        Self { transport, options }
    }

    pub fn options(&self) -> &ProbeOptions {
        &self.options
    }

    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.options.base_url,
            path.trim_start_matches('/')
        )
    }

    /// Requests `path`, retrying transient failures up to `max_retries` times.
    ///
    /// `running` is checked before every attempt and again once the throttle
    /// lets the attempt through; once it is cleared the probe gives up with
    /// [`ProbeError::Interrupted`] instead of sending more.
    pub fn probe(&self, path: &str, running: &AtomicBool) -> Result<ProbeResult, ProbeError> {
        let url = self.url_for(path);
        let attempts = self.options.max_retries.saturating_add(1);
        let mut last_reason = String::new();

        for attempt in 1..=attempts {
            if !running.load(Ordering::Acquire)
                || !self.options.throttle.acquire(running)
                || !running.load(Ordering::Acquire)
            {
                return Err(ProbeError::Interrupted {
                    path: path.to_string(),
                });
            }

            match self.transport.send(&self.options.method, &url) {
                Attempt::Response(response) => {
                    return Ok(ProbeResult {
                        path: path.to_string(),
                        response,
                    })
                }
                Attempt::Retryable { reason } => {
                    debug!(%url, attempt, %reason, "transient request failure");
                    last_reason = reason;
                }
                Attempt::Fatal { reason } => {
                    return Err(ProbeError::Fatal {
                        path: path.to_string(),
                        reason,
                    })
                }
            }
        }

        Err(ProbeError::Request {
            path: path.to_string(),
            attempts,
            reason: last_reason,
        })
    }

    pub fn is_interesting(&self, result: &ProbeResult) -> bool {
        let status = result.response.status;
        self.options.policy.is_interesting(status)
            && !self.options.blacklist.contains(status, &result.path)
    }
}
