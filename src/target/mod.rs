use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use reqwest::Url;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("invalid target url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("couldn't resolve DNS for '{host}'")]
    Resolution {
        host: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

/// A normalized scan target, resolved once at setup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    scheme: String,
    host: String,
    port: u16,
    base_path: String,
    addr: SocketAddr,
}

impl Target {
    /// Parses `url`, defaulting the scheme to `http`, and resolves its host.
    ///
    /// With `ip_override` set, DNS is skipped and requests go to that address.
    pub fn parse(url: &str, ip_override: Option<IpAddr>) -> Result<Self, TargetError> {
        let raw = url.trim();
        if raw.is_empty() {
            return Err(TargetError::InvalidUrl {
                url: url.to_string(),
                reason: "empty url".to_string(),
            });
        }
        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("http://{raw}")
        };

        let parsed = Url::parse(&with_scheme).map_err(|e| TargetError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let scheme = parsed.scheme().to_string();
        if scheme != "http" && scheme != "https" {
            return Err(TargetError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{scheme}'"),
            });
        }
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TargetError::InvalidUrl {
                url: url.to_string(),
                reason: "missing host".to_string(),
            })?
            .to_string();
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| TargetError::InvalidUrl {
                url: url.to_string(),
                reason: "missing port".to_string(),
            })?;

        let mut base_path = parsed.path().to_string();
        if !base_path.ends_with('/') {
            base_path.push('/');
        }

        let addr = match ip_override {
            Some(ip) => SocketAddr::new(ip, port),
            None => resolve(&host, port)?,
        };
        debug!(%host, port, %addr, "target resolved");

        Ok(Self {
            scheme,
            host,
            port,
            base_path,
            addr,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Always starts and ends with `/`.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.addr
    }

    /// `scheme://host:port/basePath/`
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme, self.host, self.port, self.base_path
        )
    }

    /// Host name to pin to [`Target::socket_addr`], if the host is not an IP literal.
    pub fn pinned_host(&self) -> Option<(String, SocketAddr)> {
        let bare = self.host.trim_start_matches('[').trim_end_matches(']');
        if bare.parse::<IpAddr>().is_ok() {
            None
        } else {
            Some((self.host.clone(), self.addr))
        }
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, TargetError> {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    let mut addrs = (bare, port)
        .to_socket_addrs()
        .map_err(|e| TargetError::Resolution {
            host: host.to_string(),
            source: Some(e),
        })?;
    addrs.next().ok_or_else(|| TargetError::Resolution {
        host: host.to_string(),
        source: None,
    })
}
