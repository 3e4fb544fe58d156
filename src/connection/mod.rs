//! Blocking HTTP transport used by the probers.
//!
//! A [`Transport`] performs one attempt and says whether it worked, whether it
//! is worth trying again, or whether it never will. Looping is left to the
//! caller.

pub mod throttle;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{redirect, Method, Proxy};
use thiserror::Error;
use tracing::trace;

pub use throttle::Throttle;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:95.0) Gecko/20100101 Firefox/95.0";

/// Status reported for a response whose status line could not be parsed.
pub const EMPTY_RESPONSE_STATUS: u16 = 0;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub location: Option<String>,
    pub content_length: Option<u64>,
}

impl Response {
    pub fn empty() -> Self {
        Self {
            status: EMPTY_RESPONSE_STATUS,
            ..Self::default()
        }
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }
}

/// Outcome of a single transport call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attempt {
    Response(Response),
    Retryable { reason: String },
    Fatal { reason: String },
}

pub trait Transport: Send + Sync {
    fn send(&self, method: &Method, url: &str) -> Attempt;
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    Proxy {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid header '{name}': {message}")]
    InvalidHeader { name: String, message: String },
}

#[derive(Clone, Debug)]
pub struct ConnectionSettings {
    pub timeout: Duration,
    pub proxy: Option<String>,
    pub follow_redirects: bool,
    pub user_agent: String,
    pub headers: Vec<(String, String)>,
    /// Idle connections kept per host; sized to the worker count.
    pub pool_size: usize,
    /// Pins the target host to an already resolved address.
    pub resolve: Option<(String, SocketAddr)>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            proxy: None,
            follow_redirects: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: Vec::new(),
            pool_size: 10,
            resolve: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(settings: &ConnectionSettings) -> Result<Self, ConnectionError> {
        let mut headers = HeaderMap::new();
        let user_agent = HeaderValue::from_str(&settings.user_agent).map_err(|e| {
            ConnectionError::InvalidHeader {
                name: "User-Agent".to_string(),
                message: e.to_string(),
            }
        })?;
        headers.insert(reqwest::header::USER_AGENT, user_agent);
        for (name, value) in &settings.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ConnectionError::InvalidHeader {
                    name: name.clone(),
                    message: e.to_string(),
                }
            })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| ConnectionError::InvalidHeader {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            headers.insert(header_name, header_value);
        }

        let mut builder = Client::builder()
            .default_headers(headers)
            .redirect(if settings.follow_redirects {
                redirect::Policy::limited(10)
            } else {
                redirect::Policy::none()
            })
            .timeout(settings.timeout)
            .pool_max_idle_per_host(settings.pool_size.max(1))
            .danger_accept_invalid_hostnames(true)
            .danger_accept_invalid_certs(true);

        if let Some(proxy) = settings.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            let proxy_cfg = Proxy::all(proxy).map_err(|e| ConnectionError::Proxy {
                proxy: proxy.to_string(),
                source: e,
            })?;
            builder = builder.proxy(proxy_cfg);
        }
        if let Some((host, addr)) = settings.resolve.as_ref() {
            builder = builder.resolve(host, *addr);
        }

        let client = builder
            .build()
            .map_err(|e| ConnectionError::ClientBuild { source: e })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, method: &Method, url: &str) -> Attempt {
        let mut resp = match self.client.request(method.clone(), url).send() {
            Ok(resp) => resp,
            Err(e) => return classify_error(&e),
        };

        let status = resp.status().as_u16();
        let headers = header_map_to_hashmap(resp.headers());
        let location = headers.get("location").cloned();
        let declared_length = resp.content_length();

        // Draining the body lets the pooled connection be reused.
        let body_len = match io::copy(&mut resp, &mut io::sink()) {
            Ok(n) => n,
            Err(e) => return classify_body_error(&e),
        };

        Attempt::Response(Response {
            status,
            headers,
            location,
            content_length: declared_length.or(Some(body_len)),
        })
    }
}

pub(crate) fn header_map_to_hashmap(headers: &HeaderMap) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for (k, v) in headers.iter() {
        if let Ok(v) = v.to_str() {
            out.insert(k.as_str().to_lowercase(), v.to_string());
        }
    }
    out
}

fn error_chain<'a>(
    err: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

fn classify_error(err: &reqwest::Error) -> Attempt {
    let retryable = err.is_timeout() || err.is_connect() || err.is_body();
    classify_chain(err, retryable)
}

/// Body read failures surface as `io::Error`, usually wrapping a reqwest error.
fn classify_body_error(err: &io::Error) -> Attempt {
    match err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
    {
        Some(inner) => classify_error(inner),
        None => classify_chain(err, is_transient_io(err.kind())),
    }
}

fn classify_chain(err: &(dyn StdError + 'static), mut retryable: bool) -> Attempt {
    let reason = err.to_string();
    for cause in error_chain(err) {
        if let Some(hyper_err) = cause.downcast_ref::<hyper::Error>() {
            if hyper_err.is_parse() {
                trace!(%reason, "malformed response");
                return Attempt::Response(Response::empty());
            }
            if hyper_err.is_incomplete_message() || hyper_err.is_closed() {
                retryable = true;
            }
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            retryable |= is_transient_io(io_err.kind());
        }
    }

    if retryable {
        Attempt::Retryable { reason }
    } else {
        Attempt::Fatal { reason }
    }
}

fn is_transient_io(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
    )
}
