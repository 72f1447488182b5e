// src/sync/connectivity.rs

//! Network reachability checks run before a sync
//!
//! A probe answers three questions in order: is there a network at all
//! (TCP connect to a well-known address), how fast is it, and can the
//! metadata remote's host be reached. Remotes on the local filesystem
//! skip the last check.

use reqwest::blocking::Client;
use std::fmt;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityError {
    #[error("No network connection")]
    NoNetwork,

    #[error("Remote host unreachable: {0}")]
    RemoteUnreachable(String),

    #[error("Limited connectivity: {0}")]
    Limited(String),
}

/// Latency class of the network connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

impl ConnectionQuality {
    pub fn from_latency(latency: Duration) -> Self {
        match latency.as_millis() {
            0..50 => ConnectionQuality::Excellent,
            50..100 => ConnectionQuality::Good,
            100..200 => ConnectionQuality::Fair,
            200..500 => ConnectionQuality::Poor,
            _ => ConnectionQuality::VeryPoor,
        }
    }
}

impl fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionQuality::Excellent => "excellent",
            ConnectionQuality::Good => "good",
            ConnectionQuality::Fair => "fair",
            ConnectionQuality::Poor => "poor",
            ConnectionQuality::VeryPoor => "very poor",
        };
        f.write_str(name)
    }
}

/// Result of a successful probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub latency: Duration,
    pub quality: ConnectionQuality,
}

impl ProbeReport {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            quality: ConnectionQuality::from_latency(latency),
        }
    }
}

/// Decides whether a sync may start
pub trait ConnectivityProbe: Send + Sync {
    fn probe(&self) -> Result<ProbeReport, ConnectivityError>;
}

/// Probe backed by real TCP and HTTP requests
pub struct NetworkProbe {
    probe_address: String,
    timeout: Duration,
    remote_url: String,
    client: Option<Client>,
}

impl NetworkProbe {
    pub fn new(probe_address: impl Into<String>, timeout: Duration, remote_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .ok();
        Self {
            probe_address: probe_address.into(),
            timeout,
            remote_url: remote_url.into(),
            client,
        }
    }

    fn measure_latency(&self) -> Result<Duration, ConnectivityError> {
        let addrs: Vec<SocketAddr> = self
            .probe_address
            .to_socket_addrs()
            .map_err(|_| ConnectivityError::NoNetwork)?
            .collect();

        for addr in addrs {
            let start = Instant::now();
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(_) => return Ok(start.elapsed()),
                Err(e) => debug!("Probe connect to {} failed: {}", addr, e),
            }
        }
        Err(ConnectivityError::NoNetwork)
    }

    /// `scheme://host/` of the remote, or `None` for local remotes
    fn remote_origin(&self) -> Option<(String, String)> {
        let url = Url::parse(&self.remote_url).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let host = url.host_str()?.to_string();
        let origin = match url.port() {
            Some(port) => format!("{}://{}:{}/", url.scheme(), host, port),
            None => format!("{}://{}/", url.scheme(), host),
        };
        Some((host, origin))
    }

    fn check_remote(&self) -> Result<(), ConnectivityError> {
        let Some((host, origin)) = self.remote_origin() else {
            debug!("Remote {} is local, skipping reachability check", self.remote_url);
            return Ok(());
        };
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ConnectivityError::Limited("HTTP client unavailable".to_string()))?;

        match client.head(&origin).send() {
            // Any HTTP answer means the host is reachable
            Ok(_) => Ok(()),
            Err(e) if e.is_timeout() => Err(ConnectivityError::Limited(format!(
                "timed out reaching {host}"
            ))),
            Err(e) if e.is_connect() => Err(ConnectivityError::RemoteUnreachable(host)),
            Err(e) => Err(ConnectivityError::Limited(format!("{host}: {e}"))),
        }
    }
}

impl ConnectivityProbe for NetworkProbe {
    fn probe(&self) -> Result<ProbeReport, ConnectivityError> {
        let latency = self.measure_latency()?;
        let report = ProbeReport::new(latency);
        debug!(
            "Network latency {}ms ({})",
            latency.as_millis(),
            report.quality
        );
        self.check_remote()?;
        Ok(report)
    }
}
