//! The request gate.
//!
//! A [`Gate`] owns an immutable [`Config`] snapshot and classifies each
//! request as blocked or redirected. Evaluation is a couple of linear scans
//! over the configured lists; it never fails and keeps no state between
//! calls, so one instance is shared by every connection thread.

use crate::config::Config;
use ipnet::IpNet;
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use tracing::{debug, warn};

/// What the gate looks at for one request.
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    /// Raw User-Agent header, empty when absent.
    pub user_agent: &'a str,
    /// Client address as resolved by the transport layer. May not parse.
    pub client_ip: &'a str,
}

/// Which rule blocked a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason<'a> {
    UserAgent(&'a str),
    Network(&'a IpNet),
}

/// Outcome of evaluating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision<'a> {
    /// Serve the forbidden page.
    Blocked {
        reason: BlockReason<'a>,
        headers: &'a BTreeMap<String, String>,
        body: &'a str,
    },
    /// Send the caller elsewhere.
    Redirect { url: &'a str, status: u16 },
}

impl fmt::Display for BlockReason<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::UserAgent(pattern) => write!(f, "user agent contains {:?}", pattern),
            BlockReason::Network(network) => write!(f, "client in {}", network),
        }
    }
}

/// Immutable block policy shared across all requests.
#[derive(Debug)]
pub struct Gate {
    config: Config,
}

impl Gate {
    /// Build a gate from an already validated configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Decide whether `request` is blocked and with what response.
    pub fn evaluate(&self, request: &GateRequest<'_>) -> Decision<'_> {
        match self.block_reason(request) {
            Some(reason) => {
                debug!(%reason, client_ip = request.client_ip, "Request blocked");
                Decision::Blocked {
                    reason,
                    headers: &self.config.forbidden_headers,
                    body: &self.config.forbidden_response,
                }
            }
            None => Decision::Redirect {
                url: &self.config.redirect_url,
                status: self.config.redirect_status,
            },
        }
    }

    fn block_reason(&self, request: &GateRequest<'_>) -> Option<BlockReason<'_>> {
        // User-agent rule first; it wins regardless of the client address.
        if let Some(pattern) = self
            .config
            .forbidden_user_agents
            .iter()
            .find(|pattern| request.user_agent.contains(pattern.as_str()))
        {
            return Some(BlockReason::UserAgent(pattern));
        }

        if self.config.forbidden_networks.is_empty() {
            return None;
        }

        let ip: IpAddr = match request.client_ip.parse() {
            Ok(ip) => ip,
            Err(e) => {
                warn!(client_ip = request.client_ip, error = %e, "Can't parse client address as IP");
                return None;
            }
        };

        self.config
            .forbidden_networks
            .iter()
            .find(|network| network.contains(&ip))
            .map(BlockReason::Network)
    }
}
