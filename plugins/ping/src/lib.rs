//! ICMP echo health check

use std::net::IpAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use surge_ping::{Client, Config, PingIdentifier, PingSequence, SurgeError, ICMP};
use tracing::{instrument, trace};

use cloudtray_core::{Error, HealthCheck, ProbeOutcome, Result};

const PAYLOAD: [u8; 16] = [42u8; 16];

/// One echo request per check. Raw sockets need `CAP_NET_RAW` (or the
/// `net.ipv4.ping_group_range` sysctl) on Linux.
#[derive(Debug, Default)]
pub struct IcmpCheck {
    next_identifier: AtomicU16,
}

/// Parameters of a single echo request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Echo {
    ip: IpAddr,
    identifier: u16,
    timeout: Duration,
}

impl Echo {
    fn client_config(&self) -> Config {
        match self.ip {
            IpAddr::V4(_) => Config::default(),
            IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
        }
    }
}

impl IcmpCheck {
    pub fn new() -> Self {
        Self::default()
    }

    fn echo(&self, address: &str, timeout: Duration) -> Result<Echo> {
        let ip = parse_address(address)?;
        Ok(Echo {
            ip,
            identifier: self.next_identifier.fetch_add(1, Ordering::Relaxed),
            timeout,
        })
    }

    async fn send(echo: Echo) -> Result<ProbeOutcome> {
        let client = Client::new(&echo.client_config())
            .map_err(|e| Error::ProbeError(format!("Cannot open ICMP socket: {}", e)))?;
        let mut pinger = client.pinger(echo.ip, PingIdentifier(echo.identifier)).await;
        pinger.timeout(echo.timeout);

        match pinger.ping(PingSequence(0), &PAYLOAD).await {
            Ok((_, rtt)) => {
                trace!(rtt_ms = rtt.as_millis() as u64, "Echo reply");
                Ok(ProbeOutcome::reachable(rtt))
            }
            Err(SurgeError::Timeout { .. }) => Ok(ProbeOutcome::unreachable()),
            Err(e) => Err(Error::ProbeError(format!("Ping {} failed: {}", echo.ip, e))),
        }
    }
}

fn parse_address(address: &str) -> Result<IpAddr> {
    address
        .trim()
        .parse()
        .map_err(|e| Error::ProbeError(format!("Invalid address {:?}: {}", address, e)))
}

#[async_trait]
impl HealthCheck for IcmpCheck {
    #[instrument(skip(self))]
    async fn check(&self, address: &str, timeout: Duration) -> Result<ProbeOutcome> {
        let echo = self.echo(address, timeout)?;
        Self::send(echo).await
    }
}
