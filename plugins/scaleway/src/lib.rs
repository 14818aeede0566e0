//! Scaleway inventory source
//!
//! Lists Instance servers zone by zone through the public HTTP API.
//!
//! ## Credentials
//!
//! Only the secret key is sent (`X-Auth-Token`). Organization and access key
//! are still required by the settings so a half-filled form does not start
//! polling.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};

use cloudtray_core::{Credentials, Error, InventorySource, Result, ServerInfo, Zone};

pub const DEFAULT_API_URL: &str = "https://api.scaleway.com";
const PER_PAGE: usize = 50;
const TOTAL_COUNT_HEADER: &str = "x-total-count";

#[derive(Debug, Deserialize)]
struct ListServersResponse {
    #[serde(default)]
    servers: Vec<ApiServer>,
}

#[derive(Debug, Deserialize)]
struct ApiServer {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    state: String,
    public_ip: Option<ApiAddress>,
    ipv6: Option<ApiAddress>,
    location: Option<ApiLocation>,
}

#[derive(Debug, Deserialize)]
struct ApiAddress {
    address: String,
}

#[derive(Debug, Deserialize)]
struct ApiLocation {
    zone_id: String,
}

impl From<ApiServer> for ServerInfo {
    fn from(server: ApiServer) -> Self {
        ServerInfo {
            id: server.id.as_str().into(),
            name: server.name,
            ipv4: server.public_ip.map(|ip| ip.address),
            ipv6: server.ipv6.map(|ip| ip.address),
            state: server.state,
            region: server
                .location
                .map(|location| location.zone_id)
                .filter(|zone_id| !zone_id.is_empty()),
        }
    }
}

/// Instance API client
pub struct ScalewayInventory {
    client: Client,
    base_url: String,
}

impl ScalewayInventory {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_API_URL)
    }

    /// Point at another API endpoint (proxy, mock server)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn servers_url(&self, zone: Zone) -> String {
        format!("{}/instance/v1/zones/{}/servers", self.base_url, zone)
    }

    async fn fetch_page(
        &self,
        credentials: &Credentials,
        zone: Zone,
        page: usize,
    ) -> Result<(Vec<ApiServer>, Option<usize>)> {
        let response = self
            .client
            .get(self.servers_url(zone))
            .header("X-Auth-Token", &credentials.secret_key)
            .query(&[("page", page), ("per_page", PER_PAGE)])
            .send()
            .await
            .map_err(|e| Error::HttpError(format!("Request to {} failed: {}", zone, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::InventoryError(describe_failure(zone, status, &body)));
        }

        let total = response
            .headers()
            .get(TOTAL_COUNT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok());

        let listing: ListServersResponse = response
            .json()
            .await
            .map_err(|e| Error::InventoryError(format!("Invalid listing from {}: {}", zone, e)))?;

        Ok((listing.servers, total))
    }
}

impl Default for ScalewayInventory {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_failure(zone: Zone, status: StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());
    format!("{} returned {}: {}", zone, status, message)
}

#[async_trait]
impl InventorySource for ScalewayInventory {
    #[instrument(skip(self, credentials, zone), fields(zone = %zone))]
    async fn list_servers(
        &self,
        credentials: &Credentials,
        zone: Zone,
    ) -> Result<Vec<ServerInfo>> {
        let mut servers = Vec::new();
        let mut page = 1;

        loop {
            let (batch, total) = self.fetch_page(credentials, zone, page).await?;
            let short_page = batch.len() < PER_PAGE;
            servers.extend(batch.into_iter().map(ServerInfo::from));

            let done = short_page || total.is_some_and(|total| servers.len() >= total);
            if done {
                break;
            }
            page += 1;
        }

        debug!(count = servers.len(), pages = page, "Servers listed");
        Ok(servers)
    }
}
