//! Inventory source seam

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

use crate::config::Credentials;
use crate::types::ServerInfo;
use crate::{Error, Result};

/// Availability zone of the inventory service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zone {
    FrPar1,
    FrPar2,
    FrPar3,
    NlAms1,
    NlAms2,
    NlAms3,
    PlWaw1,
    PlWaw2,
    PlWaw3,
}

impl Zone {
    /// Every zone the service knows about
    pub const ALL: [Zone; 9] = [
        Zone::FrPar1,
        Zone::FrPar2,
        Zone::FrPar3,
        Zone::NlAms1,
        Zone::NlAms2,
        Zone::NlAms3,
        Zone::PlWaw1,
        Zone::PlWaw2,
        Zone::PlWaw3,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Zone::FrPar1 => "fr-par-1",
            Zone::FrPar2 => "fr-par-2",
            Zone::FrPar3 => "fr-par-3",
            Zone::NlAms1 => "nl-ams-1",
            Zone::NlAms2 => "nl-ams-2",
            Zone::NlAms3 => "nl-ams-3",
            Zone::PlWaw1 => "pl-waw-1",
            Zone::PlWaw2 => "pl-waw-2",
            Zone::PlWaw3 => "pl-waw-3",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Zone {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Zone::ALL
            .into_iter()
            .find(|zone| zone.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::ConfigError(format!("Unknown zone: {}", s)))
    }
}

/// Remote server listing, queried once per zone
#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn list_servers(&self, credentials: &Credentials, zone: Zone) -> Result<Vec<ServerInfo>>;
}
