// Start of file: /src/models/blocked_ip.rs

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An IP-level denial. `blocked_until == None` means permanent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockedIp {
    pub ip_address: IpAddr,
    pub reason: String,
    pub blocked_at: DateTime<Utc>,
    pub blocked_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub auto_blocked: bool,
}

impl BlockedIp {
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.blocked_until.is_none_or(|until| until > now)
    }
}


// End of file: /src/models/blocked_ip.rs
