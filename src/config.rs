//! Configuration for a DataShield session

use std::time::Duration;

use crate::table::ColumnPolicy;

const ENV_DEFAULT_ROWS: &str = "DATASHIELD_DEFAULT_ROWS";
const ENV_MAX_ROWS: &str = "DATASHIELD_MAX_ROWS";
const ENV_ORIGIN_ADDRESS: &str = "DATASHIELD_ORIGIN_ADDRESS";
const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds

/// Session-wide settings shared by the table store, audit log and identity layer
#[derive(Debug, Clone)]
pub struct ShieldConfig {
    /// Rows created by `create_table` when the caller does not ask for a count
    pub default_row_count: usize,

    /// Highest row count `update_cell` may grow a table to
    pub max_row_count: usize,

    /// Seed permission pattern applied to newly created cells
    pub column_policy: ColumnPolicy,

    /// How long a login session stays valid
    pub session_duration: Duration,

    /// Address stamped on every audit entry. Resolved lazily when `None`.
    pub origin_address: Option<String>,

    /// Field separator for the audit export
    pub audit_delimiter: char,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            default_row_count: 10,
            max_row_count: 10_000,
            column_policy: ColumnPolicy::Rotating,
            session_duration: Duration::from_secs(SESSION_DURATION),
            origin_address: None,
            audit_delimiter: ',',
        }
    }
}

impl ShieldConfig {
    /// Create config with defaults, then apply environment overrides
    ///
    /// * `DATASHIELD_DEFAULT_ROWS` - initial row count for new tables
    /// * `DATASHIELD_MAX_ROWS` - growth limit for sparse row creation
    /// * `DATASHIELD_ORIGIN_ADDRESS` - address recorded in the audit trail
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(n) = row_count_var(ENV_DEFAULT_ROWS) {
            config.default_row_count = n;
        }
        if let Some(n) = row_count_var(ENV_MAX_ROWS) {
            config.max_row_count = n;
        }
        if let Ok(addr) = std::env::var(ENV_ORIGIN_ADDRESS) {
            if !addr.trim().is_empty() {
                config.origin_address = Some(addr.trim().to_string());
            }
        }

        config
    }

    pub fn with_default_row_count(mut self, rows: usize) -> Self {
        self.default_row_count = rows;
        self
    }

    pub fn with_max_row_count(mut self, rows: usize) -> Self {
        self.max_row_count = rows;
        self
    }

    pub fn with_column_policy(mut self, policy: ColumnPolicy) -> Self {
        self.column_policy = policy;
        self
    }

    pub fn with_session_duration(mut self, duration: Duration) -> Self {
        self.session_duration = duration;
        self
    }

    pub fn with_origin_address(mut self, addr: impl Into<String>) -> Self {
        self.origin_address = Some(addr.into());
        self
    }

    pub fn with_audit_delimiter(mut self, delimiter: char) -> Self {
        self.audit_delimiter = delimiter;
        self
    }

    /// Address to stamp on audit entries
    ///
    /// Falls back to the host's local IP, then to loopback.
    pub fn resolve_origin_address(&self) -> String {
        if let Some(addr) = &self.origin_address {
            return addr.clone();
        }
        match local_ip_address::local_ip() {
            Ok(ip) => ip.to_string(),
            Err(e) => {
                log::debug!("Could not determine local address: {}", e);
                "127.0.0.1".to_string()
            }
        }
    }
}

fn row_count_var(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(n) => Some(n),
        Err(_) => {
            log::warn!("Ignoring {}={:?}: not a row count", name, raw);
            None
        }
    }
}
