//! Append-only audit trail.
//!
//! Every mutating table store operation writes one entry here. Entries are
//! never edited or removed; the only way out is `export_all`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config::ShieldConfig;
use crate::downloader::escape_field;
use crate::login::{Role, User};

/// Kind of action recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Create,
    Read,
    Update,
    Confirm,
    Export,
    Login,
    Logout,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Confirm => "confirm",
            Self::Export => "export",
            Self::Login => "login",
            Self::Logout => "logout",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an audited action touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Table,
    Row,
    Column,
    Cell,
    Permissions,
    Session,
    Report,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Row => "row",
            Self::Column => "column",
            Self::Cell => "cell",
            Self::Permissions => "permissions",
            Self::Session => "session",
            Self::Report => "report",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub role: Role,
    pub action: ActionType,
    pub resource: ResourceKind,
    pub details: String,
    pub timestamp: DateTime<Utc>,
    pub origin_address: String,
}

const EXPORT_HEADER: [&str; 9] = [
    "id",
    "userId",
    "userName",
    "role",
    "actionType",
    "resource",
    "details",
    "timestamp",
    "originAddress",
];

#[derive(Debug)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
    origin_address: String,
    delimiter: char,
}

impl AuditLog {
    pub fn new(config: &ShieldConfig) -> Self {
        AuditLog {
            entries: Vec::new(),
            origin_address: config.resolve_origin_address(),
            delimiter: config.audit_delimiter,
        }
    }

    /// Append one entry for `actor` and return it
    pub fn record(
        &mut self,
        actor: &User,
        action: ActionType,
        resource: ResourceKind,
        details: impl Into<String>,
    ) -> &AuditEntry {
        let entry = AuditEntry {
            id: Uuid::new_v4().to_string(),
            user_id: actor.id.clone(),
            user_name: actor.name.clone(),
            role: actor.role,
            action,
            resource,
            details: details.into(),
            timestamp: Utc::now(),
            origin_address: self.origin_address.clone(),
        };
        log::debug!("audit: {} {} {} {}", entry.user_id, action, resource, entry.details);

        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn entries_for_user(&self, user_id: &str) -> Vec<&AuditEntry> {
        self.entries.iter().filter(|e| e.user_id == user_id).collect()
    }

    pub fn last(&self) -> Option<&AuditEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the whole log as delimited text, oldest entry first
    pub fn export_all(&self) -> String {
        let sep = self.delimiter.to_string();
        let mut out = EXPORT_HEADER.join(&sep);
        out.push('\n');

        for e in &self.entries {
            let timestamp = e.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
            let fields = [
                e.id.as_str(),
                e.user_id.as_str(),
                e.user_name.as_str(),
                e.role.as_str(),
                e.action.as_str(),
                e.resource.as_str(),
                e.details.as_str(),
                timestamp.as_str(),
                e.origin_address.as_str(),
            ];
            let line: Vec<String> = fields
                .iter()
                .map(|f| escape_field(f, self.delimiter))
                .collect();
            out.push_str(&line.join(&sep));
            out.push('\n');
        }

        out
    }
}
