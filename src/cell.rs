use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::login::Role;

/// Content of a single cell
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Boolean(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Boolean(b) => write!(f, "{}", b),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

/// Per-cell override of the default role policy
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct CellPermissions {
    pub roles: BTreeSet<Role>,
    pub editable: bool,
    pub viewable: bool,
}

impl CellPermissions {
    pub fn new(roles: impl IntoIterator<Item = Role>, editable: bool, viewable: bool) -> Self {
        CellPermissions {
            roles: roles.into_iter().collect(),
            editable,
            viewable,
        }
    }
}

/// One replaced value, stamped with who replaced it and when
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct HistoryEntry {
    pub value: CellValue,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct Cell {
    value: CellValue,
    confirmed: bool,
    confirmed_by: Option<String>,
    confirmed_at: Option<DateTime<Utc>>,
    confirmed_comments: Option<String>,
    pub permissions: Option<CellPermissions>,
    history: Vec<HistoryEntry>,
}

impl Cell {
    pub fn create(permissions: Option<CellPermissions>) -> Self {
        Cell {
            permissions,
            ..Cell::default()
        }
    }

    pub fn value(&self) -> &CellValue {
        &self.value
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn confirmed_by(&self) -> Option<&str> {
        self.confirmed_by.as_deref()
    }

    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed_at
    }

    pub fn confirmed_comments(&self) -> Option<&str> {
        self.confirmed_comments.as_deref()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Replace the value, pushing the old one onto the history.
    ///
    /// Returns the replaced value, or `None` if the cell is confirmed, in
    /// which case nothing changes.
    pub fn record_edit(
        &mut self,
        value: CellValue,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Option<CellValue> {
        if self.confirmed {
            return None;
        }

        let entry = HistoryEntry {
            value: self.value.clone(),
            timestamp: at,
            user_id: user_id.to_string(),
        };
        let previous = std::mem::replace(&mut self.value, value);
        self.history.push(entry);
        Some(previous)
    }

    /// Lock the cell. Returns false if it was already confirmed.
    pub fn confirm(&mut self, user_id: &str, at: DateTime<Utc>, comments: Option<&str>) -> bool {
        if self.confirmed {
            return false;
        }

        self.confirmed = true;
        self.confirmed_by = Some(user_id.to_string());
        self.confirmed_at = Some(at);
        self.confirmed_comments = comments.map(str::to_string);
        true
    }
}
