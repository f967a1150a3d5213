use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellPermissions};
use crate::login::Role;

lazy_static! {
    static ref CELL_REF_REGEX: Regex = Regex::new(r"^([A-Za-z]{1,3})([1-9][0-9]*)$").unwrap();
}

/// Seed permission pattern for new cells
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub enum ColumnPolicy {
    /// Three access patterns cycling across columns by index modulo 3:
    /// producer-owned, shared with reviewers, and read-only reference.
    #[default]
    Rotating,
    /// No overrides; every cell falls back to the role defaults.
    Open,
}

impl ColumnPolicy {
    pub fn permissions_for(&self, col: usize) -> Option<CellPermissions> {
        match self {
            ColumnPolicy::Open => None,
            ColumnPolicy::Rotating => Some(match col % 3 {
                0 => CellPermissions::new([Role::Admin, Role::DataProducer], true, true),
                1 => CellPermissions::new(
                    [Role::Admin, Role::DataProducer, Role::Reviewer],
                    true,
                    true,
                ),
                _ => CellPermissions::new(Role::ALL, false, true),
            }),
        }
    }
}

/// A named grid of cells
///
/// Every row always has exactly `headers.len()` cells.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Table {
    id: String,
    pub name: String,
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
    confirmed: bool,
    confirmed_by: Option<String>,
    confirmed_at: Option<DateTime<Utc>>,
    confirmed_comments: Option<String>,
    version: u32,
    created_by: String,
    created_at: DateTime<Utc>,
    column_policy: ColumnPolicy,
}

impl Table {
    pub(crate) fn create(
        id: String,
        name: &str,
        headers: Vec<String>,
        row_count: usize,
        column_policy: ColumnPolicy,
        created_by: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut table = Table {
            id,
            name: name.to_string(),
            headers,
            rows: Vec::with_capacity(row_count),
            confirmed: false,
            confirmed_by: None,
            confirmed_at: None,
            confirmed_comments: None,
            version: 1,
            created_by: created_by.to_string(),
            created_at,
            column_policy,
        };
        for _ in 0..row_count {
            table.add_row();
        }
        table
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub(crate) fn cell_mut(&mut self, row: usize, col: usize) -> Option<&mut Cell> {
        self.rows.get_mut(row).and_then(|r| r.get_mut(col))
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

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn blank_row(&self) -> Vec<Cell> {
        (0..self.headers.len())
            .map(|c| Cell::create(self.column_policy.permissions_for(c)))
            .collect()
    }

    pub(crate) fn add_row(&mut self) {
        let row = self.blank_row();
        self.rows.push(row);
    }

    pub(crate) fn add_column(&mut self, header: &str) {
        let col = self.headers.len();
        self.headers.push(header.to_string());
        let policy = self.column_policy;
        for row in self.rows.iter_mut() {
            row.push(Cell::create(policy.permissions_for(col)));
        }
    }

    /// Grow with blank rows until `row` is addressable
    ///
    /// Unbounded; `TableStore::update_cell` enforces `max_row_count` first.
    pub(crate) fn ensure_row(&mut self, row: usize) {
        while self.rows.len() <= row {
            self.add_row();
        }
    }

    /// Stamp a table-level confirmation and bump the version.
    pub(crate) fn confirm(
        &mut self,
        user_id: &str,
        at: DateTime<Utc>,
        comments: Option<&str>,
    ) -> u32 {
        self.confirmed = true;
        self.confirmed_by = Some(user_id.to_string());
        self.confirmed_at = Some(at);
        self.confirmed_comments = comments.map(str::to_string);
        self.version += 1;
        self.version
    }
}

/// Convert a 1-based column number to letters (1 = A, 27 = AA)
pub fn col_to_letter(col: usize) -> String {
    let mut col = col;
    let mut result = String::new();
    while col > 0 {
        col -= 1;
        result.push(((col % 26) as u8 + b'A') as char);
        col /= 26;
    }
    result.chars().rev().collect()
}

pub fn letter_to_col(letters: &str) -> usize {
    letters
        .chars()
        .fold(0, |acc, c| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1))
}

/// A1-style name for 0-based coordinates
///
/// Saturates at `usize::MAX` so any coordinate can be named in a rejection.
pub fn cell_name(row: usize, col: usize) -> String {
    format!("{}{}", col_to_letter(col.saturating_add(1)), row.saturating_add(1))
}

/// Parse an A1-style reference into 0-based `(row, col)`
pub fn parse_cell_ref(cell_ref: &str) -> Option<(usize, usize)> {
    let caps = CELL_REF_REGEX.captures(cell_ref.trim())?;
    let col = letter_to_col(&caps[1]);
    let row = caps[2].parse::<usize>().ok()?;
    Some((row - 1, col - 1))
}
