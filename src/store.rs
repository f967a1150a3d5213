//! The table store: owner of every table, the current selection and the
//! signed-in actor.
//!
//! Every operation runs to completion before returning. Rejections come back
//! as `ShieldError` and leave the store untouched; successful mutations always
//! append to the audit log.

use chrono::Utc;
use uuid::Uuid;

use crate::audit::{ActionType, AuditLog, ResourceKind};
use crate::cell::{Cell, CellPermissions, CellValue, HistoryEntry};
use crate::config::ShieldConfig;
use crate::downloader;
use crate::error::{Result, ShieldError};
use crate::login::{CONFIRM_DATA, EXPORT_DATA, User, VIEW_AUDIT};
use crate::permissions;
use crate::table::{Table, cell_name, parse_cell_ref};

/// In-memory home of every table, plus the session's actor and audit log
#[derive(Debug)]
pub struct TableStore {
    config: ShieldConfig,
    tables: Vec<Table>,
    current: Option<String>,
    actor: Option<User>,
    audit: AuditLog,
}

/// Log a rejection at the level its class deserves and hand it back.
fn reject(err: ShieldError) -> ShieldError {
    if err.is_silent() {
        log::debug!("Ignored: {}", err);
    } else {
        log::warn!("Rejected: {}", err);
    }
    err
}

fn describe(value: &CellValue) -> String {
    match value {
        CellValue::Empty => "(empty)".to_string(),
        CellValue::Text(s) => format!("\"{}\"", s),
        other => other.to_string(),
    }
}

impl TableStore {
    /// Create an empty store with nobody signed in
    ///
    /// # Arguments
    /// * `config` - Session settings; the audit origin address is resolved here
    pub fn new(config: ShieldConfig) -> Self {
        let audit = AuditLog::new(&config);
        TableStore {
            config,
            tables: Vec::new(),
            current: None,
            actor: None,
            audit,
        }
    }

    /// The settings this store was created with
    pub fn config(&self) -> &ShieldConfig {
        &self.config
    }

    /// Read-only view of the audit trail
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// The signed-in user, if any
    pub fn actor(&self) -> Option<&User> {
        self.actor.as_ref()
    }

    /// Every table in creation order
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Look up a table by id without changing the selection
    pub fn table(&self, id: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.id() == id)
    }

    /// The selected table, if any
    pub fn current_table(&self) -> Option<&Table> {
        let id = self.current.as_deref()?;
        self.table(id)
    }

    fn current_index(&self) -> Result<usize> {
        let id = self.current.as_deref().ok_or(ShieldError::NoTableSelected)?;
        self.tables
            .iter()
            .position(|t| t.id() == id)
            .ok_or(ShieldError::NoTableSelected)
    }

    // ─── Session ───

    /// Make `user` the acting user for every following operation
    pub fn sign_in(&mut self, user: User) {
        if let Some(previous) = &self.actor {
            log::info!("Replacing signed-in user {} with {}", previous.id, user.id);
        }
        let details = format!("{} signed in as {}", user.name, user.role);
        self.audit.record(&user, ActionType::Login, ResourceKind::Session, details);
        log::info!("{} signed in", user.id);
        self.actor = Some(user);
    }

    /// Clear the acting user and the current selection
    pub fn sign_out(&mut self) {
        if let Some(user) = self.actor.take() {
            let details = format!("{} signed out", user.name);
            self.audit.record(&user, ActionType::Logout, ResourceKind::Session, details);
            log::info!("{} signed out", user.id);
        }
        self.current = None;
    }

    // ─── Structure ───

    /// Create a table, select it, and return it
    ///
    /// `row_count` defaults to the configured row count. New cells receive the
    /// configured seed permissions for their column.
    pub fn create_table<I, S>(
        &mut self,
        name: &str,
        headers: I,
        row_count: Option<usize>,
    ) -> Result<&Table>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let actor = self.actor.as_ref().ok_or_else(|| reject(ShieldError::Unauthenticated))?;

        let headers: Vec<String> = headers.into_iter().map(Into::into).collect();
        let rows = row_count.unwrap_or(self.config.default_row_count);
        let table = Table::create(
            Uuid::new_v4().to_string(),
            name,
            headers,
            rows,
            self.config.column_policy,
            &actor.id,
            Utc::now(),
        );

        let details = format!(
            "Created table \"{}\" with {} columns and {} rows",
            name,
            table.column_count(),
            rows
        );
        self.audit.record(actor, ActionType::Create, ResourceKind::Table, details);
        log::info!("{} created table {} ({})", actor.id, name, table.id());

        self.current = Some(table.id().to_string());
        self.tables.push(table);
        Ok(&self.tables[self.tables.len() - 1])
    }

    /// Make the table with `id` current
    pub fn select_table(&mut self, id: &str) -> Result<()> {
        let actor = self.actor.as_ref().ok_or_else(|| reject(ShieldError::Unauthenticated))?;
        let table = self
            .tables
            .iter()
            .find(|t| t.id() == id)
            .ok_or_else(|| reject(ShieldError::TableNotFound(id.to_string())))?;

        let details = format!("Opened table \"{}\"", table.name);
        self.audit.record(actor, ActionType::Read, ResourceKind::Table, details);
        self.current = Some(id.to_string());
        Ok(())
    }

    /// Append one blank row to the current table
    pub fn add_row(&mut self) -> Result<()> {
        let actor = self.actor.as_ref().ok_or_else(|| reject(ShieldError::Unauthenticated))?;
        let idx = self.current_index().map_err(reject)?;
        let table = &mut self.tables[idx];

        table.add_row();
        let details = format!("Added row {} to table \"{}\"", table.row_count(), table.name);
        self.audit.record(actor, ActionType::Create, ResourceKind::Row, details);
        Ok(())
    }

    /// Append a column to the current table, extending every row by one cell
    pub fn add_column(&mut self, header: &str) -> Result<()> {
        let actor = self.actor.as_ref().ok_or_else(|| reject(ShieldError::Unauthenticated))?;
        let idx = self.current_index().map_err(reject)?;
        let table = &mut self.tables[idx];

        table.add_column(header);
        let details = format!("Added column \"{}\" to table \"{}\"", header, table.name);
        self.audit.record(actor, ActionType::Create, ResourceKind::Column, details);
        Ok(())
    }

    /// Confirm the current table and return its new version
    pub fn confirm_table(&mut self, comments: Option<&str>) -> Result<u32> {
        let actor = self.actor.as_ref().ok_or_else(|| reject(ShieldError::Unauthenticated))?;
        let idx = self.current_index().map_err(reject)?;
        if !actor.has_permission(CONFIRM_DATA) {
            return Err(reject(ShieldError::forbidden("confirm tables", actor.role)));
        }

        let table = &mut self.tables[idx];
        let version = table.confirm(&actor.id, Utc::now(), comments);

        let mut details = format!("Confirmed table \"{}\" (version {})", table.name, version);
        if let Some(c) = comments {
            details.push_str(&format!(": {}", c));
        }
        self.audit.record(actor, ActionType::Confirm, ResourceKind::Table, details);
        log::info!("{} confirmed table {} at version {}", actor.id, table.id(), version);
        Ok(version)
    }

    // ─── Permissions ───

    /// Whether the actor may view `(row, col)` in the current table
    ///
    /// # Returns
    /// `false` when nobody is signed in or no table is selected. A cell that
    /// does not exist yet counts as viewable.
    pub fn can_view(&self, row: usize, col: usize) -> bool {
        match (self.actor.as_ref(), self.current_table()) {
            (Some(actor), Some(table)) => permissions::can_view(actor.role, table.cell(row, col)),
            _ => false,
        }
    }

    /// Whether the actor may edit `(row, col)` in the current table
    ///
    /// # Returns
    /// `false` when nobody is signed in or no table is selected. A cell that
    /// does not exist yet counts as editable.
    pub fn can_edit(&self, row: usize, col: usize) -> bool {
        match (self.actor.as_ref(), self.current_table()) {
            (Some(actor), Some(table)) => permissions::can_edit(actor.role, table.cell(row, col)),
            _ => false,
        }
    }

    /// Replace a cell's permission override. Admin only.
    ///
    /// # Arguments
    /// * `perms` - The new override, or `None` to fall back to role defaults
    ///
    /// # Returns
    /// `CellNotFound` when the cell does not exist; the table is not grown.
    pub fn set_cell_permissions(
        &mut self,
        row: usize,
        col: usize,
        perms: Option<CellPermissions>,
    ) -> Result<()> {
        let actor = self.actor.as_ref().ok_or_else(|| reject(ShieldError::Unauthenticated))?;
        let idx = self.current_index().map_err(reject)?;
        if !actor.is_admin() {
            return Err(reject(ShieldError::forbidden("change cell permissions", actor.role)));
        }

        let table = &mut self.tables[idx];
        let name = cell_name(row, col);
        let details = match &perms {
            Some(p) => {
                let roles: Vec<&str> = p.roles.iter().map(|r| r.as_str()).collect();
                format!(
                    "Set permissions on {} in \"{}\": roles [{}], editable {}, viewable {}",
                    name,
                    table.name,
                    roles.join(", "),
                    p.editable,
                    p.viewable
                )
            }
            None => format!("Cleared permissions on {} in \"{}\"", name, table.name),
        };
        let cell = table
            .cell_mut(row, col)
            .ok_or_else(|| reject(ShieldError::CellNotFound { cell: name.clone() }))?;
        cell.permissions = perms;

        self.audit.record(actor, ActionType::Update, ResourceKind::Permissions, details);
        Ok(())
    }

    // ─── Cells ───

    /// The cell at `(row, col)` if it exists and the actor may view it
    pub fn read_cell(&self, row: usize, col: usize) -> Option<&Cell> {
        if !self.can_view(row, col) {
            return None;
        }
        self.current_table()?.cell(row, col)
    }

    /// Prior values of a viewable cell, oldest first
    pub fn cell_history(&self, row: usize, col: usize) -> Option<&[HistoryEntry]> {
        self.read_cell(row, col).map(Cell::history)
    }

    /// Set a cell's value in the current table
    ///
    /// Rows past the end are created on demand, up to the configured
    /// `max_row_count`. Checks run in order: signed in and table selected,
    /// edit permission, cell not confirmed, column in range, row in range.
    ///
    /// New cells take the column's seed permissions after the edit check, so
    /// the first write into a read-only seeded column succeeds and later ones
    /// are refused.
    pub fn update_cell(
        &mut self,
        row: usize,
        col: usize,
        value: impl Into<CellValue>,
    ) -> Result<()> {
        let value = value.into();
        let actor = self.actor.as_ref().ok_or_else(|| reject(ShieldError::Unauthenticated))?;
        let idx = self.current_index().map_err(reject)?;
        let name = cell_name(row, col);
        let limit = self.config.max_row_count;

        let table = &mut self.tables[idx];
        let existing = table.cell(row, col);
        if !permissions::can_edit(actor.role, existing) {
            let action = format!("edit cell {}", name);
            return Err(reject(ShieldError::forbidden(&action, actor.role)));
        }
        if existing.is_some_and(Cell::is_confirmed) {
            return Err(reject(ShieldError::Locked { cell: name }));
        }
        if col >= table.column_count() {
            return Err(reject(ShieldError::ColumnOutOfRange {
                col,
                columns: table.column_count(),
            }));
        }
        if row >= table.row_count() && row >= limit {
            return Err(reject(ShieldError::RowOutOfRange { row, limit }));
        }

        table.ensure_row(row);
        let new_text = describe(&value);
        let previous = table
            .cell_mut(row, col)
            .and_then(|cell| cell.record_edit(value, &actor.id, Utc::now()))
            .ok_or_else(|| reject(ShieldError::Locked { cell: name.clone() }))?;

        let details = format!(
            "Updated {} (row {}, column {}) in \"{}\": {} -> {}",
            name,
            row + 1,
            col + 1,
            table.name,
            describe(&previous),
            new_text
        );
        self.audit.record(actor, ActionType::Update, ResourceKind::Cell, details);
        Ok(())
    }

    /// `update_cell` addressed by an A1-style reference
    pub fn update_cell_ref(&mut self, cell_ref: &str, value: impl Into<CellValue>) -> Result<()> {
        let (row, col) = parse_cell_ref(cell_ref)
            .ok_or_else(|| reject(ShieldError::InvalidCellReference(cell_ref.to_string())))?;
        self.update_cell(row, col, value)
    }

    /// Lock a cell against further edits
    pub fn confirm_cell(&mut self, row: usize, col: usize, comments: Option<&str>) -> Result<()> {
        let actor = self.actor.as_ref().ok_or_else(|| reject(ShieldError::Unauthenticated))?;
        let idx = self.current_index().map_err(reject)?;
        if !actor.has_permission(CONFIRM_DATA) {
            return Err(reject(ShieldError::forbidden("confirm data", actor.role)));
        }

        let table = &mut self.tables[idx];
        let name = cell_name(row, col);
        let cell = table
            .cell_mut(row, col)
            .ok_or_else(|| reject(ShieldError::CellNotFound { cell: name.clone() }))?;
        if !cell.confirm(&actor.id, Utc::now(), comments) {
            return Err(reject(ShieldError::AlreadyConfirmed { cell: name }));
        }

        let mut details = format!("Confirmed {} in \"{}\"", name, table.name);
        if let Some(c) = comments {
            details.push_str(&format!(": {}", c));
        }
        self.audit.record(actor, ActionType::Confirm, ResourceKind::Cell, details);
        Ok(())
    }

    // ─── Export ───

    /// Current table as CSV. Cells the actor cannot view are left blank.
    pub fn export_csv(&mut self, include_headers: bool) -> Result<String> {
        let actor = self.actor.as_ref().ok_or_else(|| reject(ShieldError::Unauthenticated))?;
        let idx = self.current_index().map_err(reject)?;
        if !actor.has_permission(EXPORT_DATA) {
            return Err(reject(ShieldError::forbidden("export data", actor.role)));
        }

        let table = &self.tables[idx];
        let csv = downloader::to_csv_with(table, include_headers, |r, c| {
            permissions::can_view(actor.role, table.cell(r, c))
        });

        let details = format!(
            "Exported table \"{}\" as CSV ({} rows)",
            table.name,
            table.row_count()
        );
        self.audit.record(actor, ActionType::Export, ResourceKind::Table, details);
        Ok(csv)
    }

    /// Current table as XLSX bytes
    #[cfg(feature = "xlsx")]
    pub fn export_xlsx(&mut self) -> Result<Vec<u8>> {
        let actor = self.actor.as_ref().ok_or_else(|| reject(ShieldError::Unauthenticated))?;
        let idx = self.current_index().map_err(reject)?;
        if !actor.has_permission(EXPORT_DATA) {
            return Err(reject(ShieldError::forbidden("export data", actor.role)));
        }

        let table = &self.tables[idx];
        let bytes = downloader::to_xlsx(table, |r, c| {
            permissions::can_view(actor.role, table.cell(r, c))
        })
        .map_err(|e| reject(ShieldError::Export(e.to_string())))?;

        let details = format!("Exported table \"{}\" as XLSX", table.name);
        self.audit.record(actor, ActionType::Export, ResourceKind::Table, details);
        Ok(bytes)
    }

    /// Request a PDF report of the current table
    ///
    /// No document is rendered; the request is audited and announced.
    pub fn export_pdf(&mut self) -> Result<()> {
        let actor = self.actor.as_ref().ok_or_else(|| reject(ShieldError::Unauthenticated))?;
        let idx = self.current_index().map_err(reject)?;
        if !actor.has_permission(EXPORT_DATA) {
            return Err(reject(ShieldError::forbidden("export data", actor.role)));
        }

        let table = &self.tables[idx];
        let details = format!(
            "Generated PDF report for table \"{}\" (version {})",
            table.name,
            table.version()
        );
        self.audit.record(actor, ActionType::Export, ResourceKind::Report, details);
        log::info!("PDF report for \"{}\" is ready", table.name);
        Ok(())
    }

    /// The audit trail as delimited text. Requires `view_audit`.
    pub fn export_audit_log(&mut self) -> Result<String> {
        let actor = self.actor.as_ref().ok_or_else(|| reject(ShieldError::Unauthenticated))?;
        if !actor.has_permission(VIEW_AUDIT) {
            return Err(reject(ShieldError::forbidden("export the audit log", actor.role)));
        }

        let text = self.audit.export_all();
        let details = format!("Exported audit log ({} entries)", self.audit.len());
        self.audit.record(actor, ActionType::Export, ResourceKind::Report, details);
        Ok(text)
    }
}
