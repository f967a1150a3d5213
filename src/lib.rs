/*!
# DataShield

Data-entry and review engine for governed spreadsheets: tables are filled in by
data producers, checked and confirmed by reviewers, and every action lands in an
audit trail.

## Overview

A `TableStore` owns every table in the session, the currently selected table,
and the signed-in user. All reads and writes go through it. Each cell carries
its value, an append-only edit history, an optional per-cell permission
override, and a one-way confirmation lock.

## Architecture

### Identity Layer
- **login**: closed `Role` set, argon2-hashed mock `Directory`, session manager

### Core Layer
- **cell**: cell value, history and confirmation state
- **table**: grid structure, version counter, A1 naming, seed column policy
- **permissions**: view/edit policy as pure functions
- **store**: table collection, selection, every mutating operation

### Compliance & Export Layer
- **audit**: append-only action log with delimited-text export
- **downloader**: CSV (and optional XLSX) serialization

## Access Rules

- Admins may view and edit every cell.
- A cell with an override is open only to the listed roles, and only for the
  flags that are set.
- Without an override, every signed-in role may view, but only data producers
  may edit.
- Confirmed cells reject edits. Confirmation cannot be undone.

## Usage

```
use datashield::{Role, ShieldConfig, TableStore, User};

let mut store = TableStore::new(ShieldConfig::default());
store.sign_in(User::new("u1", "Pat", Role::DataProducer));
store.create_table("QC Run 1", ["Batch", "Result"], Some(2)).unwrap();
store.update_cell(0, 1, 42).unwrap();

store.sign_in(User::new("u2", "Rae", Role::Reviewer));
store.confirm_cell(0, 1, Some("checked")).unwrap();
assert!(store.update_cell(0, 1, 99).is_err());
```
*/

pub mod audit;
pub mod cell;
pub mod config;
pub mod downloader;
pub mod error;
pub mod login;
pub mod permissions;
pub mod store;
pub mod table;

pub use audit::{ActionType, AuditEntry, AuditLog, ResourceKind};
pub use cell::{Cell, CellPermissions, CellValue, HistoryEntry};
pub use config::ShieldConfig;
pub use error::{Result, ShieldError};
pub use login::{Directory, Role, SessionManager, User, UserRecord};
pub use store::TableStore;
pub use table::{ColumnPolicy, Table};
