//! Cell-level access policy.
//!
//! Pure functions of the acting role, the cell's override (if any) and the
//! fallback policy for the operation. No state, no side effects.

use crate::cell::{Cell, CellPermissions};
use crate::login::Role;

/// Which fallback applies to a cell without an override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultPolicy {
    /// Every authenticated role is allowed.
    AnyRole,
    /// Only the given role is allowed.
    OnlyRole(Role),
}

impl DefaultPolicy {
    fn allows(&self, role: Role) -> bool {
        match self {
            DefaultPolicy::AnyRole => true,
            DefaultPolicy::OnlyRole(r) => *r == role,
        }
    }
}

/// Fallback for viewing: everybody who is signed in.
pub const DEFAULT_VIEW: DefaultPolicy = DefaultPolicy::AnyRole;

/// Fallback for editing: only data producers.
pub const DEFAULT_EDIT: DefaultPolicy = DefaultPolicy::OnlyRole(Role::DataProducer);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    View,
    Edit,
}

/// Decide one access check.
///
/// `grant` selects the override flag that must be set for this access kind.
pub fn decide(
    role: Role,
    cell_override: Option<&CellPermissions>,
    grant: impl Fn(&CellPermissions) -> bool,
    default: DefaultPolicy,
) -> bool {
    if role == Role::Admin {
        return true;
    }
    match cell_override {
        Some(perms) => perms.roles.contains(&role) && grant(perms),
        None => default.allows(role),
    }
}

/// Whether `role` may perform `access` on `cell`.
///
/// A cell that does not exist yet is treated as open for both view and edit.
pub fn check(role: Role, cell: Option<&Cell>, access: Access) -> bool {
    let Some(cell) = cell else {
        return true;
    };
    let perms = cell.permissions.as_ref();
    match access {
        Access::View => decide(role, perms, |p| p.viewable, DEFAULT_VIEW),
        Access::Edit => decide(role, perms, |p| p.editable, DEFAULT_EDIT),
    }
}

/// View check for `role`
///
/// # Arguments
/// * `role` - The acting user's role
/// * `cell` - The target cell, `None` if it does not exist yet
pub fn can_view(role: Role, cell: Option<&Cell>) -> bool {
    check(role, cell, Access::View)
}

/// Edit check for `role`. Does not consider confirmation locks.
pub fn can_edit(role: Role, cell: Option<&Cell>) -> bool {
    check(role, cell, Access::Edit)
}
