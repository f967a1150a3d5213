//! TableStore integration tests: the QC scenario plus property checks on
//! history, confirmation, permissions, structure and versioning.

use proptest::prelude::*;

use datashield::{
    ActionType, CellPermissions, CellValue, ColumnPolicy, ResourceKind, Role, ShieldConfig,
    ShieldError, TableStore, User,
};

fn config(policy: ColumnPolicy) -> ShieldConfig {
    ShieldConfig::default()
        .with_column_policy(policy)
        .with_origin_address("192.168.1.10")
}

fn user(role: Role) -> User {
    User::new(format!("u-{}", role), format!("{} user", role), role)
}

// Helper function to check a cell's value
fn assert_cell_value(store: &TableStore, row: usize, col: usize, expected: CellValue) {
    let table = store.current_table().expect("a table should be selected");
    let cell = table.cell(row, col).expect("cell should exist");
    assert_eq!(cell.value(), &expected, "cell ({}, {})", row, col);
}

#[test]
fn test_qc_run_scenario() {
    let mut store = TableStore::new(config(ColumnPolicy::Rotating));
    store.sign_in(user(Role::DataProducer));
    store.create_table("QC Run 1", ["Batch", "Result"], Some(2)).unwrap();

    store.update_cell(0, 1, 42).unwrap();
    {
        let cell = store.current_table().unwrap().cell(0, 1).unwrap();
        assert_eq!(cell.history().len(), 1);
        assert_eq!(cell.history()[0].value, CellValue::Empty);
        assert_eq!(cell.history()[0].user_id, "u-data_producer");
    }
    assert_cell_value(&store, 0, 1, CellValue::Number(42.0));

    store.sign_in(user(Role::Reviewer));
    store.confirm_cell(0, 1, None).unwrap();
    let cell = store.current_table().unwrap().cell(0, 1).unwrap();
    assert!(cell.is_confirmed());
    assert_eq!(cell.confirmed_by(), Some("u-reviewer"));
    assert!(cell.confirmed_at().is_some());

    let err = store.update_cell(0, 1, 99).unwrap_err();
    assert!(matches!(err, ShieldError::Locked { .. }));
    assert!(store.update_cell(0, 1, 99).is_err());
    assert_cell_value(&store, 0, 1, CellValue::Number(42.0));
    assert_eq!(store.current_table().unwrap().cell(0, 1).unwrap().history().len(), 1);
}

#[test]
fn test_every_mutation_is_audited() {
    let mut store = TableStore::new(config(ColumnPolicy::Open));
    store.sign_in(user(Role::Admin));
    let id = store.create_table("Audit", ["A"], Some(1)).unwrap().id().to_string();
    store.select_table(&id).unwrap();
    store.add_row().unwrap();
    store.add_column("B").unwrap();
    store.update_cell(1, 1, "v").unwrap();
    store
        .set_cell_permissions(0, 0, Some(CellPermissions::new([Role::Viewer], false, true)))
        .unwrap();
    store.confirm_cell(1, 1, Some("ok")).unwrap();
    store.confirm_table(None).unwrap();

    let kinds: Vec<(ActionType, ResourceKind)> = store
        .audit()
        .entries()
        .iter()
        .map(|e| (e.action, e.resource))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (ActionType::Login, ResourceKind::Session),
            (ActionType::Create, ResourceKind::Table),
            (ActionType::Read, ResourceKind::Table),
            (ActionType::Create, ResourceKind::Row),
            (ActionType::Create, ResourceKind::Column),
            (ActionType::Update, ResourceKind::Cell),
            (ActionType::Update, ResourceKind::Permissions),
            (ActionType::Confirm, ResourceKind::Cell),
            (ActionType::Confirm, ResourceKind::Table),
        ]
    );

    let update = &store.audit().entries()[5];
    assert!(update.details.contains("B2"));
    assert!(update.details.contains("\"Audit\""));
    assert!(update.details.contains("(empty) -> \"v\""));
    assert!(store.audit().entries()[8].details.contains("version 2"));
    assert!(store.audit().entries().iter().all(|e| e.origin_address == "192.168.1.10"));
}

#[test]
fn test_rejections_leave_no_audit_trace() {
    let mut store = TableStore::new(config(ColumnPolicy::Open));
    store.sign_in(user(Role::Viewer));
    store.create_table("T", ["A"], Some(1)).unwrap();
    let before = store.audit().len();

    assert!(matches!(store.update_cell(0, 0, 1), Err(ShieldError::Forbidden { .. })));
    assert!(matches!(store.confirm_cell(0, 0, None), Err(ShieldError::Forbidden { .. })));
    assert!(matches!(store.confirm_table(None), Err(ShieldError::Forbidden { .. })));
    assert!(matches!(
        store.set_cell_permissions(0, 0, None),
        Err(ShieldError::Forbidden { .. })
    ));
    assert!(matches!(store.export_audit_log(), Err(ShieldError::Forbidden { .. })));

    assert_eq!(store.audit().len(), before);
    assert_eq!(store.current_table().unwrap().version(), 1);
}

#[test]
fn test_permission_replacement_is_wholesale() {
    let mut store = TableStore::new(config(ColumnPolicy::Rotating));
    store.sign_in(user(Role::Admin));
    store.create_table("T", ["A", "B", "C"], Some(1)).unwrap();

    store.set_cell_permissions(0, 2, None).unwrap();
    assert!(store.current_table().unwrap().cell(0, 2).unwrap().permissions.is_none());

    store.sign_in(user(Role::DataProducer));
    // Column 2 was read-only by seed policy; without an override the producer default applies.
    assert!(store.can_edit(0, 2));
    store.sign_in(user(Role::Viewer));
    assert!(store.can_view(0, 2));
    assert!(!store.can_edit(0, 2));
}

#[test]
fn test_rotating_seed_policy() {
    let mut store = TableStore::new(config(ColumnPolicy::Rotating));
    store.sign_in(user(Role::Reviewer));
    store.create_table("T", ["A", "B", "C"], Some(1)).unwrap();

    assert!(!store.can_view(0, 0));
    assert!(store.can_edit(0, 1));
    assert!(store.can_view(0, 2));
    assert!(!store.can_edit(0, 2));
    // Past the end there is no cell yet.
    assert!(store.can_view(5, 0));
    assert!(store.can_edit(5, 0));
}

#[test]
fn test_history_is_hidden_from_unauthorized_viewers() {
    let mut store = TableStore::new(config(ColumnPolicy::Rotating));
    store.sign_in(user(Role::DataProducer));
    store.create_table("T", ["A"], Some(1)).unwrap();
    store.update_cell(0, 0, 1).unwrap();
    assert_eq!(store.cell_history(0, 0).map(|h| h.len()), Some(1));

    store.sign_in(user(Role::Viewer));
    assert!(store.cell_history(0, 0).is_none());
    assert!(store.read_cell(0, 0).is_none());
}

#[test]
fn test_audit_export_contains_every_entry() {
    let mut store = TableStore::new(config(ColumnPolicy::Open));
    store.sign_in(user(Role::Admin));
    store.create_table("T", ["A"], Some(1)).unwrap();
    store.update_cell(0, 0, "x, y").unwrap();

    let text = store.export_audit_log().unwrap();
    assert_eq!(text.lines().count(), 1 + 3);
    assert!(text.contains(",admin,update,cell,"));
    // The export itself is audited afterwards.
    assert_eq!(store.audit().len(), 4);
    assert_eq!(store.audit().last().unwrap().action, ActionType::Export);
}

#[test]
fn test_out_of_range_coordinates_are_rejected() {
    let mut store = TableStore::new(config(ColumnPolicy::Open));
    store.sign_in(user(Role::Admin));
    store.create_table("T", ["A"], Some(1)).unwrap();
    let before = store.audit().len();

    for (row, col) in [(1, 0), (usize::MAX, 0), (0, 1), (0, usize::MAX)] {
        assert!(matches!(
            store.confirm_cell(row, col, None),
            Err(ShieldError::CellNotFound { .. })
        ));
        assert!(matches!(
            store.set_cell_permissions(row, col, None),
            Err(ShieldError::CellNotFound { .. })
        ));
    }
    assert!(matches!(
        store.update_cell(0, usize::MAX, 1),
        Err(ShieldError::ColumnOutOfRange { col: usize::MAX, columns: 1 })
    ));
    assert!(matches!(
        store.update_cell(usize::MAX, usize::MAX, 1),
        Err(ShieldError::ColumnOutOfRange { .. })
    ));
    assert!(matches!(
        store.update_cell(usize::MAX, 0, 1),
        Err(ShieldError::RowOutOfRange { row: usize::MAX, limit: 10_000 })
    ));

    // Sign-in is the only new entry.
    store.sign_in(user(Role::Viewer));
    assert!(matches!(
        store.update_cell(usize::MAX - 1, 0, 1),
        Err(ShieldError::RowOutOfRange { .. })
    ));

    assert_eq!(store.audit().len(), before + 1);
    assert_eq!(store.current_table().unwrap().row_count(), 1);
}

#[test]
fn test_row_growth_stops_at_limit() {
    let mut store = TableStore::new(config(ColumnPolicy::Open).with_max_row_count(3));
    store.sign_in(user(Role::DataProducer));
    store.create_table("T", ["A"], Some(2)).unwrap();

    store.update_cell(2, 0, 1).unwrap();
    let err = store.update_cell(3, 0, 1).unwrap_err();
    assert!(matches!(err, ShieldError::RowOutOfRange { row: 3, limit: 3 }));
    assert!(!err.is_silent());
    assert_eq!(store.current_table().unwrap().row_count(), 3);

    // Explicitly added rows stay editable past the growth limit.
    store.add_row().unwrap();
    store.update_cell(3, 0, 2).unwrap();
    assert_cell_value(&store, 3, 0, CellValue::Number(2.0));
}

#[test]
fn test_sparse_write_into_read_only_seed_column() {
    let mut store = TableStore::new(config(ColumnPolicy::Rotating));
    store.sign_in(user(Role::Viewer));
    store.create_table("T", ["A", "B", "C"], Some(1)).unwrap();

    // No cell exists at row 3 yet, so the first write is allowed.
    assert!(store.can_edit(3, 2));
    store.update_cell(3, 2, "x").unwrap();
    assert_cell_value(&store, 3, 2, CellValue::from("x"));

    // The created cell carries the column's read-only seed.
    let perms = store.current_table().unwrap().cell(3, 2).unwrap().permissions.clone();
    assert_eq!(perms.map(|p| p.editable), Some(false));
    assert!(!store.can_edit(3, 2));
    assert!(store.can_view(3, 2));
    assert!(matches!(store.update_cell(3, 2, "y"), Err(ShieldError::Forbidden { .. })));
    assert_cell_value(&store, 3, 2, CellValue::from("x"));
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_history_is_append_only(values in prop::collection::vec(any::<i32>(), 1..20)) {
        let mut store = TableStore::new(config(ColumnPolicy::Open));
        store.sign_in(user(Role::DataProducer));
        store.create_table("T", ["A"], Some(1)).unwrap();

        for (i, v) in values.iter().enumerate() {
            let before = store.current_table().unwrap().cell(0, 0).unwrap().value().clone();
            prop_assert!(store.update_cell(0, 0, *v).is_ok());

            let cell = store.current_table().unwrap().cell(0, 0).unwrap();
            prop_assert_eq!(cell.history().len(), i + 1);
            prop_assert_eq!(&cell.history()[i].value, &before);
            prop_assert_eq!(cell.value(), &CellValue::from(*v));
        }
    }

    #[test]
    fn prop_confirmed_cells_are_immutable(
        first in any::<i32>(),
        later in prop::collection::vec(any::<i32>(), 1..10),
    ) {
        let mut store = TableStore::new(config(ColumnPolicy::Open));
        store.sign_in(user(Role::Admin));
        store.create_table("T", ["A"], Some(1)).unwrap();
        store.update_cell(0, 0, first).unwrap();
        store.confirm_cell(0, 0, None).unwrap();

        for v in later {
            let locked = matches!(store.update_cell(0, 0, v), Err(ShieldError::Locked { .. }));
            prop_assert!(locked);
        }
        let cell = store.current_table().unwrap().cell(0, 0).unwrap();
        prop_assert_eq!(cell.value(), &CellValue::from(first));
        prop_assert_eq!(cell.history().len(), 1);
    }

    #[test]
    fn prop_admin_bypasses_any_override(
        roles in prop::collection::btree_set(
            prop::sample::select(Role::ALL.to_vec()),
            0..4,
        ),
        editable in any::<bool>(),
        viewable in any::<bool>(),
    ) {
        let mut store = TableStore::new(config(ColumnPolicy::Open));
        store.sign_in(user(Role::Admin));
        store.create_table("T", ["A"], Some(1)).unwrap();
        store
            .set_cell_permissions(0, 0, Some(CellPermissions { roles, editable, viewable }))
            .unwrap();

        prop_assert!(store.can_view(0, 0));
        prop_assert!(store.can_edit(0, 0));
    }

    #[test]
    fn prop_rows_match_headers(ops in prop::collection::vec(any::<bool>(), 0..30)) {
        let mut store = TableStore::new(config(ColumnPolicy::Rotating));
        store.sign_in(user(Role::Admin));
        store.create_table("T", ["A"], Some(2)).unwrap();

        for (i, add_row) in ops.iter().enumerate() {
            if *add_row {
                store.add_row().unwrap();
            } else {
                store.add_column(&format!("C{}", i)).unwrap();
            }
            let table = store.current_table().unwrap();
            for row in table.rows() {
                prop_assert_eq!(row.len(), table.headers().len());
            }
        }
    }

    #[test]
    fn prop_only_table_confirmation_bumps_version(ops in prop::collection::vec(0u8..4, 0..30)) {
        let mut store = TableStore::new(config(ColumnPolicy::Open));
        store.sign_in(user(Role::Admin));
        store.create_table("T", ["A", "B"], Some(1)).unwrap();
        let mut expected = 1u32;

        for (i, op) in ops.iter().enumerate() {
            match op {
                0 => store.add_row().unwrap(),
                1 => store.add_column("X").unwrap(),
                2 => {
                    let _ = store.update_cell(i, 0, i as i32);
                }
                _ => {
                    let version = store.confirm_table(None).unwrap();
                    expected += 1;
                    prop_assert_eq!(version, expected);
                }
            }
            prop_assert_eq!(store.current_table().unwrap().version(), expected);
        }
    }
}
