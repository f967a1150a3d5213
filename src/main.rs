#![cfg(not(tarpaulin_include))]

use datashield::{CellPermissions, Directory, Role, SessionManager, ShieldConfig, TableStore};
use std::env;

/// Scripted review session
///
/// Signs in each demo account in turn, fills a QC table, confirms it, and
/// prints the exported table and audit trail. Set `RUST_LOG=info` to follow
/// along.
///
/// # Arguments
/// * Optional initial row count (defaults to the configured row count)
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut config = ShieldConfig::from_env();
    if args.len() >= 2 {
        config.default_row_count = args[1].parse().unwrap_or(config.default_row_count);
    }

    let directory = Directory::demo()?;
    let mut sessions = SessionManager::new(config.session_duration);
    let mut store = TableStore::new(config);

    // Producer enters the run
    let producer = directory.authenticate("producer", "producer123")?;
    let session = sessions.create_session(producer);
    store.sign_in(sessions.require_session(&session)?.clone());

    store.create_table("QC Run 1", ["Batch", "Result", "Reference"], None)?;
    store.update_cell_ref("A1", "LOT-001")?;
    store.update_cell_ref("B1", 42)?;
    store.update_cell_ref("A2", "LOT-002")?;
    store.update_cell_ref("B2", 39.5)?;
    if let Err(e) = store.update_cell_ref("C1", "n/a") {
        println!("producer: {}", e);
    }
    store.sign_out();
    sessions.end_session(&session);

    // Admin opens the reference column to reviewers
    let admin = directory.authenticate("admin", "admin123")?;
    store.sign_in(admin);
    let table_id = store.tables()[0].id().to_string();
    store.select_table(&table_id)?;
    store.set_cell_permissions(
        0,
        2,
        Some(CellPermissions::new([Role::Reviewer, Role::DataProducer], true, true)),
    )?;
    store.sign_out();

    // Reviewer checks and confirms
    let reviewer = directory.authenticate("reviewer", "reviewer123")?;
    store.sign_in(reviewer);
    store.select_table(&table_id)?;
    store.update_cell(0, 2, "within limits")?;
    store.confirm_cell(0, 1, Some("matches instrument printout"))?;
    let version = store.confirm_table(Some("Run 1 released"))?;
    println!("table confirmed at version {}", version);
    store.export_pdf()?;
    println!("{}", store.export_csv(true)?);
    store.sign_out();

    // Admin pulls the audit trail
    store.sign_in(directory.authenticate("admin", "admin123")?);
    print!("{}", store.export_audit_log()?);

    Ok(())
}
