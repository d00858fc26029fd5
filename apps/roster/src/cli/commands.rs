//! Implementations of the offline CLI commands.
//!
//! Each command opens the redb file, does its work through [`Roster`] and
//! prints either a short text report or JSON (`--json`).

use chrono::Local;
use roster_core::{
    CheckinPolicy, Error, ImportFormat, ImportReport, Member, RedbStore, Result, Roster,
    Statistics, read_members,
};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// Open (or create) the database as a roster.
pub fn open_roster(db: &Path, policy: CheckinPolicy) -> Result<Roster> {
    let store = RedbStore::open(db)?;
    Ok(Roster::new(store).with_policy(policy))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// =============================================================================
// INIT
// =============================================================================

/// Create an empty database file.
pub fn cmd_init(db: &Path, force: bool) -> Result<()> {
    if db.exists() {
        if !force {
            return Err(Error::Conflict(format!(
                "{} already exists (use --force to overwrite)",
                db.display()
            )));
        }
        std::fs::remove_file(db)?;
    }
    RedbStore::open(db)?;
    info!(db = %db.display(), "database initialized");
    println!("Initialized empty roster at {}", db.display());
    Ok(())
}

// =============================================================================
// IMPORT
// =============================================================================

fn detect_format(file: &Path, format: Option<&str>) -> Result<ImportFormat> {
    if let Some(format) = format {
        return format.parse();
    }
    let is_json = file
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    Ok(if is_json {
        ImportFormat::Json
    } else {
        ImportFormat::Csv
    })
}

/// Load members from a registration export.
pub fn cmd_import(
    db: &Path,
    file: &Path,
    format: Option<&str>,
    replace: bool,
    json: bool,
) -> Result<ImportReport> {
    let format = detect_format(file, format)?;
    let reader = BufReader::new(File::open(file)?);
    let drafts = read_members(reader, format)?;

    let roster = open_roster(db, CheckinPolicy::default())?;
    let report = roster.import(drafts, replace)?;
    info!(
        file = %file.display(),
        inserted = report.inserted,
        skipped = report.skipped,
        replace,
        "import finished"
    );

    if json {
        print_json(&report)?;
    } else {
        println!(
            "Imported {} member(s), skipped {} duplicate(s)",
            report.inserted, report.skipped
        );
    }
    Ok(report)
}

// =============================================================================
// USERS
// =============================================================================

/// Create a staff account.
pub fn cmd_create_user(
    db: &Path,
    username: &str,
    password: &str,
    mssv: &str,
    iterations: u32,
) -> Result<()> {
    let roster = open_roster(db, CheckinPolicy::default())?.with_password_iterations(iterations);
    let user = roster.register_user(username, password, mssv)?;
    info!(username = %user.username, "user created");
    println!("Created user '{}'", user.username);
    Ok(())
}

// =============================================================================
// REPORTS
// =============================================================================

fn format_checkin(member: &Member) -> String {
    member
        .checkin_time
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S %d/%m/%Y").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Print all members.
pub fn cmd_list(db: &Path, json: bool) -> Result<Vec<Member>> {
    let members = open_roster(db, CheckinPolicy::default())?.list()?;

    if json {
        print_json(&members)?;
        return Ok(members);
    }

    println!(
        "{:>5}  {:<12} {:<28} {:<18} {:<16} {:<19} {:>7}",
        "ID", "MSSV", "NAME", "SPECIALIST", "STATE", "CHECK-IN", "LOTTERY"
    );
    for m in &members {
        println!(
            "{:>5}  {:<12} {:<28} {:<18} {:<16} {:<19} {:>7}",
            m.id,
            m.mssv.as_deref().unwrap_or("-"),
            m.name,
            m.specialist.as_deref().unwrap_or("-"),
            m.state,
            format_checkin(m),
            m.lottery_number
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    println!("{} member(s)", members.len());
    Ok(members)
}

/// Print check-in statistics.
pub fn cmd_stats(db: &Path, json: bool) -> Result<Statistics> {
    let members = open_roster(db, CheckinPolicy::default())?.list()?;
    let stats = Statistics::compute(&members);

    if json {
        print_json(&stats)?;
        return Ok(stats);
    }

    println!(
        "Checked in: {}/{} ({}.{}%)",
        stats.arrived,
        stats.total,
        stats.rate_permille / 10,
        stats.rate_permille % 10
    );
    println!();
    println!("By state:");
    for (state, count) in &stats.by_state {
        println!("  {:<18} {:>5}", state, count);
    }
    println!();
    println!("By specialist:");
    for (label, tally) in &stats.by_specialist {
        println!("  {:<24} {:>5}/{:<5}", label, tally.arrived, tally.total);
    }
    Ok(stats)
}

/// Reset every member to "not checked in".
pub fn cmd_reset(db: &Path, json: bool) -> Result<usize> {
    let count = open_roster(db, CheckinPolicy::default())?.reset_all()?;
    info!(count, "members reset");
    if json {
        print_json(&serde_json::json!({ "reset": count }))?;
    } else {
        println!("Reset {count} member(s)");
    }
    Ok(count)
}
