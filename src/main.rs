use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use ae_audit_lib::config::{self, PortalConfig};
use ae_audit_lib::db;
use ae_audit_lib::draft::DraftStore;
use ae_audit_lib::pipeline::{DateRange, SqliteAuditSink};
use ae_audit_lib::review::{AuditBatch, BatchStatus};

const DRAFT_FILE_NAME: &str = "draft_batch.json";

#[derive(Parser)]
#[command(name = "ae-audit")]
#[command(about = "Adverse event audit of clinical case notes", version)]
struct Cli {
    /// Database file (defaults to the configured location)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Config file with overrides
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Draft batch file used between scan, mark and finalize
    #[arg(long, global = true)]
    draft: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List facility codes
    Facilities,
    /// Manage the keyword list
    Keywords {
        #[command(subcommand)]
        action: KeywordAction,
    },
    /// Manage the supervisor roster
    Supervisors {
        #[command(subcommand)]
        action: SupervisorAction,
    },
    /// Build a review batch and save it as the draft
    Scan {
        /// Facility code
        #[arg(long)]
        facility: String,
        /// First day to include (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        start: NaiveDate,
        /// First day to exclude (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        end: NaiveDate,
        /// Auditor identifier
        #[arg(long)]
        auditor: String,
        /// Replace a draft with unsaved edits (it is archived, not deleted)
        #[arg(long)]
        discard: bool,
    },
    /// Set review flags on one record of the draft
    Mark {
        /// Record key as printed by `scan`
        key: String,
        #[arg(long)]
        unreported: Option<bool>,
        #[arg(long)]
        noted: Option<bool>,
    },
    /// Persist the draft and export unreported adverse events
    Finalize {
        /// Fail if any row was already persisted
        #[arg(long)]
        strict: bool,
    },
    /// Show persisted audits
    Audits {
        #[arg(long)]
        facility: String,
        #[arg(long, value_parser = parse_date)]
        start: NaiveDate,
        #[arg(long, value_parser = parse_date)]
        end: NaiveDate,
    },
}

#[derive(Subcommand)]
enum KeywordAction {
    List,
    Add { keyword: String },
    Update { id: i64, keyword: String },
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum SupervisorAction {
    List,
    Add {
        employee: String,
        #[arg(long)]
        supervisor: Option<String>,
        #[arg(long)]
        backup: Option<String>,
    },
    Update {
        id: i64,
        employee: String,
        #[arg(long)]
        supervisor: Option<String>,
        #[arg(long)]
        backup: Option<String>,
    },
    Delete { id: i64 },
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| format!("{value}: {e}"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    ae_audit_lib::init_tracing();
    let cli = Cli::parse();

    let portal = match &cli.config {
        Some(path) => PortalConfig::load(path)?,
        None => PortalConfig::load_default()?,
    };
    let db_path = cli.db.clone().unwrap_or_else(|| portal.database_path.clone());
    let drafts = DraftStore::new(
        cli.draft
            .clone()
            .unwrap_or_else(|| config::app_data_dir().join(DRAFT_FILE_NAME)),
    );
    let conn = db::open_database(&db_path)?;

    match cli.command {
        Commands::Facilities => {
            for code in db::list_facilities(&conn)? {
                println!("{code}");
            }
        }
        Commands::Keywords { action } => run_keywords(&conn, action)?,
        Commands::Supervisors { action } => run_supervisors(&conn, action)?,
        Commands::Scan {
            facility,
            start,
            end,
            auditor,
            discard,
        } => {
            let range = DateRange::new(start, end)?;
            let scan = drafts.scan(&conn, &portal, &auditor, &facility, range, discard)?;
            if let Some(previous) = scan.start.replacement.displaced {
                let fate = if scan.start.replacement.archived { "archived" } else { "already finalized" };
                println!("Replaced draft batch {previous} ({fate}).");
            }
            for path in &scan.archived_to {
                println!("Archived batch saved to {}", path.display());
            }
            match scan.start.status {
                BatchStatus::NoNotes => println!("No notes found for {facility} from {range}."),
                BatchStatus::NoMatches { notes_scanned } => {
                    println!("Scanned {notes_scanned} note(s); no keyword matches.")
                }
                BatchStatus::Ready { batch_id, records } => {
                    if let Some(batch) = scan.session.current() {
                        print_batch(batch);
                        println!("Built {}", batch.created_at().format("%Y-%m-%d %H:%M:%S"));
                    }
                    println!(
                        "Batch {batch_id}: {records} record(s) saved to {}",
                        drafts.path().display()
                    );
                }
            }
        }
        Commands::Mark {
            key,
            unreported,
            noted,
        } => {
            let mut session = drafts.resume()?;
            if unreported.is_none() && noted.is_none() {
                session.begin_review()?;
            }
            if let Some(value) = unreported {
                session.set_unreported_ae(&key, value)?;
            }
            if let Some(value) = noted {
                session.set_noted_ae(&key, value)?;
            }
            drafts.save(&mut session)?;
            println!("Updated {key}");
        }
        Commands::Finalize { strict } => {
            let mut session = drafts.resume()?;
            let outcome = session.finalize(&conn, &SqliteAuditSink::new())?;
            drafts.save(&mut session)?;
            let outcome = if strict { outcome.check_duplicates()? } else { outcome };
            println!(
                "Saved {} audit record(s); {} already present.",
                outcome.inserted, outcome.skipped_duplicates
            );

            if let Some(batch) = session.current() {
                let export = batch.export_unreported();
                std::fs::create_dir_all(&portal.export_dir)?;
                let path = portal.export_dir.join(&export.file_name);
                std::fs::write(&path, &export.contents)?;
                println!("Exported {} unreported AE(s) to {}", export.rows, path.display());
            }
        }
        Commands::Audits {
            facility,
            start,
            end,
        } => {
            let range = DateRange::new(start, end)?;
            let audits = db::query_audits(&conn, &facility, range.start(), range.end())?;
            if audits.is_empty() {
                println!("No audits found.");
            }
            for audit in audits {
                let r = &audit.record;
                println!(
                    "#{} {} auditor={} mrn={} agent={} unreported={} noted={} supervisor={}",
                    audit.id,
                    r.audit_date,
                    r.auditor,
                    r.patient_mrn,
                    r.responsible_agent,
                    r.unreported_ae,
                    r.noted_ae,
                    r.supervisor.display_value()
                );
            }
        }
    }

    Ok(())
}

fn run_keywords(conn: &Connection, action: KeywordAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        KeywordAction::List => {
            for keyword in db::list_keywords(conn)? {
                println!("{}\t{}", keyword.id, keyword.keyword);
            }
        }
        KeywordAction::Add { keyword } => {
            let id = db::insert_keyword(conn, &keyword)?;
            println!("Added keyword {id}");
        }
        KeywordAction::Update { id, keyword } => {
            db::update_keyword(conn, id, &keyword)?;
            println!("Updated keyword {id}");
        }
        KeywordAction::Delete { id } => {
            db::delete_keyword(conn, id)?;
            println!("Deleted keyword {id}");
        }
    }
    Ok(())
}

fn run_supervisors(
    conn: &Connection,
    action: SupervisorAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SupervisorAction::List => {
            for entry in db::list_supervisors(conn)? {
                println!(
                    "{}\t{}\t{}\t{}",
                    entry.id,
                    entry.employee_name,
                    entry.supervisor.as_deref().unwrap_or("-"),
                    entry.backup_supervisor.as_deref().unwrap_or("-")
                );
            }
        }
        SupervisorAction::Add {
            employee,
            supervisor,
            backup,
        } => {
            let id = db::insert_supervisor(conn, &employee, supervisor.as_deref(), backup.as_deref())?;
            println!("Added roster entry {id}");
        }
        SupervisorAction::Update {
            id,
            employee,
            supervisor,
            backup,
        } => {
            db::update_supervisor(conn, id, &employee, supervisor.as_deref(), backup.as_deref())?;
            println!("Updated roster entry {id}");
        }
        SupervisorAction::Delete { id } => {
            db::delete_supervisor(conn, id)?;
            println!("Deleted roster entry {id}");
        }
    }
    Ok(())
}

fn print_batch(batch: &AuditBatch) {
    for record in batch.records() {
        println!(
            "{}  {}  mrn={}  agent={}  keywords=[{}]  noted_ae={}",
            record.idempotency_key,
            record.note_date,
            record.patient_mrn,
            record.responsible_agent,
            record.matched_keywords.join(", "),
            record.noted_ae
        );
        println!("    {}", record.note_text);
    }
    for (note_type, count) in batch.note_type_counts() {
        let label = if note_type.is_empty() { "(none)" } else { note_type.as_str() };
        println!("{label}: {count}");
    }
}
