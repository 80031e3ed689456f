use std::io::{self, Write};

use serde_json::json;

use attendx_core::errors::AppError;
use attendx_core::pipeline::{
    DeletionOutcome, MarkOutcome, RegistrationOutcome, VerificationOutcome,
};
use attendx_core::response::ApiResponse;
use attendx_core::store::AttendanceRecord;

use crate::cli::OutputMode;
use crate::errors::{CliError, CliResult};

fn emit_json(value: &impl serde::Serialize) -> CliResult<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let payload = serde_json::to_string(value).map_err(AppError::from)?;
    handle.write_all(payload.as_bytes())?;
    handle.write_all(b"\n")?;
    Ok(())
}

pub fn render_register(outcome: &RegistrationOutcome, mode: OutputMode) -> CliResult<()> {
    match mode {
        OutputMode::Human => {
            let action = if outcome.replaced {
                "replaced"
            } else {
                "enrolled"
            };
            println!(
                "Embedding {} for student {} ({} values)",
                action, outcome.student, outcome.embedding_len
            );
        }
        OutputMode::Json => emit_json(outcome)?,
    }
    Ok(())
}

pub fn render_verify(outcome: &VerificationOutcome, mode: OutputMode) -> CliResult<()> {
    match mode {
        OutputMode::Human => {
            if outcome.matched {
                println!("Match (confidence {:.2})", outcome.confidence);
            } else {
                println!("No match: {:?} (confidence {:.2})", outcome.reason, outcome.confidence);
            }
        }
        OutputMode::Json => emit_json(outcome)?,
    }
    Ok(())
}

pub fn render_mark(outcome: &MarkOutcome, mode: OutputMode) -> CliResult<()> {
    match mode {
        OutputMode::Human => {
            println!(
                "Attendance marked for {} on {} (confidence {:.2})",
                outcome.record.student, outcome.record.date, outcome.confidence
            );
            if let Some(subject) = &outcome.record.subject {
                println!("Subject: {subject}");
            }
        }
        OutputMode::Json => emit_json(&ApiResponse::marked(outcome.confidence))?,
    }
    Ok(())
}

pub fn render_remove(outcome: &DeletionOutcome, mode: OutputMode) -> CliResult<()> {
    match mode {
        OutputMode::Human => println!("Embedding removed for student {}", outcome.student),
        OutputMode::Json => emit_json(outcome)?,
    }
    Ok(())
}

pub fn render_history(records: &[AttendanceRecord], mode: OutputMode) -> CliResult<()> {
    match mode {
        OutputMode::Human => {
            if records.is_empty() {
                println!("No attendance records");
            }
            for record in records {
                let subject = record.subject.as_deref().unwrap_or("-");
                println!(
                    "{}  {}  {}  confidence {:.2}",
                    record.date, record.student, subject, record.confidence
                );
            }
        }
        OutputMode::Json => emit_json(&records)?,
    }
    Ok(())
}

pub fn render_setup_ack(what: &str, id: &str, tenant: &str, mode: OutputMode) -> CliResult<()> {
    match mode {
        OutputMode::Human => println!("Added {what} {id} under tenant {tenant}"),
        OutputMode::Json => emit_json(&json!({ "kind": what, "id": id, "tenant": tenant }))?,
    }
    Ok(())
}

pub fn render_error(err: &CliError, mode: OutputMode) {
    match mode {
        OutputMode::Human => eprintln!("Error: {err}"),
        OutputMode::Json => {
            let payload = match err {
                CliError::Core(core) => {
                    serde_json::to_string(&ApiResponse::failure(core)).unwrap_or_default()
                }
                other => json!({
                    "success": false,
                    "error_code": "CLI_ERROR",
                    "message": other.to_string(),
                })
                .to_string(),
            };
            eprintln!("{payload}");
        }
    }
}
