use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use attendx_config::ResolvedConfig;
use attendx_core::executor::BoundedExecutor;
use attendx_core::matcher::MatchPolicy;
use attendx_core::pipeline::{
    AdmissionPipeline, Caller, DeletionOutcome, MarkOutcome, PipelineConfig, RegistrationOutcome,
    VerificationOutcome,
};
use attendx_core::store::{AttendanceRecord, JsonFileStore};
use attendx_core::window::LectureWindow;

use crate::errors::{CliError, CliResult};
use crate::sample::SummaryFileExtractor;

/// Pipeline plus store handle for the setup commands that sit outside the
/// admission contract.
pub struct AppContext {
    pub pipeline: AdmissionPipeline<JsonFileStore, SummaryFileExtractor>,
    pub store: Arc<JsonFileStore>,
}

pub fn build_context(resolved: &ResolvedConfig, store_path: &Path) -> CliResult<AppContext> {
    let window =
        LectureWindow::from_bounds(resolved.lecture_start_hour, resolved.lecture_end_hour)
            .map_err(CliError::Core)?;

    let config = PipelineConfig {
        matcher: MatchPolicy {
            match_threshold: resolved.match_threshold,
            min_confidence: resolved.min_confidence,
        },
        executor: BoundedExecutor::new(resolved.verify_deadline),
        rate_limit_attempts: resolved.rate_limit_attempts,
        rate_limit_window: resolved.rate_limit_window,
        lecture_window: window,
    };

    debug!(
        target: "cli",
        store = %store_path.display(),
        threshold = resolved.match_threshold,
        "building admission pipeline"
    );

    let store = Arc::new(JsonFileStore::open(store_path));
    let pipeline = AdmissionPipeline::new(Arc::clone(&store), Arc::new(SummaryFileExtractor), config);
    Ok(AppContext { pipeline, store })
}

pub fn caller_from_flag(admin: Option<&str>) -> Caller {
    match admin {
        Some(caller_id) => Caller::Authenticated {
            caller_id: caller_id.to_string(),
        },
        None => Caller::Anonymous,
    }
}

fn read_sample(path: &Path) -> CliResult<Vec<u8>> {
    fs::read(path).map_err(|source| CliError::SampleRead {
        path: path.to_path_buf(),
        source,
    })
}

pub fn handle_register(
    ctx: &AppContext,
    admin: &str,
    student: &str,
    sample: &Path,
) -> CliResult<RegistrationOutcome> {
    let payload = read_sample(sample)?;
    let caller = caller_from_flag(Some(admin));
    Ok(ctx.pipeline.register_face(&caller, student, &payload)?)
}

pub fn handle_verify(
    ctx: &AppContext,
    student: &str,
    sample: &Path,
) -> CliResult<VerificationOutcome> {
    let payload = read_sample(sample)?;
    Ok(ctx.pipeline.verify_face(student, &payload)?)
}

pub fn handle_mark(
    ctx: &AppContext,
    admin: Option<&str>,
    student: &str,
    sample: &Path,
    subject: Option<&str>,
) -> CliResult<MarkOutcome> {
    let payload = read_sample(sample)?;
    let caller = caller_from_flag(admin);
    Ok(ctx
        .pipeline
        .mark_attendance(&caller, student, &payload, subject)?)
}

pub fn handle_remove(ctx: &AppContext, admin: &str, student: &str) -> CliResult<DeletionOutcome> {
    let caller = caller_from_flag(Some(admin));
    Ok(ctx.pipeline.delete_face(&caller, student)?)
}

pub fn handle_history(ctx: &AppContext, student: &str) -> CliResult<Vec<AttendanceRecord>> {
    Ok(ctx.pipeline.attendance_history(student)?)
}

pub fn handle_add_student(ctx: &AppContext, student: &str, tenant: &str) -> CliResult<()> {
    ctx.store
        .add_student(student, tenant)
        .map_err(|err| CliError::Store(err.to_string()))
}

pub fn handle_add_admin(ctx: &AppContext, admin: &str, tenant: &str) -> CliResult<()> {
    ctx.store
        .add_admin(admin, tenant)
        .map_err(|err| CliError::Store(err.to_string()))
}

pub fn resolve_store_path(resolved: &ResolvedConfig, flag: Option<&Path>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .unwrap_or_else(|| resolved.store_path.clone())
}
