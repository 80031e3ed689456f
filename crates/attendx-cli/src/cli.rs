use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "attendx",
    about = "Face-verified attendance admission service",
    version
)]
pub struct Cli {
    /// Emit structured JSON to stdout instead of human-readable output
    #[arg(long)]
    pub json: bool,

    /// Increase verbosity (may be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file (defaults to the system config search path)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Store file path (overrides the configured store_path)
    #[arg(long)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Enroll or replace a student's face embedding (admin only)
    Register(RegisterArgs),
    /// Verify a sample against a student's enrolled embedding
    Verify(VerifyArgs),
    /// Run the full admission pipeline and record attendance
    Mark(MarkArgs),
    /// Remove a student's enrolled embedding (admin only)
    Remove(RemoveArgs),
    /// Show recent attendance records for a student
    History(HistoryArgs),
    /// Administrative store setup
    #[command(subcommand)]
    Setup(SetupCommands),
}

#[derive(Debug, Subcommand)]
pub enum SetupCommands {
    /// Register a student identity under a tenant
    AddStudent(AddStudentArgs),
    /// Register an admin caller for a tenant
    AddAdmin(AddAdminArgs),
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    /// Student identity
    pub student: String,

    /// Capture summary JSON containing the extracted face embedding
    pub sample: PathBuf,

    /// Authenticated admin caller id
    #[arg(long)]
    pub admin: String,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Student identity
    pub student: String,

    /// Capture summary JSON containing the extracted face embedding
    pub sample: PathBuf,
}

#[derive(Debug, Args)]
pub struct MarkArgs {
    /// Student identity
    pub student: String,

    /// Capture summary JSON containing the extracted face embedding
    pub sample: PathBuf,

    /// Optional subject for per-subject attendance
    #[arg(long)]
    pub subject: Option<String>,

    /// Authenticated admin caller id (kiosk mode runs anonymously)
    #[arg(long)]
    pub admin: Option<String>,
}

#[derive(Debug, Args)]
pub struct RemoveArgs {
    /// Student identity
    pub student: String,

    /// Authenticated admin caller id
    #[arg(long)]
    pub admin: String,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Student identity
    pub student: String,
}

#[derive(Debug, Args)]
pub struct AddStudentArgs {
    /// Student identity
    pub student: String,

    /// Owning tenant
    #[arg(long)]
    pub tenant: String,
}

#[derive(Debug, Args)]
pub struct AddAdminArgs {
    /// Admin caller id
    pub admin: String,

    /// Tenant the caller administers
    #[arg(long)]
    pub tenant: String,
}

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

impl From<bool> for OutputMode {
    fn from(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from(self.json)
    }
}
