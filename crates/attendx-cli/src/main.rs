use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use attendx_config as config_loader;

use attendx_cli::cli::{Cli, Commands, OutputMode, SetupCommands};
use attendx_cli::commands::{
    build_context, handle_add_admin, handle_add_student, handle_history, handle_mark,
    handle_register, handle_remove, handle_verify, resolve_store_path,
};
use attendx_cli::errors::CliResult;
use attendx_cli::output::{
    render_error, render_history, render_mark, render_register, render_remove, render_setup_ack,
    render_verify,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mode = cli.output_mode();
    init_tracing(cli.verbose, mode);

    match run(cli, mode) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            render_error(&err, mode);
            err.exit_code()
        }
    }
}

fn run(cli: Cli, mode: OutputMode) -> CliResult<()> {
    let loaded = match &cli.config {
        Some(path) => config_loader::load_resolved_from_file(path)?,
        None => config_loader::load_resolved_config()?,
    };
    if let Some(source) = &loaded.source {
        tracing::debug!(target: "cli", config = %source.display(), "loaded configuration");
    }

    let store_path = resolve_store_path(&loaded.resolved, cli.store.as_deref());
    let ctx = build_context(&loaded.resolved, &store_path)?;

    match cli.command {
        Commands::Register(args) => {
            let outcome = handle_register(&ctx, &args.admin, &args.student, &args.sample)?;
            render_register(&outcome, mode)
        }
        Commands::Verify(args) => {
            let outcome = handle_verify(&ctx, &args.student, &args.sample)?;
            render_verify(&outcome, mode)
        }
        Commands::Mark(args) => {
            let outcome = handle_mark(
                &ctx,
                args.admin.as_deref(),
                &args.student,
                &args.sample,
                args.subject.as_deref(),
            )?;
            render_mark(&outcome, mode)
        }
        Commands::Remove(args) => {
            let outcome = handle_remove(&ctx, &args.admin, &args.student)?;
            render_remove(&outcome, mode)
        }
        Commands::History(args) => {
            let records = handle_history(&ctx, &args.student)?;
            render_history(&records, mode)
        }
        Commands::Setup(SetupCommands::AddStudent(args)) => {
            handle_add_student(&ctx, &args.student, &args.tenant)?;
            render_setup_ack("student", &args.student, &args.tenant, mode)
        }
        Commands::Setup(SetupCommands::AddAdmin(args)) => {
            handle_add_admin(&ctx, &args.admin, &args.tenant)?;
            render_setup_ack("admin", &args.admin, &args.tenant, mode)
        }
    }
}

fn init_tracing(verbose: u8, mode: OutputMode) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let writer = fmt::layer().with_writer(std::io::stderr);
    let layer = match mode {
        OutputMode::Human => writer.boxed(),
        OutputMode::Json => writer.without_time().boxed(),
    };

    tracing_subscriber::registry().with(filter).with(layer).init();
}
