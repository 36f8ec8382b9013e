mod cli;
mod commands;
mod engine;
mod paths;
mod progress;
mod resource;
mod schema;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use declarative::CancelToken;
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// `--config` override
    pub config: Option<PathBuf>,
    /// `--state` override
    pub state: Option<PathBuf>,
    /// Tripped by Ctrl-C; in-flight operations stop and report as interrupted
    pub cancel: CancelToken,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
        state: cli.state,
        cancel: CancelToken::new(),
    };
    install_interrupt_handler(&ctx.cancel);

    match cli.command {
        Command::Plan(args) => commands::declarative::plan(&ctx, args.target.as_deref()),
        Command::Apply(args) => commands::declarative::apply(&ctx, &args),
        Command::Destroy(args) => commands::declarative::destroy(&ctx, &args),
        Command::Refresh(args) => commands::declarative::refresh(&ctx, &args),
        Command::Import(args) => commands::declarative::import(&ctx, &args),
        Command::State(cmd) => commands::state::run(&ctx, cmd),
        Command::Kinds => commands::kinds::run(),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "beacon", &mut io::stdout());
            Ok(())
        }
    }
}

/// First Ctrl-C cancels the shared token so the run can record what finished;
/// a second one exits immediately.
fn install_interrupt_handler(cancel: &CancelToken) {
    let cancel = cancel.clone();
    let result = ctrlc::set_handler(move || {
        if cancel.is_cancelled() {
            std::process::exit(130);
        }
        log::warn!("Interrupted; waiting for in-flight requests (Ctrl-C again to quit)");
        cancel.cancel();
    });
    if let Err(e) = result {
        log::debug!("Could not install Ctrl-C handler: {e}");
    }
}
