//! Orgi CLI - keep an org-mode issue log in sync with TODO comments.

use clap::Parser;
use orgi::cli::{Cli, Commands, ConfigCommands};
use orgi::commands::{self, Output, PromptConfirm};
use orgi::config::{ConfigOverrides, OutputFormat, ResolvedConfig, resolve_config};
use orgi::logging;
use orgi::sync::{AlwaysAccept, SyncAction};
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let mut overrides = ConfigOverrides::new();
    if let Some(file) = cli.file {
        overrides = overrides.with_org_file(file);
    }
    if cli.human_readable {
        overrides = overrides.with_output_format(OutputFormat::Human);
    }

    // A broken config file still reports its error in the requested format
    let config = resolve_config(&cwd, &overrides);
    let human = match &config {
        Ok(config) => config.output_format() == OutputFormat::Human,
        Err(_) => cli.human_readable,
    };

    let result = config.and_then(|config| run_command(cli.command, &cwd, &config, human));

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            if human {
                eprintln!("Error: {}", e);
            } else {
                eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
            }
            process::exit(1);
        }
    }
}

/// Run one command. `Ok(false)` means the command ran but reported a failing check.
fn run_command(
    command: Commands,
    cwd: &Path,
    config: &ResolvedConfig,
    human: bool,
) -> Result<bool, orgi::Error> {
    let doc = config.org_file();

    match command {
        Commands::Init => {
            let result = commands::init(cwd, doc)?;
            output(&result, human);
        }

        Commands::Add {
            title,
            priority,
            tags,
            description,
        } => {
            let result = commands::add(
                doc,
                &title,
                priority.as_deref(),
                &tags,
                description.as_deref(),
            )?;
            output(&result, human);
        }

        Commands::List { state, tag } => {
            let result = commands::list(doc, state.as_deref(), tag.as_deref())?;
            output(&result, human);
        }

        Commands::Show { id } => {
            let result = commands::show(doc, &id)?;
            output(&result, human);
        }

        Commands::State { id, state } => {
            let result = commands::change_state(doc, &id, &state)?;
            output(&result, human);
        }

        Commands::Gather { dir, dry_run } => {
            let synchronizer = commands::synchronizer(config, cwd);
            let result = commands::gather(&synchronizer, &dir, doc, dry_run)?;
            output(&result, human);
        }

        Commands::Sync { yes, comment_out } => {
            let synchronizer = commands::synchronizer(config, cwd);
            let action = if comment_out {
                SyncAction::CommentOut
            } else {
                SyncAction::Remove
            };
            let result = if yes {
                commands::sync(&synchronizer, doc, true, &mut AlwaysAccept, action)?
            } else {
                let stdin = io::stdin();
                let mut prompt = PromptConfirm::new(stdin.lock(), io::stderr());
                commands::sync(&synchronizer, doc, false, &mut prompt, action)?
            };
            output(&result, human);
        }

        Commands::Validate { dir, ignore_closed } => {
            let synchronizer = commands::synchronizer(config, cwd).ignore_closed(ignore_closed);
            let result = commands::validate(&synchronizer, &dir, doc)?;
            output(&result, human);
            return Ok(result.is_valid);
        }

        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                output(&commands::config_show(config), human);
            }
        },
    }

    Ok(true)
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
