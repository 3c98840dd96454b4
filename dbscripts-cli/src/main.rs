//! CLI entry point for the dbscripts tool.
//! Provides clap-based command routing and exit code mapping
//! based on error type.

mod output;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;

use dbscripts_core::config::{parse_checkpoints, parse_module_spec, CliOverrides, DbScriptsConfig};
use dbscripts_core::error::ScriptError;
use dbscripts_core::{DbScripts, Version};

/// Top-level CLI definition with global flags and subcommand dispatch.
#[derive(Parser)]
#[command(
    name = "dbscripts",
    about = "Reorder, consolidate and audit versioned SQL scripts",
    version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_HASH"), " ", env!("BUILD_TIME"), ")"
    ),
    propagate_version = true
)]
struct Cli {
    /// Config file path
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<String>,

    /// SQL dialect: postgres, sqlserver (overrides config)
    #[arg(long, value_name = "DIALECT", global = true)]
    dialect: Option<String>,

    /// Version control backend for deletes: git, none (overrides config)
    #[arg(long, value_name = "VCS", global = true)]
    vcs: Option<String>,

    /// Module directory as NAME=DIR, repeatable (replaces configured modules)
    #[arg(long = "module", value_name = "NAME=DIR", global = true)]
    modules: Vec<String>,

    /// Unreachable-script checkpoints, comma-separated (overrides config)
    #[arg(long, value_name = "VERSIONS", global = true)]
    checkpoints: Option<String>,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable verbose/debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// All available dbscripts subcommands.
#[derive(Subcommand)]
enum Commands {
    /// List scripts per module and schema
    List,

    /// Reorder a script's statements by table
    Reorder {
        /// Script to reorder
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Schema for unqualified tables (default: from the filename)
        #[arg(long, value_name = "SCHEMA")]
        schema: Option<String>,

        /// Render as an HTML table
        #[arg(long, conflicts_with = "write")]
        html: bool,

        /// Write the reordered script back to the file
        #[arg(long)]
        write: bool,
    },

    /// Reorder every script and report the ones that change
    ReorderAll {
        /// Rewrite the scripts that change
        #[arg(long)]
        write: bool,
    },

    /// Find or consolidate chains of scripts in a version range
    Consolidate {
        /// Start of the version range
        #[arg(long, value_name = "VERSION")]
        from: String,

        /// End of the version range
        #[arg(long, value_name = "VERSION")]
        to: String,

        /// Consolidate this schema only
        #[arg(long, value_name = "SCHEMA")]
        schema: Option<String>,

        /// Write the consolidated script and delete the originals
        #[arg(long, requires = "schema")]
        write: bool,
    },

    /// Find scripts superseded by another script with the same start version
    Orphans,

    /// Find scripts no upgrade from a checkpoint will run
    Unreachable {
        /// Target version of the upgrade
        #[arg(long, value_name = "VERSION")]
        to: String,
    },

    /// Run the dialect checks over every script
    Check {
        /// Exit with an error if any script has warnings
        #[arg(long)]
        strict: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // Set up logging (suppress when JSON output is requested)
    let filter = if cli.json {
        "error"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    env_logger::Builder::new()
        .parse_env(env_logger::Env::default().default_filter_or(filter))
        .format_target(false)
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli) {
        print_error(&e);
        process::exit(exit_code(&e));
    }
}

/// Map error types to differentiated exit codes.
fn exit_code(error: &ScriptError) -> i32 {
    match error {
        ScriptError::ConfigError(_) => 2,
        ScriptError::ValidationFailed { .. } => 3,
        ScriptError::ScriptNameError(_) | ScriptError::InvalidVersion(_) => 4,
        ScriptError::SchemaNotFound { .. } => 5,
        ScriptError::NothingToConsolidate { .. } => 6,
        ScriptError::VcsError(_) => 7,
        _ => 1,
    }
}

/// Build configuration and dispatch the chosen subcommand.
fn run(cli: Cli) -> Result<(), ScriptError> {
    let json_output = cli.json;

    let modules = if cli.modules.is_empty() {
        None
    } else {
        Some(
            cli.modules
                .iter()
                .map(|m| parse_module_spec(m))
                .collect::<Result<Vec<_>, _>>()?,
        )
    };

    let overrides = CliOverrides {
        dialect: cli.dialect,
        vcs: cli.vcs,
        checkpoints: cli.checkpoints.as_deref().map(parse_checkpoints).transpose()?,
        modules,
    };

    let config = DbScriptsConfig::load(cli.config.as_deref(), &overrides)?;
    log::debug!(
        "Configuration loaded; dialect={}, vcs={}, modules={}",
        config.scripts.dialect,
        config.scripts.vcs,
        config.modules.len()
    );
    let tools = DbScripts::new(config);

    match cli.command {
        Commands::List => {
            let report = tools.list()?;
            if json_output {
                print_json(&report);
            } else {
                output::print_list_report(&report);
            }
        }
        Commands::Reorder {
            file,
            schema,
            html,
            write,
        } => {
            let report = tools.reorder(&file, schema.as_deref(), html, write)?;
            if json_output {
                print_json(&report);
            } else {
                output::print_reorder_report(&report, write);
            }
        }
        Commands::ReorderAll { write } => {
            let report = tools.reorder_all(write)?;
            if json_output {
                print_json(&report);
            } else {
                output::print_reorder_all_report(&report, write);
            }
        }
        Commands::Consolidate {
            from,
            to,
            schema,
            write,
        } => {
            let from = Version::parse(&from)?;
            let to = Version::parse(&to)?;
            match schema {
                Some(schema) => {
                    let report = tools.consolidate(&schema, from, to, write)?;
                    if json_output {
                        print_json(&report);
                    } else {
                        output::print_consolidate_schema_report(&report);
                    }
                }
                None => {
                    let report = tools.consolidation_candidates(from, to)?;
                    if json_output {
                        print_json(&report);
                    } else {
                        output::print_consolidate_report(&report);
                    }
                }
            }
        }
        Commands::Orphans => {
            let report = tools.orphans()?;
            if json_output {
                print_json(&report);
            } else {
                output::print_orphans_report(&report);
            }
        }
        Commands::Unreachable { to } => {
            let report = tools.unreachable(Version::parse(&to)?)?;
            if json_output {
                print_json(&report);
            } else {
                output::print_unreachable_report(&report);
            }
        }
        Commands::Check { strict } => {
            // Print the report first so strict mode still shows what failed.
            let report = tools.check(false)?;
            if json_output {
                print_json(&report);
            } else {
                output::print_check_report(&report);
            }
            if strict && report.files_with_warnings > 0 {
                return Err(ScriptError::ValidationFailed {
                    count: report.files_with_warnings,
                    details: format!("{} warning(s)", report.issues.len()),
                });
            }
        }
    }

    Ok(())
}

/// Print a report as pretty JSON on stdout.
fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("Failed to serialize report; error={}", e),
    }
}

/// Print a formatted error message with actionable hints to stderr.
fn print_error(error: &ScriptError) {
    eprintln!("{} {}", "ERROR:".red().bold(), error);

    match error {
        ScriptError::ConfigError(_) => {
            eprintln!(
                "{}",
                "Hint: Check your dbscripts.toml or the DBSCRIPTS_* environment variables."
                    .dimmed()
            );
        }
        ScriptError::ScriptNameError(_) => {
            eprintln!(
                "{}",
                "Hint: Script files are named <schema>-<from>-<to>.sql, e.g. core-1.00-1.01.sql."
                    .dimmed()
            );
        }
        ScriptError::SchemaNotFound { .. } => {
            eprintln!(
                "{}",
                "Hint: Run 'dbscripts list' to see the schemas of every module.".dimmed()
            );
        }
        ScriptError::NothingToConsolidate { .. } => {
            eprintln!(
                "{}",
                "Hint: Run 'dbscripts consolidate --from <V> --to <V>' without --schema to see which schemas have scripts in range."
                    .dimmed()
            );
        }
        ScriptError::VcsError(_) => {
            eprintln!(
                "{}",
                "Hint: Use --vcs none to delete files without version control.".dimmed()
            );
        }
        ScriptError::ValidationFailed { .. } => {
            eprintln!(
                "{}",
                "Hint: Run 'dbscripts check' to list the warnings for each script.".dimmed()
            );
        }
        _ => {}
    }
}
