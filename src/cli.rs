//! Command-line interface for uncaught.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{Config, CONFIG_DIR};
use crate::detect::{self, FrameworkConfig};
use crate::errors::ResolveError;
use crate::extract::ScanOptions;
use crate::model::ResolutionMode;
use crate::query::{self, StubModuleInfo, StubsListResult};
use crate::report;
use crate::session::AnalysisSession;
use crate::stubs;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_USAGE: i32 = 1;
pub const EXIT_RESOLUTION: i32 = 2;
pub const EXIT_AUDIT_FAILED: i32 = 3;

/// Static exception-flow analyzer for Python codebases.
///
/// Scans a directory of Python source and answers which exception types
/// can propagate out of each externally reachable entrypoint unhandled,
/// plus point queries: where an exception is raised or caught, who calls
/// a function, and what escapes from it.
#[derive(Parser)]
#[command(name = "uncaught")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory to analyze
    #[arg(short = 'd', long, global = true, default_value = ".")]
    pub directory: PathBuf,

    /// Output format: text or json
    #[arg(short = 'f', long, global = true, default_value = "text")]
    pub format: String,

    /// Skip the extraction cache
    #[arg(long, global = true)]
    pub no_cache: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find raise sites for an exception type
    Raises {
        exception: String,
        /// Include subclasses of the exception
        #[arg(short = 's', long)]
        subclasses: bool,
    },
    /// Find catch sites that would handle an exception type
    Catches {
        exception: String,
        /// Include subclasses of the exception
        #[arg(short = 's', long)]
        subclasses: bool,
    },
    /// Find callers of a function
    Callers {
        function: String,
        /// Walk transitively: everything that can reach the function
        #[arg(short = 'r', long)]
        transitive: bool,
        /// Only resolved call edges, no name fallback
        #[arg(long)]
        strict: bool,
    },
    /// Find exceptions that can escape a function
    Escapes {
        function: String,
        /// Only resolved call edges, no heuristics
        #[arg(long)]
        strict: bool,
        /// Widest resolution (currently equivalent to default)
        #[arg(long)]
        aggressive: bool,
    },
    /// Trace the call tree from a function with its exception flow
    Trace {
        function: String,
        /// Include callees with nothing escaping
        #[arg(long)]
        all: bool,
        /// Maximum tree depth
        #[arg(long, default_value_t = 10)]
        depth: usize,
    },
    /// List exception classes defined in the codebase
    Exceptions,
    /// List subclasses of a class
    Subclasses { class: String },
    /// Show codebase statistics
    Stats,
    /// Flask integration commands
    Flask(IntegrationArgs),
    /// FastAPI integration commands
    Fastapi(IntegrationArgs),
    /// Django integration commands
    Django(IntegrationArgs),
    /// CLI-script integration commands
    Cli(IntegrationArgs),
    /// Manage exception stubs
    Stubs {
        #[command(subcommand)]
        command: StubsCommand,
    },
}

#[derive(Args)]
pub struct IntegrationArgs {
    #[command(subcommand)]
    pub command: IntegrationCommand,
}

#[derive(Subcommand)]
pub enum IntegrationCommand {
    /// Audit every entrypoint for uncaught exceptions
    Audit,
    /// List detected entrypoints
    Entrypoints,
    /// Find entrypoints that can surface an exception
    RoutesTo {
        exception: String,
        /// Include subclasses of the exception
        #[arg(short = 's', long)]
        subclasses: bool,
    },
}

#[derive(Subcommand)]
pub enum StubsCommand {
    /// List registered stubs (builtin and user)
    List,
    /// Write a stub template into the project config directory
    Init,
    /// Validate user stub files
    Validate,
}

#[derive(Clone, Copy, PartialEq)]
enum OutputFormat {
    Text,
    Json,
}

pub fn run(cli: Cli) -> anyhow::Result<i32> {
    let format = match cli.format.as_str() {
        "text" => OutputFormat::Text,
        "json" => OutputFormat::Json,
        other => {
            eprintln!("Error: invalid format {:?}, must be 'text' or 'json'", other);
            return Ok(EXIT_USAGE);
        }
    };

    // Stub management needs no model.
    if let Commands::Stubs { command } = &cli.command {
        return run_stubs(command, &cli.directory, format);
    }

    let config = match Config::load(&cli.directory) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_USAGE);
        }
    };

    let session = match open_session(&cli, config, format) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_USAGE);
        }
    };
    report_diagnostics(&session, format);

    let code = dispatch(&cli, &session, format)?;
    Ok(code)
}

fn open_session(cli: &Cli, config: Config, format: OutputFormat) -> anyhow::Result<AnalysisSession> {
    let mut scan = ScanOptions {
        use_cache: !cli.no_cache,
        ..Default::default()
    };

    let bar = (format == OutputFormat::Text).then(|| {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} files")
                .unwrap()
                .progress_chars("#>-"),
        );
        bar
    });
    if let Some(bar) = &bar {
        let bar = bar.clone();
        scan.progress = Some(Arc::new(move |done, total| {
            if bar.length() != Some(total as u64) {
                bar.set_length(total as u64);
            }
            bar.set_position(done as u64);
        }));
    }

    let session = AnalysisSession::open(&cli.directory, config, &scan);
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    session
}

fn report_diagnostics(session: &AnalysisSession, format: OutputFormat) {
    if format != OutputFormat::Text {
        return;
    }
    for error in &session.stub_errors {
        eprintln!("{} {}", "warning:".yellow(), error);
    }
    if !session.model.diagnostics.is_empty() {
        eprintln!(
            "{} {} file(s) with extraction problems",
            "warning:".yellow(),
            session.model.diagnostics.len()
        );
    }
}

fn warn_convergence(session: &AnalysisSession, mode: ResolutionMode) {
    let propagation = session.propagation(mode);
    if !propagation.converged {
        eprintln!(
            "{} propagation did not converge within {} iterations; results are the best reached fixpoint",
            "warning:".yellow(),
            crate::propagate::MAX_ITERATIONS
        );
    }
}

fn dispatch(cli: &Cli, session: &AnalysisSession, format: OutputFormat) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Raises { exception, subclasses } => {
            let result = query::find_raises(&session.model, exception, *subclasses);
            match format {
                OutputFormat::Json => report::print_json(&result)?,
                OutputFormat::Text => report::print_raises(&result),
            }
            Ok(EXIT_SUCCESS)
        }
        Commands::Catches { exception, subclasses } => {
            let result = query::find_catches(&session.model, exception, *subclasses);
            match format {
                OutputFormat::Json => report::print_json(&result)?,
                OutputFormat::Text => report::print_catches(&result),
            }
            Ok(EXIT_SUCCESS)
        }
        Commands::Callers {
            function,
            transitive,
            strict,
        } => {
            let mode = if *strict {
                ResolutionMode::Strict
            } else {
                session.config.resolution_mode
            };
            match query::find_callers(session, function, mode, *transitive) {
                Ok(result) => {
                    match format {
                        OutputFormat::Json => report::print_json(&result)?,
                        OutputFormat::Text => report::print_callers(&result),
                    }
                    Ok(EXIT_SUCCESS)
                }
                Err(e) => Ok(resolution_failure(&e)),
            }
        }
        Commands::Escapes {
            function,
            strict,
            aggressive,
        } => {
            let mode = match (strict, aggressive) {
                (true, true) => {
                    eprintln!("Error: cannot use both --strict and --aggressive");
                    return Ok(EXIT_USAGE);
                }
                (true, false) => ResolutionMode::Strict,
                (false, true) => ResolutionMode::Aggressive,
                (false, false) => session.config.resolution_mode,
            };
            match query::find_escapes(session, function, mode) {
                Ok(result) => {
                    warn_convergence(session, mode);
                    match format {
                        OutputFormat::Json => report::print_json(&result)?,
                        OutputFormat::Text => report::print_escapes(&result),
                    }
                    Ok(EXIT_SUCCESS)
                }
                Err(e) => Ok(resolution_failure(&e)),
            }
        }
        Commands::Trace { function, all, depth } => {
            match query::trace_function(session, function, *depth, *all) {
                Ok(result) => {
                    match format {
                        OutputFormat::Json => report::print_json(&result)?,
                        OutputFormat::Text => report::print_trace(&result),
                    }
                    Ok(EXIT_SUCCESS)
                }
                Err(e) => Ok(resolution_failure(&e)),
            }
        }
        Commands::Exceptions => {
            let result = query::find_exceptions(&session.model);
            match format {
                OutputFormat::Json => report::print_json(&result)?,
                OutputFormat::Text => report::print_exceptions(&result),
            }
            Ok(EXIT_SUCCESS)
        }
        Commands::Subclasses { class } => {
            let result = query::find_subclasses(&session.model, class);
            match format {
                OutputFormat::Json => report::print_json(&result)?,
                OutputFormat::Text => report::print_subclasses(&result),
            }
            Ok(EXIT_SUCCESS)
        }
        Commands::Stats => {
            let cache_stats = (!cli.no_cache).then(|| {
                crate::cache::FileCache::open(&cli.directory.join(CONFIG_DIR)).stats()
            });
            let result = query::get_stats(&session.model, cache_stats);
            match format {
                OutputFormat::Json => report::print_json(&result)?,
                OutputFormat::Text => report::print_stats(&result),
            }
            Ok(EXIT_SUCCESS)
        }
        Commands::Flask(args) => run_integration(session, "flask", args, format),
        Commands::Fastapi(args) => run_integration(session, "fastapi", args, format),
        Commands::Django(args) => run_integration(session, "django", args, format),
        Commands::Cli(args) => run_integration(session, "cli", args, format),
        Commands::Stubs { .. } => unreachable!("handled before session setup"),
    }
}

fn integration_config(name: &str) -> FrameworkConfig {
    detect::get_framework_config(name).unwrap_or(FrameworkConfig {
        name: name.to_string(),
        ..Default::default()
    })
}

fn run_integration(
    session: &AnalysisSession,
    framework: &str,
    args: &IntegrationArgs,
    format: OutputFormat,
) -> anyhow::Result<i32> {
    let config = integration_config(framework);
    match &args.command {
        IntegrationCommand::Audit => {
            let result = query::audit_entrypoints(session, &config);
            warn_convergence(session, session.config.resolution_mode);
            match format {
                OutputFormat::Json => report::print_json(&result)?,
                OutputFormat::Text => report::print_audit(&result),
            }
            if result.has_uncaught() {
                Ok(EXIT_AUDIT_FAILED)
            } else {
                Ok(EXIT_SUCCESS)
            }
        }
        IntegrationCommand::Entrypoints => {
            let result = query::list_entrypoints(&session.model, Some(framework));
            match format {
                OutputFormat::Json => report::print_json(&result)?,
                OutputFormat::Text => report::print_entrypoints(&result),
            }
            Ok(EXIT_SUCCESS)
        }
        IntegrationCommand::RoutesTo { exception, subclasses } => {
            let result = query::routes_to_exception(session, &config, exception, *subclasses);
            match format {
                OutputFormat::Json => report::print_json(&result)?,
                OutputFormat::Text => report::print_routes_to(&result),
            }
            Ok(EXIT_SUCCESS)
        }
    }
}

fn resolution_failure(error: &ResolveError) -> i32 {
    match error {
        ResolveError::FunctionNotFound { name, suggestions } => {
            eprintln!("Error: function not found: {}", name.bold());
            if !suggestions.is_empty() {
                eprintln!("Did you mean: {}?", suggestions.join(", "));
            }
        }
        ResolveError::AmbiguousFunction { name, matches } => {
            eprintln!("Error: ambiguous function name: {}", name.bold());
            eprintln!("Matches:");
            for key in matches {
                eprintln!("  {}", key);
            }
            eprintln!("Disambiguate with a full key or class-qualified name.");
        }
    }
    EXIT_RESOLUTION
}

fn run_stubs(command: &StubsCommand, directory: &Path, format: OutputFormat) -> anyhow::Result<i32> {
    let config_dir = directory.join(CONFIG_DIR);
    match command {
        StubsCommand::List => {
            let (library, errors) = stubs::load_stubs(&config_dir);
            for error in &errors {
                eprintln!("{} {}", "warning:".yellow(), error);
            }
            let result = StubsListResult {
                modules: library
                    .modules()
                    .map(|(module, functions)| StubModuleInfo {
                        module: module.clone(),
                        functions: functions.clone(),
                    })
                    .collect(),
            };
            match format {
                OutputFormat::Json => report::print_json(&result)?,
                OutputFormat::Text => report::print_stubs_list(&result),
            }
            Ok(EXIT_SUCCESS)
        }
        StubsCommand::Init => {
            let stubs_dir = config_dir.join("stubs");
            std::fs::create_dir_all(&stubs_dir)?;
            let target = stubs_dir.join("example.yaml");
            if target.exists() {
                eprintln!("Error: {} already exists", target.display());
                return Ok(EXIT_USAGE);
            }
            std::fs::write(&target, stubs::STUB_TEMPLATE)?;
            println!("Created {}", target.display());
            println!("Edit it to describe your external library, then rerun the analysis.");
            Ok(EXIT_SUCCESS)
        }
        StubsCommand::Validate => {
            let files = stubs::stub_files_in(&config_dir);
            if files.is_empty() {
                println!("No user stub files under {}", config_dir.join("stubs").display());
                return Ok(EXIT_SUCCESS);
            }
            let mut failed = false;
            for path in files {
                let errors = stubs::validate_stub_file(&path);
                if errors.is_empty() {
                    println!("{} {}", "ok".green(), path.display());
                } else {
                    failed = true;
                    println!("{} {}", "invalid".red(), path.display());
                    for error in errors {
                        println!("    {}", error);
                    }
                }
            }
            Ok(if failed { EXIT_USAGE } else { EXIT_SUCCESS })
        }
    }
}
