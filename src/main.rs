//! fitplan CLI entrypoint.
//!
//! This is the main entrypoint for the fitplan command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use fitplan_sync::backend::RpcClient;
use fitplan_sync::cli::{Cli, Commands, EditCommands, OutputFormatter, StateCommands};
use fitplan_sync::config::{
    find_config_file, ConfigParser, ConfigValidator, SyncConfig, API_KEY_VAR, CONFIG_TEMPLATE,
    DEFAULT_STATE_DIR,
};
use fitplan_sync::error::Result;
use fitplan_sync::model::{load_plan_file, save_plan_file, PlanValidator, SetParams};
use fitplan_sync::planner::compute_changeset;
use fitplan_sync::state::{LocalStateStore, StateStore};
use fitplan_sync::sync::Synchronizer;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let formatter = OutputFormatter::new(cli.output);
    match runtime.block_on(run(cli, &formatter)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", formatter.error(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli, formatter: &OutputFormatter) -> Result<()> {
    let config_path = cli.config.as_ref();

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Diff {
            from: Some(from),
            to: Some(to),
        } => cmd_diff_files(&from, &to, formatter),
        Commands::Diff { .. } => {
            let ws = Workspace::open(config_path, false)?;
            let changeset = ws.synchronizer().changeset().await?;
            println!("{}", formatter.format_changeset(&changeset));
            Ok(())
        }
        Commands::Checkout { plan_id, force } => {
            let ws = Workspace::open(config_path, true)?;
            let session = ws.synchronizer().checkout(&plan_id, force).await?;
            let [weeks, days, sessions, exercises, sets] = session.baseline.entity_counts();
            eprintln!(
                "{}",
                formatter.success(&format!(
                    "Checked out '{}': {weeks} weeks, {days} days, {sessions} sessions, \
                     {exercises} exercises, {sets} sets",
                    session.baseline.title
                ))
            );
            Ok(())
        }
        Commands::Plan => {
            let ws = Workspace::open(config_path, false)?;
            let plan = ws.synchronizer().plan().await?;
            println!("{}", formatter.format_plan(&plan));
            Ok(())
        }
        Commands::Push {
            yes,
            continue_on_error,
            force,
        } => cmd_push(config_path, yes, continue_on_error, force, formatter).await,
        Commands::Status { remote } => {
            let ws = Workspace::open(config_path, remote)?;
            let sync = ws.synchronizer();
            let status = sync.status().await?;
            println!("{}", formatter.format_status(&status));
            if remote {
                let remote_status = sync.check_remote().await?;
                println!("{}", formatter.format_remote(&remote_status));
            }
            Ok(())
        }
        Commands::Discard { yes } => {
            let ws = Workspace::open(config_path, false)?;
            let sync = ws.synchronizer();
            let pending = sync.changeset().await?;
            if pending.is_empty() {
                eprintln!("{}", formatter.success("No edits to discard."));
                return Ok(());
            }
            if !yes
                && !confirm(&format!(
                    "Discard {} additions and {} deletions? [y/N]: ",
                    pending.added_count(),
                    pending.deleted_count()
                ))?
            {
                eprintln!("Discard cancelled.");
                return Ok(());
            }
            sync.discard().await?;
            eprintln!("{}", formatter.success("Edits discarded."));
            Ok(())
        }
        Commands::Import { file } => {
            let ws = Workspace::open(config_path, false)?;
            let plan = load_plan_file(&file)?;
            ws.synchronizer().import(plan).await?;
            eprintln!(
                "{}",
                formatter.success(&format!("Imported {}", file.display()))
            );
            Ok(())
        }
        Commands::Export { file, baseline } => {
            let ws = Workspace::open(config_path, false)?;
            let session = ws.synchronizer().load_session().await?;
            let plan = if baseline {
                &session.baseline
            } else {
                &session.working
            };
            save_plan_file(&file, plan)?;
            eprintln!(
                "{}",
                formatter.success(&format!("Exported to {}", file.display()))
            );
            Ok(())
        }
        Commands::Edit { command } => cmd_edit(config_path, command, formatter).await,
        Commands::State { command } => cmd_state(config_path, command, formatter).await,
    }
}

/// Initialize a new project.
fn cmd_init(path: &Path, force: bool) -> Result<()> {
    info!("Initializing fitplan project in: {}", path.display());

    let config_path = path.join("fitplan.yaml");
    let env_path = path.join(".env.example");
    let gitignore_path = path.join(".gitignore");

    if !force && config_path.exists() {
        eprintln!("Configuration file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    std::fs::write(&config_path, CONFIG_TEMPLATE)?;
    eprintln!("Created: {}", config_path.display());

    std::fs::write(&env_path, format!("{API_KEY_VAR}=\n"))?;
    eprintln!("Created: {}", env_path.display());

    let state_entry = format!("{DEFAULT_STATE_DIR}/");
    if gitignore_path.exists() {
        let existing = std::fs::read_to_string(&gitignore_path)?;
        let missing: Vec<&str> = [".env", state_entry.as_str()]
            .into_iter()
            .filter(|entry| !existing.lines().any(|line| line.trim() == *entry))
            .collect();
        if !missing.is_empty() {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&gitignore_path)?;
            writeln!(file, "\n# fitplan")?;
            for entry in missing {
                writeln!(file, "{entry}")?;
            }
            eprintln!("Updated: {}", gitignore_path.display());
        }
    } else {
        std::fs::write(&gitignore_path, format!(".env\n{state_entry}\n"))?;
        eprintln!("Created: {}", gitignore_path.display());
    }

    eprintln!("\nProject initialized successfully!");
    eprintln!("Next steps:");
    eprintln!("  1. Copy .env.example to .env and set {API_KEY_VAR}");
    eprintln!("  2. Set backend.url in fitplan.yaml");
    eprintln!("  3. Run 'fitplan checkout <plan-id>' to start editing a plan");

    Ok(())
}

/// Compares two snapshot files without touching the session.
fn cmd_diff_files(from: &Path, to: &Path, formatter: &OutputFormatter) -> Result<()> {
    let original = load_plan_file(from)?;
    let current = load_plan_file(to)?;

    let validation = PlanValidator::new().validate_pair(&original, &current)?;
    for warning in &validation.warnings {
        warn!("{warning}");
    }

    let changeset = compute_changeset(&original, &current);
    println!("{}", formatter.format_changeset(&changeset));
    Ok(())
}

/// Push pending changes.
async fn cmd_push(
    config_path: Option<&PathBuf>,
    auto_approve: bool,
    continue_on_error: bool,
    force: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let mut ws = Workspace::open(config_path, true)?;
    if continue_on_error {
        ws.config.sync.continue_on_error = true;
    }
    let sync = ws.synchronizer();

    let plan = sync.plan().await?;
    if plan.is_empty() {
        eprintln!("{}", formatter.success("Nothing to push."));
        return Ok(());
    }

    eprintln!("{}", formatter.format_plan(&plan));

    if !plan.passes_guardrails && !force {
        eprintln!(
            "{}",
            formatter.warning("Guardrails violated. Re-run with --force to push anyway.")
        );
    }

    if !auto_approve && !confirm("Do you want to push these changes? [y/N]: ")? {
        eprintln!("Push cancelled.");
        return Ok(());
    }

    let report = sync.push(force).await?;
    let Some(execution) = report.execution else {
        eprintln!("{}", formatter.success("Nothing to push."));
        return Ok(());
    };

    println!("{}", formatter.format_execution(&execution));
    if !report.refetched && !execution.all_successful() {
        eprintln!(
            "{}",
            formatter.warning("Could not refresh the baseline; run 'fitplan status --remote'.")
        );
    }

    match execution.first_failure() {
        Some(failure) => Err(failure.into()),
        None => Ok(()),
    }
}

/// Working snapshot edits.
async fn cmd_edit(
    config_path: Option<&PathBuf>,
    command: EditCommands,
    formatter: &OutputFormatter,
) -> Result<()> {
    let ws = Workspace::open(config_path, false)?;
    let sync = ws.synchronizer();

    let message = match command {
        EditCommands::AddWeek { number, title } => {
            let id = sync.edit(|e| Ok(e.add_week(number, title))).await?;
            format!("Added week {number} as {id}")
        }
        EditCommands::AddDay {
            week_id,
            number,
            title,
        } => {
            let id = sync.edit(|e| e.add_day(&week_id, number, title)).await?;
            format!("Added day {number} to {week_id} as {id}")
        }
        EditCommands::AddSession { day_id, title } => {
            let id = sync.edit(|e| e.add_session(&day_id, &title)).await?;
            format!("Added session '{title}' to {day_id} as {id}")
        }
        EditCommands::AddExercise {
            session_id,
            exercise_id,
        } => {
            let id = sync
                .edit(|e| e.add_exercise(&session_id, &exercise_id))
                .await?;
            format!("Added exercise {exercise_id} to {session_id} as {id}")
        }
        EditCommands::AddSet {
            exercise_id,
            reps,
            weight,
            rpe,
            rest,
            duration,
        } => {
            let params = SetParams {
                reps,
                weight_kg: weight,
                rpe,
                rest_seconds: rest,
                duration_seconds: duration,
            };
            let id = sync.edit(|e| e.add_set(&exercise_id, params)).await?;
            format!("Added set to {exercise_id} as {id}")
        }
        EditCommands::Remove { level, id } => {
            sync.edit(|e| e.remove(level, &id)).await?;
            format!("Removed {level} {id}")
        }
    };

    eprintln!("{}", formatter.success(&message));
    Ok(())
}

/// State management commands.
async fn cmd_state(
    config_path: Option<&PathBuf>,
    command: StateCommands,
    formatter: &OutputFormatter,
) -> Result<()> {
    let ws = Workspace::open(config_path, false)?;

    match command {
        StateCommands::Show => {
            if let Some(session) = ws.store.load().await? {
                let lock = ws.store.get_lock_info().await?;
                println!("{}", formatter.format_state(&session, lock.as_ref()));
            } else {
                eprintln!("No session found at {}.", ws.store.location());
            }
        }
        StateCommands::Lock { holder } => {
            let holder_str = holder.as_deref().unwrap_or("");
            let lock = ws.store.acquire_lock(holder_str, "manual").await?;
            eprintln!(
                "{}",
                formatter.success(&format!("Session locked: {}", lock.lock_id))
            );
        }
        StateCommands::Unlock { lock_id, force } => {
            if force {
                ws.store.force_unlock().await?;
                eprintln!("{}", formatter.success("Session forcefully unlocked."));
            } else if let Some(id) = lock_id {
                ws.store.release_lock(&id).await?;
                eprintln!("{}", formatter.success("Session unlocked."));
            }
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Loaded configuration with the session store and backend client.
struct Workspace {
    config: SyncConfig,
    store: LocalStateStore,
    client: RpcClient,
}

impl Workspace {
    /// Loads configuration and creates the state store and backend client.
    ///
    /// A missing API key only fails commands that talk to the backend.
    fn open(config_path: Option<&PathBuf>, needs_backend: bool) -> Result<Self> {
        let config_file = resolve_config_path(config_path)?;
        debug!("Loading configuration from: {}", config_file.display());

        let base_dir = config_file
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let parser = ConfigParser::new().with_base_path(&base_dir);
        parser.load_dotenv()?;

        let config = parser.load_with_env(&config_file)?;
        let checks = ConfigValidator::new().validate(&config)?;
        for warning in &checks.warnings {
            warn!("{warning}");
        }

        let api_key = match ConfigParser::get_api_key() {
            Ok(key) => key,
            Err(e) if needs_backend => return Err(e),
            Err(_) => String::new(),
        };
        let client = RpcClient::from_config(&config.backend, &api_key)?;
        let store = LocalStateStore::with_base_dir(base_dir.join(config.state.dir()));

        Ok(Self {
            config,
            store,
            client,
        })
    }

    fn synchronizer(&self) -> Synchronizer<'_, LocalStateStore, RpcClient> {
        Synchronizer::new(&self.store, &self.client)
            .with_options(self.config.sync.clone())
            .with_guardrails(self.config.guardrails.clone())
    }
}

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path.clone()),
        None => find_config_file(std::env::current_dir()?),
    }
}

/// Asks a yes/no question on stderr.
fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt}");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
