//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::model::Level;

/// fitplan - Edit training plans offline and push the changes.
#[derive(Parser, Debug)]
#[command(name = "fitplan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "FITPLAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter `fitplan.yaml`.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },

    /// Fetch a plan and start editing it.
    Checkout {
        /// Plan identifier.
        plan_id: String,

        /// Replace a session that has unpushed edits.
        #[arg(short, long)]
        force: bool,
    },

    /// Show added and deleted entities.
    ///
    /// Compares the session by default, or two snapshot files.
    Diff {
        /// Original snapshot file.
        #[arg(long, requires = "to")]
        from: Option<PathBuf>,

        /// Current snapshot file.
        #[arg(long, requires = "from")]
        to: Option<PathBuf>,
    },

    /// Show the backend calls a push would make.
    Plan,

    /// Push pending changes to the backend.
    Push {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,

        /// Continue with independent changes after a failure.
        #[arg(long)]
        continue_on_error: bool,

        /// Push even if guardrails are violated.
        #[arg(long)]
        force: bool,
    },

    /// Show the session and its pending changes.
    Status {
        /// Also check whether the plan changed on the backend.
        #[arg(long)]
        remote: bool,
    },

    /// Throw away unpushed edits.
    Discard {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Replace the working snapshot with a JSON or YAML file.
    Import {
        /// Snapshot file.
        file: PathBuf,
    },

    /// Write the working snapshot to a JSON or YAML file.
    Export {
        /// Destination file.
        file: PathBuf,

        /// Export the baseline instead of the working snapshot.
        #[arg(long)]
        baseline: bool,
    },

    /// Edit the working snapshot.
    Edit {
        /// Edit subcommand.
        #[command(subcommand)]
        command: EditCommands,
    },

    /// Manage the session state.
    State {
        /// State subcommand.
        #[command(subcommand)]
        command: StateCommands,
    },
}

/// Working snapshot edits.
#[derive(Subcommand, Debug)]
pub enum EditCommands {
    /// Add a week to the plan.
    AddWeek {
        /// Week number.
        number: u32,

        /// Optional title.
        #[arg(long)]
        title: Option<String>,
    },

    /// Add a day to a week.
    AddDay {
        /// Parent week id.
        week_id: String,

        /// Day number within the week.
        number: u32,

        /// Optional title.
        #[arg(long)]
        title: Option<String>,
    },

    /// Add a session to a day.
    AddSession {
        /// Parent day id.
        day_id: String,

        /// Session title.
        title: String,
    },

    /// Add a library exercise to a session.
    AddExercise {
        /// Parent session id.
        session_id: String,

        /// Exercise-library id.
        exercise_id: String,
    },

    /// Add a set to an exercise.
    AddSet {
        /// Parent plan-exercise id.
        exercise_id: String,

        /// Target repetitions.
        #[arg(long)]
        reps: Option<u32>,

        /// Target load in kilograms.
        #[arg(long)]
        weight: Option<f64>,

        /// Target RPE.
        #[arg(long)]
        rpe: Option<f32>,

        /// Rest after the set, in seconds.
        #[arg(long)]
        rest: Option<u32>,

        /// Duration of a timed set, in seconds.
        #[arg(long)]
        duration: Option<u32>,
    },

    /// Remove an entity and everything under it.
    Remove {
        /// Hierarchy level.
        #[arg(value_enum)]
        level: Level,

        /// Entity id.
        id: String,
    },
}

/// State management subcommands.
#[derive(Subcommand, Debug)]
pub enum StateCommands {
    /// Show the session state.
    Show,

    /// Lock the session.
    Lock {
        /// Lock holder identifier.
        #[arg(long)]
        holder: Option<String>,
    },

    /// Unlock the session.
    Unlock {
        /// Lock ID to unlock.
        #[arg(long, required_unless_present = "force")]
        lock_id: Option<String>,

        /// Remove the lock whoever holds it.
        #[arg(long)]
        force: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
