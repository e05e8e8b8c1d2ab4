//! grantctl - offline planner for grant editing sessions
//!
//! Run with: cargo run --features cli --bin grantctl -- <command>
//!
//! Commands:
//!   diff  --snapshot S --working W      - Report whether a working set differs from a snapshot
//!   plan  --snapshot S --edits E        - Replay an edit script, print change-set and payload
//!
//! Snapshots are `PolicySnapshot` JSON, working sets are arrays of subjects,
//! edit scripts are arrays of `Edit` values (`{"op": "add", ...}`).

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use grant_reconcile::{
    has_changed, submission, Edit, EngineConfig, ObjectRef, PolicySnapshot, PolicyState, Subject, Workflow,
};

// ============================================================================
// Arguments
// ============================================================================

#[derive(Parser)]
#[command(name = "grantctl", version, about = "Plan access-grant changes against a snapshot")]
struct Cli {
    /// Log engine decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine config (TOML); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print whether a working set differs from a snapshot's direct grants
    Diff {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        working: PathBuf,
    },
    /// Replay an edit script against a snapshot and print what a submit would send
    Plan {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        edits: PathBuf,
        #[arg(long, value_enum, default_value_t = WorkflowArg::Manage)]
        workflow: WorkflowArg,
        #[arg(long, default_value = "object")]
        object_id: String,
        #[arg(long, default_value = "table")]
        object_type: String,
        /// Acting user
        #[arg(long)]
        user: Option<String>,
        /// Reason attached to an authorization request
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum WorkflowArg {
    Manage,
    Request,
}

impl From<WorkflowArg> for Workflow {
    fn from(w: WorkflowArg) -> Self {
        match w {
            WorkflowArg::Manage => Workflow::Manage,
            WorkflowArg::Request => Workflow::Request,
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn Error>> {
    let raw = fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&raw).map_err(|e| format!("{}: {}", path.display(), e))?)
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let out = match cli.command {
        Command::Diff { snapshot, working } => {
            let snapshot: PolicySnapshot = read_json(&snapshot)?;
            let working: Vec<Subject> = read_json(&working)?;
            json!({ "changed": has_changed(&snapshot.subjects, &working) })
        }
        Command::Plan { snapshot, edits, workflow, object_id, object_type, user, reason } => {
            let snapshot: PolicySnapshot = read_json(&snapshot)?;
            let edits: Vec<Edit> = read_json(&edits)?;
            let mut state = PolicyState::new(ObjectRef::new(object_id, object_type), workflow.into(), user, config, snapshot);
            for edit in edits {
                debug!(?edit, "applying edit");
                state.apply(edit)?;
            }
            let (change_set, payload) = submission::build(&state, reason.as_deref())?;
            json!({ "changed": state.has_changed(), "changeSet": change_set, "submission": payload })
        }
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("grantctl: logging disabled: {}", e);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("grantctl: {}", e);
            ExitCode::FAILURE
        }
    }
}
