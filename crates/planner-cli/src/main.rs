use clap::{Parser, Subcommand};
use planner_cli::cmd::{self, config::ConfigSubcommand, qr::QrSubcommand};
use planner_cli::{output, state_dir};
use planner_core::PlannerError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "planner",
    about = "Versioned plan state and file-locked QR checklists, driven one call or one batch at a time",
    version,
    propagate_version = true
)]
struct Cli {
    /// State directory (default: nearest .planner/ above the cwd, else the cwd)
    #[arg(long, global = true, env = "PLANNER_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Output as JSON where a human-readable form exists
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call a plan method: `planner plan <method> [--flag value ...]`,
    /// `planner plan batch '<json>'` or `planner plan list-methods`
    Plan {
        #[arg(
            trailing_var_arg = true,
            allow_hyphen_values = true,
            required = true,
            value_name = "METHOD [ARGS]"
        )]
        args: Vec<String>,
    },

    /// Read and update a phase's QR checklist
    Qr {
        /// QR phase, e.g. plan-code
        #[arg(long, global = true, env = "PLANNER_QR_PHASE")]
        qr_phase: Option<String>,

        #[command(subcommand)]
        subcommand: QrSubcommand,
    },

    /// Inspect config.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Plan { args } => cmd::plan::run(cli.state_dir.as_deref(), args, cli.json),
        Commands::Qr {
            qr_phase,
            subcommand,
        } => {
            let root = state_dir::resolve_state_dir(cli.state_dir.as_deref());
            cmd::qr::run(&root, qr_phase, subcommand, cli.json)
        }
        Commands::Config { subcommand } => {
            let root = state_dir::resolve_state_dir(cli.state_dir.as_deref());
            cmd::config::run(&root, subcommand, cli.json)
        }
    };

    if let Err(e) = result {
        if let Some(err) = e.downcast_ref::<PlannerError>() {
            let _ = output::print_error(err);
        }
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
