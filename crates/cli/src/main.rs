mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use drover_client::Config;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter, e.g. `drover_client=debug`.
const LOG_ENV: &str = "DROVER_LOG";

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// drover workflow client.
#[derive(Parser)]
#[command(name = "drover", version, about = "drover workflow client")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Config file (default: ~/.drover/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// GraphQL server URL, overriding the config file and environment
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the token in the credentials file
    Login {
        #[arg(long)]
        email: String,
        /// Read from the first line of stdin when omitted
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        account_slug: Option<String>,
        #[arg(long)]
        account_id: Option<String>,
    },

    /// Forget the stored token
    Logout,

    /// Register a serialized flow with the control plane
    Deploy {
        /// Path to the flow JSON payload
        flow: PathBuf,
        #[arg(long)]
        project_id: Option<String>,
        /// Start scheduling runs right away
        #[arg(long)]
        schedule_active: bool,
    },

    /// Create and inspect flow runs
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },

    /// Heartbeat a flow run (or a task run with --task)
    Heartbeat {
        id: String,
        #[arg(long)]
        task: bool,
    },

    /// Manage secrets
    Secret {
        #[command(subcommand)]
        command: SecretCommands,
    },

    /// Inspect the registered schemas
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
}

#[derive(Subcommand)]
pub(crate) enum RunCommands {
    /// Schedule a run of a deployed flow
    Create {
        flow_id: String,
        /// Parameter values as a JSON object
        #[arg(long)]
        parameters: Option<String>,
        /// RFC 3339 start time; now when omitted
        #[arg(long)]
        start_time: Option<String>,
    },

    /// Show version, state and task runs of a flow run
    Info { flow_run_id: String },

    /// Move a flow run to the state in a JSON file
    SetState {
        flow_run_id: String,
        /// Version counter last read for this run
        #[arg(long)]
        version: i64,
        /// Path to the state JSON payload
        #[arg(long)]
        state: PathBuf,
    },
}

#[derive(Subcommand)]
pub(crate) enum SecretCommands {
    /// Set a secret; the value is parsed as JSON when it is valid JSON
    Set { name: String, value: String },
}

#[derive(Subcommand)]
pub(crate) enum SchemaCommands {
    /// List every registered schema identity
    List,
    /// List the version tags registered for an identity
    Versions { identity: String },
}

/// What every command needs: the loaded config and how to print.
pub(crate) struct Context {
    pub config: Config,
    pub output: OutputFormat,
    pub quiet: bool,
}

impl Context {
    /// Report `msg` and exit with status 1.
    pub fn fail(&self, msg: &str) -> ! {
        report_error(msg, self.output, self.quiet);
        process::exit(1);
    }
}

fn main() {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            report_error(&e.to_string(), cli.output, cli.quiet);
            process::exit(1);
        }
    };
    if let Some(server) = cli.server {
        config.cloud.graphql = server;
    }
    init_logging(&config.logging.level);

    let ctx = Context {
        config,
        output: cli.output,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Login {
            email,
            password,
            account_slug,
            account_id,
        } => {
            commands::auth::cmd_login(&ctx, email, password, account_slug, account_id);
        }
        Commands::Logout => {
            commands::auth::cmd_logout(&ctx);
        }
        Commands::Deploy {
            flow,
            project_id,
            schedule_active,
        } => {
            commands::deploy::cmd_deploy(&ctx, &flow, project_id.as_deref(), schedule_active);
        }
        Commands::Run { command } => {
            commands::run::cmd_run(&ctx, command);
        }
        Commands::Heartbeat { id, task } => {
            commands::run::cmd_heartbeat(&ctx, &id, task);
        }
        Commands::Secret { command } => match command {
            SecretCommands::Set { name, value } => {
                commands::secret::cmd_secret_set(&ctx, &name, &value);
            }
        },
        Commands::Schema { command } => {
            commands::schema::cmd_schema(&ctx, command);
        }
    }
}

/// Log to stderr, filtered by `DROVER_LOG` or else the configured level.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

/// Print `text` or `json` depending on the output format. Quiet mode
/// silences text only.
pub(crate) fn emit(ctx: &Context, text: &str, json: serde_json::Value) {
    match ctx.output {
        OutputFormat::Text => {
            if !ctx.quiet {
                println!("{}", text);
            }
        }
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|e| format!(
                "{{\"error\": \"serialization: {}\"}}",
                e
            ))
        ),
    }
}
