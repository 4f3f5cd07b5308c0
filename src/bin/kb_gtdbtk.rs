use std::fs;
use std::io::Read;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use kb_gtdbtk::config::{ConfigLoader, ResolvedConfig};
use kb_gtdbtk::error::GtdbtkError;
use kb_gtdbtk::output::JsonOutput;
use kb_gtdbtk::pipeline::{CallContext, Gtdbtk, status};

#[derive(Parser)]
#[command(name = "kb-gtdbtk")]
#[command(about = "Classify workspace genomes and assemblies with GTDB-Tk")]
#[command(version, author)]
struct Cli {
    /// JSON config with scratch, workspace-url, gtdbtk-bin and keep-staging.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run classification for one object reference")]
    Run(RunArgs),
    #[command(about = "Print service status")]
    Status,
}

#[derive(Args)]
struct RunArgs {
    /// JSON params file, or `-` for stdin.
    #[arg(long)]
    params: String,

    #[arg(long, env = "KB_AUTH_TOKEN", hide_env_values = true)]
    token: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<GtdbtkError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &GtdbtkError) -> u8 {
    match error {
        GtdbtkError::InvalidParameter(_)
        | GtdbtkError::ConfigRead(_)
        | GtdbtkError::ConfigParse(_)
        | GtdbtkError::MissingEnv(_) => 2,
        GtdbtkError::Authentication { .. }
        | GtdbtkError::ReferenceNotFound { .. }
        | GtdbtkError::RemoteWrite(_)
        | GtdbtkError::RemoteHttp { .. }
        | GtdbtkError::RemoteStatus { .. }
        | GtdbtkError::RemoteCall { .. } => 3,
        GtdbtkError::ClassifierExecution(_) => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Status => {
            JsonOutput::print_status(&status()).into_diagnostic()?;
            Ok(())
        }
        Commands::Run(args) => {
            let config = load_config(cli.config.as_deref())?;
            let params = read_params(&args.params)?;
            let service = Gtdbtk::from_config(config);
            let ctx = CallContext { token: args.token };
            let result = service.run_kb_gtdbtk(&ctx, params)?;
            JsonOutput::print_report(&result).into_diagnostic()?;
            Ok(())
        }
    }
}

fn load_config(path: Option<&str>) -> Result<ResolvedConfig, GtdbtkError> {
    ConfigLoader::resolve(path)
}

fn read_params(source: &str) -> miette::Result<Value> {
    let content = if source == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .into_diagnostic()?;
        buffer
    } else {
        fs::read_to_string(source).into_diagnostic()?
    };
    serde_json::from_str(&content)
        .map_err(|err| GtdbtkError::InvalidParameter(format!("params are not JSON: {err}")).into())
}
