//! Bicep Deploy

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{debug, error, info};
use thiserror::Error;

use crate::actions::Runner;
use crate::bicep::Bicep;
use crate::config::{ActionConfig, FileConfig, StackOperation};
use crate::deploy::{ArmClient, Deployer};
use crate::files::ParsedFiles;
use crate::input::Inputs;

mod actions;
mod bicep;
mod config;
mod deploy;
mod files;
mod input;
mod parameters;

/// Deploy Bicep and ARM templates as deployments or deployment stacks.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// YAML file of action inputs, layered over the `INPUT_*` environment variables.
    #[arg(long)]
    inputs_file: Option<PathBuf>,

    /// Set a single action input, e.g. `--input operation=whatIf`. May be repeated.
    #[arg(long = "input", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    inputs: Vec<(String, String)>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Commands {
    /// Resolve the inputs and run the operation against Azure. This is the default.
    Run,
    /// Resolve the inputs and print the configuration as JSON.
    Config,
    /// Print the parameters document that would be submitted.
    Parameters,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Input(#[from] input::Error),

    #[error(transparent)]
    Files(#[from] files::Error),

    #[error(transparent)]
    Compiler(#[from] bicep::Error),

    #[error(transparent)]
    Deploy(#[from] deploy::Error),

    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("write output: {0}")]
    IOError(#[from] std::io::Error),
}

impl Error {
    /// Extra lines reported next to the failure message.
    fn diagnostics(&self) -> Vec<String> {
        match self {
            Error::Deploy(err) => err.diagnostics(),
            _ => vec![],
        }
    }
}

/// Fail the job with the error message, followed by one line per diagnostic.
fn report_failure<W: Write>(runner: &mut Runner<W>, err: &Error) -> std::io::Result<()> {
    error!("fatal: {err}");
    if let Error::Input(input::Error::InvalidEnum { actual, .. }) = err {
        debug!("Rejected value: '{actual}'");
    }
    runner.set_failed(&err.to_string())?;
    for line in err.diagnostics() {
        runner.error(&line)?;
    }
    Ok(())
}

fn parse_key_value(arg: &str) -> Result<(String, String), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{arg}'"))?;
    Ok((key.trim().to_string(), value.to_string()))
}

/// Runner environment first, then the inputs file, then `--input` flags.
fn read_inputs(args: &Cli) -> Result<Inputs, Error> {
    let mut inputs = Inputs::from_env();
    if let Some(path) = &args.inputs_file {
        inputs.merge_yaml_file(path)?;
    }
    for (key, value) in &args.inputs {
        debug!("Input '{key}' set on the command line");
        inputs.set(key, value.as_str());
    }
    Ok(inputs)
}

/// A pinned Bicep release is only downloaded when something needs compiling.
async fn compiler(files: &FileConfig) -> Result<Bicep, Error> {
    match &files.bicep_version {
        Some(version) if files::requires_compiler(files) => Ok(Bicep::install(version).await?),
        _ => Ok(Bicep::system()),
    }
}

#[tokio::main]
async fn main() {
    let mut runner = Runner::from_env();
    match run(&mut runner).await {
        Ok(_) => std::process::exit(0),
        Err(err) => {
            if let Err(write_err) = report_failure(&mut runner, &err) {
                error!("report failure: {write_err}");
            }
            std::process::exit(1)
        }
    }
}

async fn run<W: Write>(runner: &mut Runner<W>) -> Result<(), Error> {
    env_logger::init();

    let args = Cli::parse();
    let inputs = read_inputs(&args)?;
    let config = config::parse(&inputs)?;

    let scope = config.scope();
    info!(
        "Resolved {} '{}' at {} scope",
        config.action_type(),
        config.operation(),
        scope.scope_type()
    );

    match args.command.unwrap_or(Commands::Run) {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Parameters => {
            let bicep = compiler(config.files()).await?;
            let document = files::load_parameters(config.files(), &bicep)?;
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(())
        }
        Commands::Run => {
            let environment = config.common().environment;
            let connect = || ArmClient::connect(environment, scope.tenant_id());
            execute(&config, connect, runner).await
        }
    }
}

/// Template and parameters for the operation. Deleting a stack needs
/// neither, so nothing is read or compiled for it.
async fn load_files(config: &ActionConfig) -> Result<ParsedFiles, Error> {
    if let ActionConfig::DeploymentStack(stack) = config {
        if stack.operation == StackOperation::Delete {
            debug!("Stack deletion needs no template");
            return Ok(ParsedFiles::default());
        }
    }

    let bicep = compiler(config.files()).await?;
    Ok(files::load(config.files(), &bicep)?)
}

/// Load the files, connect, submit the operation and publish its outputs.
///
/// Files are loaded before connecting, so template problems are reported
/// even where no Azure credentials are available.
async fn execute<D, F, Fut, W>(
    config: &ActionConfig,
    connect: F,
    runner: &mut Runner<W>,
) -> Result<(), Error>
where
    D: Deployer,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<D, deploy::Error>>,
    W: Write,
{
    let parsed = load_files(config).await?;
    let deployer = connect().await?;
    let outcome = deployer.deploy(config, &parsed).await?;

    if !outcome.changes.is_empty() {
        info!("{} predicted change(s):", outcome.changes.len());
        for change in &outcome.changes {
            info!("  {change}");
        }
    }

    runner.publish_outputs(&outcome.outputs, config.masked_outputs())?;
    Ok(())
}
