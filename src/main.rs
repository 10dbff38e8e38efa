use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use apigw_deployer::config::Document;
use apigw_deployer::error::{Error, Result};
use apigw_deployer::{generate, logging, Clients, Deployer};

#[derive(Parser)]
#[command(
    name = "apigw-deployer",
    version,
    about = "Converges a REST API and its backing function with a YAML description"
)]
struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a starter artifact to stdout.
    Generate {
        #[command(subcommand)]
        artifact: Artifact,
    },
    /// Manage the REST API.
    Apigateway {
        #[command(subcommand)]
        command: ApiCommand,
    },
    /// Manage the function behind the API.
    Lambda {
        #[command(subcommand)]
        command: LambdaCommand,
    },
}

#[derive(Subcommand)]
enum Artifact {
    Config,
    LambdaHandler,
}

#[derive(Subcommand)]
enum ApiCommand {
    /// Create or converge the API described by the configuration.
    Update {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Snapshot the API into a stage.
    Deploy {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        stage: String,
        #[arg(short = 'd', long = "desc")]
        description: Option<String>,
        #[arg(long = "stagedesc")]
        stage_description: Option<String>,
    },
    /// List the API's stages and their URLs.
    Stages {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Subcommand)]
enum LambdaCommand {
    /// Create or update the function from a zip archive.
    Update {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        zip: PathBuf,
    },
    /// Allow the API service to invoke the function.
    AddPermission {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn deployer(config: &Path) -> Result<Deployer> {
    let document = Document::load(config)?;
    let clients = Clients::http(&document.config)?;
    Ok(Deployer::new(document, clients))
}

async fn run_api(command: ApiCommand) -> Result<()> {
    match command {
        ApiCommand::Update { config } => {
            let api = deployer(&config)?.update_api().await?;
            println!("API {} ({})", api.name, api.id);
        }
        ApiCommand::Deploy {
            config,
            stage,
            description,
            stage_description,
        } => {
            let deployment = deployer(&config)?
                .deploy_api(description, &stage, stage_description)
                .await?;
            println!("Deployment {} to stage {}", deployment.id, stage);
        }
        ApiCommand::Stages { config } => {
            for stage in deployer(&config)?.get_api_stages().await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    stage.stage_name,
                    stage.deployment_id.as_deref().unwrap_or("-"),
                    stage.invoke_url,
                    stage.description.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}

async fn run_lambda(command: LambdaCommand) -> Result<()> {
    match command {
        LambdaCommand::Update { config, zip } => {
            let archive = std::fs::read(&zip)
                .map_err(|e| Error::io(format!("reading {}", zip.display()), e))?;
            let function = deployer(&config)?.publish_function(&archive).await?;
            println!("Function {}", function.function_arn);
        }
        LambdaCommand::AddPermission { config } => {
            deployer(&config)?.grant_invoke_permission().await?;
        }
    }
    Ok(())
}

fn report(err: &Error) -> String {
    let mut out = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        out.push_str("\n  caused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_level);

    let result = match cli.command {
        Command::Generate { artifact } => {
            match artifact {
                Artifact::Config => print!("{}", generate::config_template()),
                Artifact::LambdaHandler => print!("{}", generate::lambda_handler()),
            }
            return ExitCode::SUCCESS;
        }
        Command::Apigateway { command } => run_api(command).await,
        Command::Lambda { command } => run_lambda(command).await,
    };

    match result {
        Ok(()) => {
            println!("Completed.");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Failed.");
            eprintln!("{}", report(&err));
            ExitCode::FAILURE
        }
    }
}
