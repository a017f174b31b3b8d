use super::commands::{
    run_donor_ranking, run_model_info, run_transfusion_prediction, DonorRankArgs, ModelInfoArgs,
    TransfusionPredictArgs,
};
use super::server;
use crate::error::AppError;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ThalAI Guardian",
    about = "Rank blood donors and forecast thalassemia transfusions from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Work with donor rosters
    Donors {
        #[command(subcommand)]
        command: DonorCommand,
    },
    /// Forecast transfusion dates
    Transfusion {
        #[command(subcommand)]
        command: TransfusionCommand,
    },
    /// Inspect the trained transfusion model
    Model {
        #[command(subcommand)]
        command: ModelCommand,
    },
}

#[derive(Subcommand, Debug)]
enum DonorCommand {
    /// Rank a CSV donor roster against a recipient request
    Rank(DonorRankArgs),
}

#[derive(Subcommand, Debug)]
enum TransfusionCommand {
    /// Predict the next transfusion date for a JSON request file
    Predict(TransfusionPredictArgs),
}

#[derive(Subcommand, Debug)]
enum ModelCommand {
    /// Print the metadata of the model in the model directory
    Info(ModelInfoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the directory holding the transfusion model
    #[arg(long)]
    pub(crate) model_dir: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Donors {
            command: DonorCommand::Rank(args),
        } => run_donor_ranking(args),
        Command::Transfusion {
            command: TransfusionCommand::Predict(args),
        } => run_transfusion_prediction(args),
        Command::Model {
            command: ModelCommand::Info(args),
        } => run_model_info(args),
    }
}
