use clap::{Parser, Subcommand};

use prople_warden_rpc::WardenRPC;
use prople_wardend::errors::WardenError;
use prople_wardend::svc::hub::Hub;
use prople_wardend::svc::router::Inbound;
use prople_wardend::svc::rpc::Rpc;
use prople_wardend::svc::{logging, resolver, worker};

#[derive(Parser)]
#[command(name = "wardend")]
#[command(version = "0.1")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(name = "hub")]
    #[command(about = "Running every hub component in one process")]
    Hub {
        #[arg(short, long, value_name = "FILE")]
        #[arg(required = true)]
        config: String,
    },

    #[command(name = "rpc")]
    #[command(about = "Running the admin JSON-RPC server, the cloud-agent bridge and the didexchange worker")]
    Rpc {
        #[arg(short, long, value_name = "FILE")]
        #[arg(required = true)]
        config: String,
    },

    #[command(name = "router")]
    #[command(about = "Running the inbound DIDComm router")]
    Router {
        #[arg(short, long, value_name = "FILE")]
        #[arg(required = true)]
        config: String,
    },

    #[command(name = "worker")]
    #[command(about = "Running one protocol worker")]
    Worker {
        #[arg(short, long, value_name = "FILE")]
        #[arg(required = true)]
        config: String,

        #[arg(short, long, value_name = "QUEUE")]
        #[arg(value_parser = ["issue-credential", "present-proof", "notification"])]
        queue: String,
    },

    #[command(name = "resolver")]
    #[command(about = "Running the DID resolver")]
    Resolver {
        #[arg(short, long, value_name = "FILE")]
        #[arg(required = true)]
        config: String,
    },
}

impl Commands {
    fn config(&self) -> &str {
        match self {
            Commands::Hub { config }
            | Commands::Rpc { config }
            | Commands::Router { config }
            | Commands::Worker { config, .. }
            | Commands::Resolver { config } => config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), WardenError> {
    let cli = Cli::parse();

    let warden = WardenRPC::new(cli.command.config())?;
    logging::init(warden.config().log().get_format())?;
    let provider = warden.build_provider().await?;

    match &cli.command {
        Commands::Hub { .. } => Hub::new(warden, provider).serve().await?,
        Commands::Rpc { .. } => Rpc::new(warden, provider).serve().await?,
        Commands::Router { .. } => Inbound::new(provider).serve().await?,
        Commands::Worker { queue, .. } => worker::run_queue(&provider, queue).await?,
        Commands::Resolver { .. } => resolver::serve(&provider).await?,
    }

    Ok(())
}
