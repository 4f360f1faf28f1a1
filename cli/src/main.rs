use anyhow::Result;
use clap::{Parser, Subcommand};
use dotstorage_index::DEFAULT_ADVERT_ENDPOINT;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;

/// dotstorage operational tooling
#[derive(Parser)]
#[clap(name = "dotstorage", version, about = "dotstorage operational tooling")]
struct Cli {
    /// Log debug output to stderr
    #[clap(short, long)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Determine if CAR file(s) contain a complete DAG
    IsDagComplete {
        /// CAR files to read blocks from, queried in order
        #[clap(required = true)]
        car_paths: Vec<PathBuf>,

        /// Root CID of the DAG (derived from the CAR files if not set)
        #[clap(long)]
        root: Option<String>,
    },

    /// Find the indexer advertisement that contains a CID
    FindAdvert {
        /// Content CID to look for
        cid: String,

        /// Root location where adverts can be found
        #[clap(long, default_value = DEFAULT_ADVERT_ENDPOINT)]
        url: String,

        /// List every entry that did not match
        #[clap(long)]
        verbose: bool,
    },

    /// Display CIDs of adverts created since the passed advert CID
    AdvertsSince {
        /// Oldest advert, not itself listed
        advert_cid: String,

        /// Root location where adverts can be found
        #[clap(long, default_value = DEFAULT_ADVERT_ENDPOINT)]
        url: String,
    },

    /// Display the entries of an advert as CIDs
    ListAdvertEntries {
        advert_cid: String,

        /// Root location where adverts can be found
        #[clap(long, default_value = DEFAULT_ADVERT_ENDPOINT)]
        url: String,
    },

    /// Display IPFS peers in the cluster
    ListClusterIpfsPeers {
        /// Print error-free peer addresses as one comma separated line
        #[clap(long)]
        csv: bool,
    },

    /// Show the pin status of a CID in the cluster
    ShowClusterCidStatus {
        cid: String,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Commands::IsDagComplete { car_paths, root } => {
            commands::dag::is_dag_complete(&car_paths, root.as_deref()).await?;
        }
        Commands::FindAdvert { cid, url, verbose } => {
            commands::advert::find_advert(&cid, &url, verbose).await?;
        }
        Commands::AdvertsSince { advert_cid, url } => {
            commands::advert::adverts_since(&advert_cid, &url).await?;
        }
        Commands::ListAdvertEntries { advert_cid, url } => {
            commands::advert::list_advert_entries(&advert_cid, &url).await?;
        }
        Commands::ListClusterIpfsPeers { csv } => {
            commands::cluster::list_ipfs_peers(csv).await?;
        }
        Commands::ShowClusterCidStatus { cid } => {
            commands::cluster::show_cid_status(&cid).await?;
        }
    }

    Ok(())
}
