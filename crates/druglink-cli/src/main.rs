//! druglink: aligns DrugBank drugs with a biomedical knowledge graph.
//! Entry point for the batch binary.

mod config;
mod pipeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "druglink", version, about = "Align DrugBank drugs with a biomedical knowledge graph")]
struct Cli {
    /// Path to druglink.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// KG version (X.Y.Z) selecting the node-synonymizer database
    #[arg(long, global = true)]
    kg_version: Option<String>,

    /// Directory for inputs and dumps
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the node-synonymizer database and verify its SHA-256
    Fetch,
    /// Parse the DrugBank XML into drug records
    Extract {
        #[arg(long)]
        xml: Option<PathBuf>,
    },
    /// Normalize drugs and link their indication and mechanistic text
    Align,
    /// Add cross-reference nodes to the aligned drugs
    Identifiers {
        /// Also merge the resolved targets table (run `targets` first)
        #[arg(long)]
        with_targets: bool,
    },
    /// Resolve the DrugBank targets table to KG CURIEs
    Targets {
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Extract, align and add cross-references in one go
    Run {
        #[arg(long)]
        xml: Option<PathBuf>,
        #[arg(long)]
        with_targets: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("druglink=debug,info")),
        )
        .init();

    let cli = Cli::parse();
    info!("druglink {}", env!("CARGO_PKG_VERSION"));

    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(version) = cli.kg_version {
        config::validate_kg_version(&version)?;
        config.kg_version = version;
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    info!("KG {}, data in {}", config.kg_version, config.data_dir.display());

    match cli.command {
        Command::Fetch => pipeline::fetch(&config).await?,
        Command::Extract { xml } => {
            let xml = xml.unwrap_or_else(|| config.input_path(&config.inputs.drugbank_xml));
            pipeline::extract(&config, &xml)?;
        }
        Command::Align => {
            let records = pipeline::load_records(&config)?;
            let synonymizer = pipeline::build_synonymizer(&config).await?;
            pipeline::align(&config, synonymizer, &records).await?;
        }
        Command::Identifiers { with_targets } => {
            let mut drugs = pipeline::load_drug_info(&config)?;
            let targets = if with_targets { Some(pipeline::load_targets(&config)?) } else { None };
            let synonymizer = pipeline::build_synonymizer(&config).await?;
            pipeline::identifiers(&config, synonymizer, &mut drugs, targets.as_ref()).await?;
        }
        Command::Targets { csv } => {
            let csv = csv.unwrap_or_else(|| config.input_path(&config.inputs.targets_csv));
            let synonymizer = pipeline::build_synonymizer(&config).await?;
            pipeline::targets(&config, synonymizer, &csv).await?;
        }
        Command::Run { xml, with_targets } => {
            let xml = xml.unwrap_or_else(|| config.input_path(&config.inputs.drugbank_xml));
            let targets = if with_targets { Some(pipeline::load_targets(&config)?) } else { None };
            let records = pipeline::extract(&config, &xml)?;
            let synonymizer = pipeline::build_synonymizer(&config).await?;
            let mut drugs = pipeline::align(&config, synonymizer.clone(), &records).await?;
            pipeline::identifiers(&config, synonymizer, &mut drugs, targets.as_ref()).await?;
        }
    }

    info!("✅ Done");
    Ok(())
}
