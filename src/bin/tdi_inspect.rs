//! Inspect the catalog built from TDI schema documents.
//!
//! Usage:
//!   tdi-inspect --arch tna tables schema/tdi.json
//!   tdi-inspect table pipe.SwitchIngress.forward schema/tdi.json
//!   tdi-inspect --config devices.json --device 0 write-order
//!   tdi-inspect validate --contract my_contract.json schema/tdi.json

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tdi_catalog::{
    ArchType, Catalog, Device, DeviceConfigFile, DeviceRegistry, ProgramConfig, SchemaContract,
    TargetOptions,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "tdi-inspect")]
#[command(about = "Inspect tables, learns and dependencies of a TDI program")]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,

    /// Architecture used when reading schema files directly.
    #[arg(long, default_value = "tna")]
    arch: ArchType,

    /// Program name; defaults to the first program of the configured device.
    #[arg(long)]
    program: Option<String>,

    /// Device configuration file; replaces positional schema files.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Device to inspect when --config is given.
    #[arg(long, default_value_t = 0)]
    device: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every table with its id, kind and size.
    Tables {
        files: Vec<PathBuf>,
    },
    /// Print one table as JSON.
    Table {
        name: String,
        files: Vec<PathBuf>,
    },
    /// List every learn with its message size.
    Learns {
        files: Vec<PathBuf>,
    },
    /// Print tables in dependency-respecting order.
    WriteOrder {
        files: Vec<PathBuf>,
    },
    /// Check documents against a JSON Schema contract and parse them.
    Validate {
        /// Contract file; the bundled contract is used when omitted.
        #[arg(long)]
        contract: Option<PathBuf>,
        files: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut options = TargetOptions::default();
    let files = match &cli.command {
        Command::Tables { files }
        | Command::Table { files, .. }
        | Command::Learns { files }
        | Command::WriteOrder { files } => files.clone(),
        Command::Validate { contract, files } => {
            let contract = match contract {
                Some(path) => SchemaContract::from_path(path)?,
                None => SchemaContract::bundled()?,
            };
            options.contract = Some(Arc::new(contract));
            files.clone()
        }
    };

    let (device, program) = load_device(&cli, files, options)?;
    let catalog = device.tdi_info(&program)?;

    match &cli.command {
        Command::Tables { .. } => {
            for table in catalog.tables() {
                println!(
                    "{:>10}  {:<22} {:>8}  {}",
                    table.id(),
                    table.kind().to_string(),
                    table.info().size,
                    table.name()
                );
            }
        }
        Command::Table { name, .. } => {
            let table = catalog.table_from_name(name)?;
            println!("{}", serde_json::to_string_pretty(table)?);
        }
        Command::Learns { .. } => {
            for learn in catalog.learns() {
                println!(
                    "{:>10}  {:>4} bytes  {}",
                    learn.id(),
                    learn.info().message_size_bytes(),
                    learn.name()
                );
            }
        }
        Command::WriteOrder { .. } => {
            for table in catalog.write_order()? {
                println!("{}", table.name());
            }
        }
        Command::Validate { .. } => summarize(catalog),
    }
    Ok(())
}

fn load_device(
    cli: &Cli,
    files: Vec<PathBuf>,
    options: TargetOptions,
) -> Result<(Arc<Device>, String)> {
    if let Some(config_path) = &cli.config {
        if !files.is_empty() {
            bail!("schema files cannot be combined with --config");
        }
        let config = DeviceConfigFile::load(config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;
        let registry = DeviceRegistry::default();
        config.add_all(&registry, &options)?;
        let device = registry.device_get(cli.device)?;
        let program = match &cli.program {
            Some(name) => name.clone(),
            None => match device.program_names().first() {
                Some(name) => name.to_string(),
                None => bail!("device {} has no programs", cli.device),
            },
        };
        return Ok((device, program));
    }

    if files.is_empty() {
        bail!("no schema files given (pass files or --config)");
    }
    let program = cli.program.clone().unwrap_or_else(|| "program".to_string());
    let device = Device::new(
        0,
        cli.arch,
        vec![ProgramConfig::new(program.clone(), files)],
        options,
        None,
    )
    .context("building catalog")?;
    Ok((Arc::new(device), program))
}

fn summarize(catalog: &Catalog) {
    println!(
        "{}: {} tables, {} learns, {} optimized out",
        catalog.program_name(),
        catalog.tables().len(),
        catalog.learns().len(),
        catalog.optimized_out_tables().count()
    );
}
