//! `blindex` CLI tool for master keys, index keys and ad-hoc blind indexes.

#![warn(clippy::pedantic, clippy::nursery)]

use anyhow::{Context, Result};
use blindex::blind_index::{compute_blind_index, Digest};
use blindex::config::FieldOptions;
use blindex::field::IndexedField;
use blindex::key::{KeyMaterial, KeySource};
use blindex::key_generator::DerivedKey;
use blindex::master_key::{resolve_master_key, EnvMasterKey, MasterKeyResolver};
use blindex_key_file::FileMasterKey;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "blindex")]
#[command(about = "Blind index key management CLI", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new master key
    GenerateKey {
        /// Write the key to `master.key` in this directory instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Derive the index key for a table and field
    IndexKey {
        /// Table name
        #[arg(long)]
        table: String,
        /// Blind index column name
        #[arg(long)]
        field: String,
        /// Directory holding `master.key`; the environment is used otherwise
        #[arg(long, env = "BLINDEX_KEY_DIR")]
        key_dir: Option<PathBuf>,
    },
    /// Compute the blind index of a value
    Compute {
        /// TOML file with `[fields.<name>]` definitions
        #[arg(short, long)]
        config: PathBuf,
        /// Field to use
        #[arg(long)]
        field: String,
        /// Plaintext value
        #[arg(long)]
        value: String,
        /// Index key (64 hex chars); derived from the master key if absent
        #[arg(long)]
        key: Option<String>,
        /// Directory holding `master.key`; the environment is used otherwise
        #[arg(long, env = "BLINDEX_KEY_DIR")]
        key_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldsFile {
    #[serde(default)]
    fields: BTreeMap<String, FieldOptions>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::GenerateKey { output: Some(dir) } => {
            let resolver = FileMasterKey::init(&dir)
                .with_context(|| format!("initializing key directory {}", dir.display()))?;
            println!("{}", resolver.key_path().display());
        }
        Commands::GenerateKey { output: None } => {
            println!("{}", blindex::generate_key());
        }
        Commands::IndexKey { table, field, key_dir } => {
            let resolver = master_key_resolver(key_dir.as_deref())?;
            let master_key = KeyMaterial::from(resolve_master_key(resolver.as_ref())?);
            match blindex::derive_index_key(&table, &field, &master_key, true)? {
                DerivedKey::Hex(hex_key) => println!("{hex_key}"),
                DerivedKey::Binary(key) => println!("{}", key.to_hex()),
            }
        }
        Commands::Compute { config, field, value, key, key_dir } => {
            let options = load_field(&config, &field)?;
            let value = Some(value.into());
            let digest = if let Some(key) = key {
                let key = KeySource::key(KeyMaterial::text(key));
                compute_blind_index(value, &key, &options.to_config()?)?
            } else {
                let resolver = master_key_resolver(key_dir.as_deref())?;
                IndexedField::from_options(&field, &options, resolver)
                    .with_context(|| format!("field {field}"))?
                    .compute(value)?
            };
            match digest {
                Some(Digest::Text(text)) => println!("{text}"),
                Some(Digest::Bytes(bytes)) => println!("{}", hex::encode(bytes)),
                None => println!(),
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn master_key_resolver(key_dir: Option<&Path>) -> Result<Arc<dyn MasterKeyResolver>> {
    match key_dir {
        Some(dir) => {
            let resolver = FileMasterKey::new(dir)
                .with_context(|| format!("opening key directory {}", dir.display()))?;
            Ok(Arc::new(resolver))
        }
        None => Ok(Arc::new(EnvMasterKey::new())),
    }
}

fn load_field(path: &Path, name: &str) -> Result<FieldOptions> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let mut file = parse_fields(&content)
        .with_context(|| format!("parsing config {}", path.display()))?;
    let options = file
        .fields
        .remove(name)
        .with_context(|| format!("field {name} not defined in {}", path.display()))?;
    tracing::debug!(path = %path.display(), field = name, "loaded field definition");
    Ok(options)
}

fn parse_fields(content: &str) -> Result<FieldsFile, toml::de::Error> {
    toml::from_str(content)
}
