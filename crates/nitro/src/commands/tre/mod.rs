use std::{fs::File, io::BufReader, path::Path, path::PathBuf, sync::Arc};

use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use nitf_tre::{Registry, SchemaSet};
use tracing::{debug, info};

pub mod blank;
pub mod check;
pub mod dump;
pub mod length;

#[derive(clap::Subcommand)]
pub enum TreCommands {
    /// Print the fields of a TRE
    Dump(dump::DumpArgs),
    /// Compute the encoded length of a TRE
    Length(length::LengthArgs),
    /// Decode, validate and re-encode a TRE
    Check(check::CheckArgs),
    /// Write a blank TRE for a tag
    Blank(blank::BlankArgs),
}

impl TreCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            TreCommands::Dump(dump) => dump.handle(),
            TreCommands::Length(length) => length.handle(),
            TreCommands::Check(check) => check.handle(),
            TreCommands::Blank(blank) => blank.handle(),
        }
    }
}

/// Schema options shared by every TRE command
#[derive(Args)]
pub struct SchemaArgs {
    /// A JSON file holding a list of schema sets
    #[arg(short, long, value_name = "FILE")]
    schema: PathBuf,

    /// The tag to use, defaults to the input file name
    #[arg(short, long)]
    tag: Option<String>,
}

impl SchemaArgs {
    pub fn load(&self) -> Result<Registry> {
        let f = File::open(&self.schema)
            .into_diagnostic()
            .context(format!("path: {}", &self.schema.display()))?;
        let sets: Vec<SchemaSet> = serde_json::from_reader(BufReader::new(f))
            .into_diagnostic()
            .context(format!("parsing {}", &self.schema.display()))?;

        let registry: Registry = sets.into_iter().collect();
        info!("loaded {} schema sets", registry.len());
        Ok(registry)
    }

    /// Pick the schema set for `input`
    ///
    /// An explicit tag wins. Otherwise the file stem is tried, and a registry holding a single
    /// tag uses that one.
    pub fn resolve(&self, registry: &Registry, input: Option<&Path>) -> Result<Arc<SchemaSet>> {
        if let Some(tag) = &self.tag {
            return Ok(registry.get(tag)?);
        }

        let stem = input
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().to_uppercase());
        if let Some(set) = stem.and_then(|tag| registry.get(&tag).ok()) {
            debug!("using tag {} from the file name", set.tag);
            return Ok(set);
        }

        let mut tags = registry.tags().collect::<Vec<_>>();
        match tags.as_slice() {
            [tag] => Ok(registry.get(tag)?),
            _ => {
                tags.sort_unstable();
                Err(miette!(
                    "unable to pick a tag, use --tag with one of: {}",
                    tags.join(", ")
                ))
            }
        }
    }
}

pub(crate) fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .into_diagnostic()
        .context(format!("path: {}", path.display()))
}
