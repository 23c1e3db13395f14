use std::{fs::File, io::Write, path::PathBuf};

use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use tracing::info;

use super::SchemaArgs;

#[derive(Args)]
pub struct BlankArgs {
    #[command(flatten)]
    schema: SchemaArgs,

    /// The length declared for the TRE, used to pick a layout
    #[arg(short, long)]
    length: Option<usize>,

    /// A target file
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl BlankArgs {
    pub fn handle(&self) -> Result<()> {
        let registry = self.schema.load()?;
        let set = self.schema.resolve(&registry, None)?;

        let mut record = nitf_tre::Record::new(set, self.length)?;
        record.fill_blank()?;
        let data = record.to_bytes()?;

        info!("writing {} bytes to {}", data.len(), self.output.display());
        let mut out = if !self.overwrite {
            File::create_new(&self.output)
                .into_diagnostic()
                .context(format!("creating {}", &self.output.display()))?
        } else {
            File::create(&self.output)
                .into_diagnostic()
                .context(format!("creating {}", &self.output.display()))?
        };

        out.write_all(&data).into_diagnostic()?;
        Ok(())
    }
}
