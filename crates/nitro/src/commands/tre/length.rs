use std::path::PathBuf;

use clap::Args;
use miette::Result;
use nitf_tre::Record;
use tracing::warn;

use super::{read_input, SchemaArgs};

#[derive(Args)]
pub struct LengthArgs {
    #[command(flatten)]
    schema: SchemaArgs,

    /// An input file holding the TRE data
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl LengthArgs {
    pub fn handle(&self) -> Result<()> {
        let registry = self.schema.load()?;
        let set = self.schema.resolve(&registry, Some(&self.file))?;
        let data = read_input(&self.file)?;

        let mut record = Record::new(set, Some(data.len()))?;
        if let Err(e) = record.decode_slice(&data) {
            warn!("decoding stopped early: {e}");
        }

        let length = record.compute_length()?;
        if length != data.len() {
            warn!("file holds {} bytes", data.len());
        }
        println!("{length}");
        Ok(())
    }
}
