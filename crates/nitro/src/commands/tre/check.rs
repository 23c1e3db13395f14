use std::path::PathBuf;

use clap::Args;
use miette::{miette, Result};
use nitf_tre::Record;
use owo_colors::{OwoColorize, Stream::Stdout};
use tracing::info;

use super::{read_input, SchemaArgs};

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    schema: SchemaArgs,

    /// An input file holding the TRE data
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl CheckArgs {
    pub fn handle(&self) -> Result<()> {
        let registry = self.schema.load()?;
        let set = self.schema.resolve(&registry, Some(&self.file))?;
        let data = read_input(&self.file)?;

        let record = Record::from_bytes(set, &data)?;
        info!("decoded {} fields with layout {}", record.len(), record.layout().name);

        let mut failures = Vec::new();
        if !record.is_sane() {
            failures.push("fields do not match the layout".to_owned());
        }

        let length = record.compute_length()?;
        if length != data.len() {
            failures.push(format!("computed length {length} but file holds {}", data.len()));
        }

        let encoded = record.to_bytes()?;
        if let Some(offset) = encoded.iter().zip(&data).position(|(a, b)| a != b) {
            failures.push(format!("re-encoded data differs at byte {offset}"));
        } else if encoded.len() != data.len() {
            failures.push(format!("re-encoded {} bytes", encoded.len()));
        }

        if failures.is_empty() {
            println!(
                "{} {}",
                record.tag(),
                "ok".if_supports_color(Stdout, |t| t.green())
            );
            return Ok(());
        }

        for failure in &failures {
            println!(
                "{} {}",
                "failed:".if_supports_color(Stdout, |t| t.red()),
                failure
            );
        }
        Err(miette!("{} failed {} checks", record.tag(), failures.len()))
    }
}
