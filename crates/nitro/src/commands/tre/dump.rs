use std::path::PathBuf;

use clap::{Args, ValueEnum};
use miette::{IntoDiagnostic, Result};
use nitf_tre::{FieldType, Record};
use serde_json::json;

use super::{read_input, SchemaArgs};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Format {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct DumpArgs {
    #[command(flatten)]
    schema: SchemaArgs,

    /// An input file holding the TRE data
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// The length declared for the TRE, defaults to the file size
    #[arg(short, long)]
    length: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

impl DumpArgs {
    pub fn handle(&self) -> Result<()> {
        let registry = self.schema.load()?;
        let set = self.schema.resolve(&registry, Some(&self.file))?;
        let data = read_input(&self.file)?;

        let mut record = Record::new(set, Some(self.length.unwrap_or(data.len())))?;
        record.decode_slice(&data)?;

        match self.format {
            Format::Text => print!("{record}"),
            Format::Json => {
                let fields = record
                    .iter()
                    .map(|(name, field)| {
                        let value = match field.field_type() {
                            FieldType::Binary => field.to_string(),
                            _ => field.as_str().into_owned(),
                        };
                        json!({
                            "name": name,
                            "type": field.field_type().to_string(),
                            "value": value,
                        })
                    })
                    .collect::<Vec<_>>();
                let document = json!({
                    "tag": record.tag(),
                    "layout": record.layout().name,
                    "length": data.len(),
                    "fields": fields,
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&document).into_diagnostic()?
                );
            }
        }
        Ok(())
    }
}
