//! Output rendering for `run` and `example`.
//!
//! tsv output is the sheet's own tab-separated printing; json output is one
//! compact JSON document per line so callers can read stdout line by line.

use std::io::{self, Write};

use serde::Serialize;

use gridcalc_engine::{Position, Sheet, Value};

use crate::config::{OutputConfig, OutputFormat, Show};

pub struct Printer<'a> {
    config: &'a OutputConfig,
}

#[derive(Serialize)]
struct CellReport<'a> {
    position: String,
    value: &'a Value,
    text: &'a str,
}

impl<'a> Printer<'a> {
    pub fn new(config: &'a OutputConfig) -> Self {
        Self { config }
    }

    fn json_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> io::Result<()> {
        serde_json::to_writer(&mut *out, value).map_err(io::Error::from)?;
        writeln!(out)
    }

    /// Print the whole sheet in the configured format.
    pub fn sheet<W: Write>(&self, sheet: &Sheet, show: Show, out: &mut W) -> io::Result<()> {
        match self.config.format {
            OutputFormat::Json => Self::json_line(out, &sheet.snapshot()),
            OutputFormat::Tsv => {
                if self.config.show_size {
                    writeln!(out, "{}", sheet.printable_size())?;
                }
                match show {
                    Show::Values => sheet.print_values(out),
                    Show::Texts => sheet.print_texts(out),
                    Show::Both => {
                        writeln!(out, "texts:")?;
                        sheet.print_texts(out)?;
                        writeln!(out, "values:")?;
                        sheet.print_values(out)
                    }
                }
            }
        }
    }

    pub fn cell<W: Write>(
        &self,
        pos: Position,
        value: &Value,
        text: &str,
        out: &mut W,
    ) -> io::Result<()> {
        match self.config.format {
            OutputFormat::Tsv => writeln!(out, "{}\t{}\t{}", pos, value, text),
            OutputFormat::Json => Self::json_line(
                out,
                &CellReport {
                    position: pos.to_string(),
                    value,
                    text,
                },
            ),
        }
    }

    pub fn size<W: Write>(&self, sheet: &Sheet, out: &mut W) -> io::Result<()> {
        let size = sheet.printable_size();
        match self.config.format {
            OutputFormat::Tsv => writeln!(out, "{}", size),
            OutputFormat::Json => Self::json_line(out, &size),
        }
    }
}
