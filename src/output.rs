use std::io::{self, Write};

use serde::Serialize;

use crate::domain::ReportResult;
use crate::pipeline::Status;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(result: &ReportResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_status(status: &Status) -> io::Result<()> {
        Self::print_json(status)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
