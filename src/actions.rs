//! Workflow commands understood by the GitHub Actions runner.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use log::debug;
use serde_json::{Map, Value};

/// Escape data of a `::command::data` line.
fn escape_data(data: &str) -> String {
    data.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn output_value(output: &Value) -> String {
    let value = match output.get("value") {
        Some(value) => value,
        None => output,
    };
    match value {
        Value::String(value) => value.clone(),
        other => other.to_string(),
    }
}

fn delimiter(name: &str, value: &str) -> String {
    let mut seed = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    loop {
        let delimiter = format!("ghadelimiter_{seed}");
        if !name.contains(&delimiter) && !value.contains(&delimiter) {
            return delimiter;
        }
        seed += 1;
    }
}

fn write_heredoc(out: &mut impl Write, name: &str, value: &str) -> std::io::Result<()> {
    let delimiter = delimiter(name, value);
    writeln!(out, "{name}<<{delimiter}\n{value}\n{delimiter}")
}

pub struct Runner<W: Write> {
    output_file: Option<PathBuf>,
    out: W,
}

impl Runner<std::io::Stdout> {
    /// Runner writing commands to stdout and outputs to `$GITHUB_OUTPUT`.
    pub fn from_env() -> Self {
        let output_file = std::env::var_os("GITHUB_OUTPUT")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);
        Self::new(output_file, std::io::stdout())
    }
}

impl<W: Write> Runner<W> {
    pub fn new(output_file: Option<PathBuf>, out: W) -> Self {
        Self { output_file, out }
    }

    /// Multi-line values always use the heredoc form, also on stdout.
    pub fn set_output(&mut self, name: &str, value: &str) -> std::io::Result<()> {
        let Some(path) = &self.output_file else {
            if value.contains(['\n', '\r']) {
                return write_heredoc(&mut self.out, name, value);
            }
            return writeln!(self.out, "{name}={value}");
        };

        debug!("Writing output '{name}' to {}", path.display());
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        write_heredoc(&mut file, name, value)
    }

    /// Keep a value out of the job log.
    pub fn set_secret(&mut self, value: &str) -> std::io::Result<()> {
        writeln!(self.out, "::add-mask::{}", escape_data(value))
    }

    pub fn error(&mut self, message: &str) -> std::io::Result<()> {
        writeln!(self.out, "::error::{}", escape_data(message))
    }

    pub fn set_failed(&mut self, message: &str) -> std::io::Result<()> {
        self.error(message)
    }

    /// Export template outputs, masking the ones listed in `masked` first.
    pub fn publish_outputs(
        &mut self,
        outputs: &Map<String, Value>,
        masked: &[String],
    ) -> std::io::Result<()> {
        for (name, output) in outputs {
            let value = output_value(output);
            if masked.iter().any(|masked| masked == name) {
                self.set_secret(&value)?;
            }
            self.set_output(name, &value)?;
        }
        Ok(())
    }
}
