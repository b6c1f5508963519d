use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::config::FileConfig;

#[derive(Error, Debug)]
pub enum Error {
    #[error("read {}: {err}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error("parse {}: {err}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        err: serde_json::Error,
    },

    #[error("invalid parameters document: {0}")]
    InvalidDocument(&'static str),
}

/// Read a JSON parameters file.
pub fn read_file(path: &Path) -> Result<Value, Error> {
    let contents = std::fs::read_to_string(path).map_err(|err| Error::Read {
        path: path.to_path_buf(),
        err,
    })?;
    serde_json::from_str(&contents).map_err(|err| Error::Parse {
        path: path.to_path_buf(),
        err,
    })
}

/// Apply parameter overrides to a parameters document.
///
/// Every override replaces `parameters.<name>.value` as a whole. Parameters
/// without an override are left as they are. Without a base document the
/// result contains only the overrides.
pub fn merge(base: Option<Value>, overrides: Option<&Map<String, Value>>) -> Result<Value, Error> {
    let mut document = base.unwrap_or_else(|| json!({ "parameters": {} }));

    let root = document
        .as_object_mut()
        .ok_or(Error::InvalidDocument("expected a JSON object"))?;
    let parameters = root
        .entry("parameters")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or(Error::InvalidDocument("'parameters' must be a JSON object"))?;

    for (name, value) in overrides.into_iter().flatten() {
        parameters.insert(name.clone(), json!({ "value": value }));
    }

    Ok(document)
}

/// Parameters document for a JSON parameters file (if any) and inline overrides.
pub fn resolve(files: &FileConfig) -> Result<Value, Error> {
    let base = files
        .parameters_file
        .as_deref()
        .map(read_file)
        .transpose()?;
    merge(base, files.parameters.as_ref())
}
