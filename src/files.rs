use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_json::Value;
use thiserror::Error;

use crate::bicep::{self, Compiler};
use crate::config::FileConfig;
use crate::parameters;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported parameters file type: {}", .0.display())]
    UnsupportedParametersFile(PathBuf),

    #[error("Unsupported template file type: {}", .0.display())]
    UnsupportedTemplateFile(PathBuf),

    #[error("Template file is required")]
    TemplateRequired,

    #[error("read {}: {err}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error("parse {what}: {err}")]
    Parse {
        what: String,
        #[source]
        err: serde_json::Error,
    },

    #[error(transparent)]
    Parameters(#[from] parameters::Error),

    #[error(transparent)]
    Compile(#[from] bicep::Error),
}

/// Template and parameters ready to be submitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFiles {
    pub template: Option<Value>,
    /// Parameters document, shaped `{"parameters": {<name>: {"value": ..}}}`.
    pub parameters: Value,
    pub template_spec_id: Option<String>,
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

/// Whether loading these files needs the Bicep compiler.
pub fn requires_compiler(files: &FileConfig) -> bool {
    let params = files.parameters_file.as_deref();
    let template = files.template_file.as_deref();
    params.is_some_and(|path| has_extension(path, "bicepparam"))
        || template.is_some_and(|path| has_extension(path, "bicep"))
}

fn parse_json(what: &Path, text: &str) -> Result<Value, Error> {
    serde_json::from_str(text).map_err(|err| Error::Parse {
        what: what.display().to_string(),
        err,
    })
}

fn compile_params(
    path: &Path,
    files: &FileConfig,
    compiler: &dyn Compiler,
) -> Result<ParsedFiles, Error> {
    info!("Compiling parameters file {}", path.display());
    let compiled = compiler.compile_params(path)?;
    let base = parse_json(path, &compiled.parameters)?;
    Ok(ParsedFiles {
        template: compiled
            .template
            .map(|template| parse_json(path, &template))
            .transpose()?,
        parameters: parameters::merge(Some(base), files.parameters.as_ref())?,
        template_spec_id: compiled.template_spec_id,
    })
}

/// Resolve the parameters document alone, without reading the template.
pub fn load_parameters(files: &FileConfig, compiler: &dyn Compiler) -> Result<Value, Error> {
    match files.parameters_file.as_deref() {
        Some(path) if has_extension(path, "bicepparam") => {
            Ok(compile_params(path, files, compiler)?.parameters)
        }
        Some(path) if !has_extension(path, "json") => {
            Err(Error::UnsupportedParametersFile(path.to_path_buf()))
        }
        _ => Ok(parameters::resolve(files)?),
    }
}

/// Load the template and parameters, compiling Bicep sources as needed.
///
/// A `.bicepparam` file brings its own template, so `template-file` is
/// ignored in that case. Inline parameters always win over file values.
pub fn load(files: &FileConfig, compiler: &dyn Compiler) -> Result<ParsedFiles, Error> {
    if let Some(path) = files
        .parameters_file
        .as_deref()
        .filter(|path| has_extension(path, "bicepparam"))
    {
        return compile_params(path, files, compiler);
    }

    let parameters = load_parameters(files, compiler)?;

    let template = match files.template_file.as_deref() {
        Some(path) if has_extension(path, "bicep") => {
            info!("Compiling template file {}", path.display());
            parse_json(path, &compiler.compile(path)?)?
        }
        Some(path) if !has_extension(path, "json") => {
            return Err(Error::UnsupportedTemplateFile(path.to_path_buf()))
        }
        Some(path) => {
            debug!("Reading template file {}", path.display());
            let text = std::fs::read_to_string(path).map_err(|err| Error::ReadFile {
                path: path.to_path_buf(),
                err,
            })?;
            parse_json(path, &text)?
        }
        None => return Err(Error::TemplateRequired),
    };

    Ok(ParsedFiles {
        template: Some(template),
        parameters,
        template_spec_id: None,
    })
}
