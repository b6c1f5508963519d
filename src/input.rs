use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};

use log::debug;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Action input '{0}' is required but not provided")]
    MissingInput(String),

    #[error("Action input '{key}' must be one of the following values: {}", quote_all(.allowed))]
    InvalidEnum {
        key: String,
        allowed: Vec<&'static str>,
        actual: String,
    },

    #[error("Action input '{0}' must be a boolean value")]
    InvalidBoolean(String),

    #[error("Action input '{0}' must be a valid JSON or YAML object")]
    InvalidObject(String),

    #[error("Action input '{key}' could not be resolved to a path: {err}")]
    InvalidPath {
        key: String,
        #[source]
        err: std::io::Error,
    },

    #[error("read inputs file {}: {err}", .path.display())]
    ReadInputsFile {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error("inputs file {}: {err}", .path.display())]
    ParseInputsFile {
        path: PathBuf,
        #[source]
        err: serde_yaml::Error,
    },
}

fn quote_all(values: &[&str]) -> String {
    values
        .iter()
        .map(|value| format!("'{value}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A closed set of values accepted by a single action input.
///
/// The wire text of each value is case-sensitive.
pub trait InputEnum: Copy + PartialEq + 'static {
    /// Every value, in the order it is reported in error messages.
    const ALL: &'static [Self];

    fn as_str(&self) -> &'static str;
}

/// Declares a closed enumeration backed by fixed input text.
macro_rules! input_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
        $vis enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $crate::input::InputEnum for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($crate::input::InputEnum::as_str(self))
            }
        }
    };
}

pub(crate) use input_enum;

fn parse_enum<T: InputEnum>(key: &str, value: &str, allowed: &[T]) -> Result<T, Error> {
    allowed
        .iter()
        .copied()
        .find(|candidate| candidate.as_str() == value)
        .ok_or_else(|| Error::InvalidEnum {
            key: key.to_string(),
            allowed: allowed.iter().map(InputEnum::as_str).collect(),
            actual: value.to_string(),
        })
}

fn parse_boolean(key: &str, value: &str) -> Result<bool, Error> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::InvalidBoolean(key.to_string())),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse JSON, falling back to YAML, and require an object at the top level.
fn parse_object(key: &str, value: &str) -> Result<Map<String, Value>, Error> {
    let parsed = serde_json::from_str::<Value>(value)
        .ok()
        .or_else(|| serde_yaml::from_str::<Value>(value).ok());

    match parsed {
        Some(Value::Object(map)) => Ok(map),
        _ => Err(Error::InvalidObject(key.to_string())),
    }
}

/// String pairs kept in the order they were written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringMap(Vec<(String, String)>);

impl StringMap {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StringMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl Serialize for StringMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Lexically resolve `path` against `base`, dropping `.` and folding `..`.
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    let mut resolved = PathBuf::new();
    for component in base.join(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved
}

/// A flat source of action inputs keyed by input name.
///
/// Every reader is fail-fast: the first violated constraint is returned
/// and nothing else is evaluated.
pub trait InputSource {
    /// Raw value of an input, if the source has one.
    fn get_input(&self, key: &str) -> Option<String>;

    /// Trimmed value of an input. Empty values count as absent.
    fn optional_string(&self, key: &str) -> Option<String> {
        self.get_input(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required_string(&self, key: &str) -> Result<String, Error> {
        self.optional_string(key)
            .ok_or_else(|| Error::MissingInput(key.to_string()))
    }

    fn optional_enum<T: InputEnum>(&self, key: &str, allowed: &[T]) -> Result<Option<T>, Error> {
        self.optional_string(key)
            .map(|value| parse_enum(key, &value, allowed))
            .transpose()
    }

    fn required_enum<T: InputEnum>(&self, key: &str, allowed: &[T]) -> Result<T, Error> {
        let value = self.required_string(key)?;
        parse_enum(key, &value, allowed)
    }

    fn optional_enum_list<T: InputEnum>(
        &self,
        key: &str,
        allowed: &[T],
    ) -> Result<Option<Vec<T>>, Error> {
        self.optional_string(key)
            .map(|value| {
                split_list(&value)
                    .iter()
                    .map(|token| parse_enum(key, token, allowed))
                    .collect::<Result<Vec<T>, Error>>()
            })
            .transpose()
    }

    fn optional_string_list(&self, key: &str) -> Option<Vec<String>> {
        self.optional_string(key).map(|value| split_list(&value))
    }

    fn optional_boolean(&self, key: &str) -> Result<Option<bool>, Error> {
        self.optional_string(key)
            .map(|value| parse_boolean(key, &value))
            .transpose()
    }

    fn required_boolean(&self, key: &str) -> Result<bool, Error> {
        let value = self.required_string(key)?;
        parse_boolean(key, &value)
    }

    /// A JSON or YAML object whose values must all be strings.
    fn optional_string_dictionary(
        &self,
        key: &str,
    ) -> Result<Option<StringMap>, Error> {
        let Some(value) = self.optional_string(key) else {
            return Ok(None);
        };

        parse_object(key, &value)?
            .into_iter()
            .map(|(name, value)| match value {
                Value::String(text) => Ok((name, text)),
                _ => Err(Error::InvalidObject(key.to_string())),
            })
            .collect::<Result<StringMap, _>>()
            .map(Some)
    }

    /// A JSON or YAML object with values of any shape.
    fn optional_dictionary(&self, key: &str) -> Result<Option<Map<String, Value>>, Error> {
        self.optional_string(key)
            .map(|value| parse_object(key, &value))
            .transpose()
    }

    /// Absolute, normalized path relative to the current working directory.
    fn optional_file_path(&self, key: &str) -> Result<Option<PathBuf>, Error> {
        let Some(value) = self.optional_string(key) else {
            return Ok(None);
        };

        let cwd = std::env::current_dir().map_err(|err| Error::InvalidPath {
            key: key.to_string(),
            err,
        })?;
        Ok(Some(resolve_path(&cwd, Path::new(&value))))
    }
}

impl InputSource for HashMap<String, String> {
    fn get_input(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Name of the environment variable the CI runner uses for an input.
fn env_key(key: &str) -> String {
    format!("INPUT_{}", key.replace(' ', "_").to_uppercase())
}

/// Layered action inputs: runner environment, then an inputs file,
/// then individual overrides. Later layers win.
#[derive(Debug, Default, Clone)]
pub struct Inputs {
    values: HashMap<String, String>,
}

impl Inputs {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            values: vars
                .into_iter()
                .filter(|(name, _)| name.starts_with("INPUT_"))
                .collect(),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(env_key(key), value.into());
    }

    /// Merge a YAML mapping of input names to values.
    ///
    /// Nested mappings and sequences are stored as JSON text, so structured
    /// inputs such as `parameters` can be written inline.
    pub fn merge_yaml(&mut self, yaml: &str, path: &Path) -> Result<(), Error> {
        let mapping: BTreeMap<String, Value> =
            serde_yaml::from_str(yaml).map_err(|err| Error::ParseInputsFile {
                path: path.to_path_buf(),
                err,
            })?;

        for (key, value) in mapping {
            let text = match value {
                Value::Null => continue,
                Value::String(text) => text,
                other => other.to_string(),
            };
            self.set(&key, text);
        }
        Ok(())
    }

    pub fn merge_yaml_file(&mut self, path: &Path) -> Result<(), Error> {
        debug!("Reading action inputs from {}", path.display());
        let yaml = std::fs::read_to_string(path).map_err(|err| Error::ReadInputsFile {
            path: path.to_path_buf(),
            err,
        })?;
        self.merge_yaml(&yaml, path)
    }
}

impl InputSource for Inputs {
    fn get_input(&self, key: &str) -> Option<String> {
        self.values.get(&env_key(key)).cloned()
    }
}
