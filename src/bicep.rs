use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use log::{debug, error, info, warn};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to compile Bicep file: {}", .0.display())]
    Compile(PathBuf),

    #[error("Failed to compile Bicep parameters file: {}", .0.display())]
    CompileParams(PathBuf),

    #[error("unexpected bicep output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("download bicep {version}: {err}")]
    Download {
        version: String,
        #[source]
        err: reqwest::Error,
    },

    #[error("no bicep release binary for {os}/{arch}")]
    UnsupportedPlatform {
        os: &'static str,
        arch: &'static str,
    },

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

/// Output of compiling a `.bicepparam` file.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledParams {
    pub parameters: String,
    pub template: Option<String>,
    pub template_spec_id: Option<String>,
}

/// Turns Bicep sources into ARM JSON documents.
pub trait Compiler {
    /// Compile a `.bicep` template, returning the ARM template JSON.
    fn compile(&self, path: &Path) -> Result<String, Error>;

    /// Compile a `.bicepparam` file along with the template it references.
    fn compile_params(&self, path: &Path) -> Result<CompiledParams, Error>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildParamsOutput {
    parameters_json: String,
    template_json: Option<String>,
    template_spec_id: Option<String>,
}

/// The `bicep` command line compiler.
pub struct Bicep {
    executable: PathBuf,
    // Holds a downloaded binary until the compiler is dropped.
    _install_dir: Option<tempfile::TempDir>,
}

impl Bicep {
    /// Use the `bicep` found through `BICEP_PATH` or `PATH`.
    pub fn system() -> Self {
        let executable = std::env::var_os("BICEP_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("bicep"));
        Self {
            executable,
            _install_dir: None,
        }
    }

    /// Download a specific bicep release into a temporary directory.
    pub async fn install(version: &str) -> Result<Self, Error> {
        let url = release_url(version, std::env::consts::OS, std::env::consts::ARCH)?;
        debug!("Downloading bicep {version} from {url}");

        let download_err = |err| Error::Download {
            version: version.to_string(),
            err,
        };
        let binary = reqwest::get(&url)
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(download_err)?
            .bytes()
            .await
            .map_err(download_err)?;

        let install_dir = tempfile::Builder::new().prefix("bicep-").tempdir()?;
        let executable = install_dir.path().join(executable_name(std::env::consts::OS));
        std::fs::write(&executable, &binary)?;
        make_executable(&executable)?;

        let bicep = Self {
            executable,
            _install_dir: Some(install_dir),
        };
        info!(
            "Installed Bicep version {} to {}",
            bicep.version()?,
            bicep.executable.display()
        );
        Ok(bicep)
    }

    pub fn version(&self) -> Result<String, Error> {
        let output = Command::new(&self.executable).arg("--version").output()?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn run(&self, args: &[&std::ffi::OsStr]) -> Result<Output, Error> {
        debug!("Running {} {:?}", self.executable.display(), args);
        let output = Command::new(&self.executable).args(args).output()?;
        log_diagnostics(&String::from_utf8_lossy(&output.stderr));
        Ok(output)
    }
}

impl Compiler for Bicep {
    fn compile(&self, path: &Path) -> Result<String, Error> {
        let output = self.run(&["build".as_ref(), path.as_os_str(), "--stdout".as_ref()])?;
        if !output.status.success() {
            return Err(Error::Compile(path.to_path_buf()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn compile_params(&self, path: &Path) -> Result<CompiledParams, Error> {
        let output = self.run(&["build-params".as_ref(), path.as_os_str(), "--stdout".as_ref()])?;
        if !output.status.success() {
            return Err(Error::CompileParams(path.to_path_buf()));
        }

        let parsed: BuildParamsOutput = serde_json::from_slice(&output.stdout)?;
        Ok(CompiledParams {
            parameters: parsed.parameters_json,
            template: parsed.template_json,
            template_spec_id: parsed.template_spec_id,
        })
    }
}

fn executable_name(os: &str) -> &'static str {
    if os == "windows" {
        "bicep.exe"
    } else {
        "bicep"
    }
}

/// GitHub release asset for a bicep version on the given platform.
fn release_url(version: &str, os: &'static str, arch: &'static str) -> Result<String, Error> {
    let platform = match os {
        "linux" => "linux",
        "macos" => "osx",
        "windows" => "win",
        _ => return Err(Error::UnsupportedPlatform { os, arch }),
    };
    let arch_name = match arch {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        _ => return Err(Error::UnsupportedPlatform { os, arch }),
    };
    let suffix = if os == "windows" { ".exe" } else { "" };
    let version = version.trim_start_matches('v');

    Ok(format!(
        "https://github.com/Azure/bicep/releases/download/v{version}/bicep-{platform}-{arch_name}{suffix}"
    ))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Severity {
    Error,
    Warning,
    Info,
}

/// Split a compiler line such as
/// `main.bicep(3,7) : Warning no-unused-params: Parameter "x" is unused.`
/// into its severity and the full line.
fn parse_diagnostic(line: &str) -> Option<Severity> {
    let (_, rest) = line.split_once(") : ")?;
    match rest.split_whitespace().next()? {
        "Error" => Some(Severity::Error),
        "Warning" => Some(Severity::Warning),
        "Info" => Some(Severity::Info),
        _ => None,
    }
}

fn log_diagnostics(stderr: &str) {
    for line in stderr.lines().filter(|line| !line.trim().is_empty()) {
        match parse_diagnostic(line) {
            Some(Severity::Error) => error!("{line}"),
            Some(Severity::Warning) => warn!("{line}"),
            Some(Severity::Info) | None => info!("{line}"),
        }
    }
}
