use std::path::PathBuf;
use std::process::Command;

use serde::Deserialize;

use crate::error::CondaPackError;

/// The subset of `conda info --json` consumed for prefix resolution.
#[derive(Debug, Deserialize)]
struct CondaInfo {
    #[serde(default)]
    envs: Vec<PathBuf>,
    default_prefix: PathBuf,
}

fn conda_info() -> Result<CondaInfo, CondaPackError> {
    let output = Command::new("conda")
        .args(["info", "--json"])
        .output()
        .map_err(CondaPackError::CondaInfo)?;
    if !output.status.success() {
        return Err(CondaPackError::CondaInfo(std::io::Error::other(format!(
            "conda info exited with {}",
            output.status
        ))));
    }
    Ok(serde_json::from_slice(&output.stdout)?)
}

/// The prefix of the currently active (or base) environment.
pub(crate) fn default_prefix() -> Result<PathBuf, CondaPackError> {
    Ok(conda_info()?.default_prefix)
}

/// The prefix registered under `name` with the package manager.
pub(crate) fn named_prefix(name: &str) -> Result<PathBuf, CondaPackError> {
    conda_info()?
        .envs
        .into_iter()
        .find(|env| env.file_name().map(|base| base.to_string_lossy() == name).unwrap_or(false))
        .ok_or_else(|| CondaPackError::UnknownEnvironmentName(name.to_string()))
}
