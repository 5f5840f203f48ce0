use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A record of one installed package, as stored in the environment's
/// `conda-meta/<name>-<version>-<build>.json`.
///
/// Only the fields the packer consumes are modelled; everything else in the
/// record is ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CondaMetaRecord {
    /// The package name.
    pub name: String,

    /// The package version.
    pub version: String,

    /// Where the package archive was downloaded from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Every path the package installed, relative to the prefix.
    #[serde(default)]
    pub files: Vec<PathBuf>,

    /// The package-cache provenance of the installed files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
}

/// Reference to the extracted package directory an installation linked from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// The extracted package directory inside the package cache.
    pub source: PathBuf,
}

impl CondaMetaRecord {
    /// Parses a record from a reader.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, std::io::Error> {
        let mut buffer = String::new();
        reader.read_to_string(&mut buffer)?;
        Self::from_str(&buffer)
    }

    /// Parses a record file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        Self::from_reader(fs_err::File::open(path.as_ref())?)
    }

    /// Reads every record of the environment at `prefix` from its
    /// `conda-meta` directory, in file-name order.
    pub fn collect_from_prefix(prefix: &Path) -> Result<Vec<CondaMetaRecord>, std::io::Error> {
        let mut paths = Vec::new();
        for entry in fs_err::read_dir(prefix.join("conda-meta"))? {
            let entry = entry?;
            if entry.file_type()?.is_file()
                && entry.file_name().to_string_lossy().ends_with(".json")
            {
                paths.push(entry.path());
            }
        }
        paths.sort();
        paths.iter().map(Self::from_path).collect()
    }
}

impl FromStr for CondaMetaRecord {
    type Err = std::io::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s).map_err(Into::into)
    }
}
