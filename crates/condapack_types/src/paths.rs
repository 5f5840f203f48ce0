use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a file embeds a prefix: as readable text, or inside binary content
/// where the byte length of the path matters.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileMode {
    /// The prefix is part of a compiled object and must be replaced with a
    /// string of identical length.
    Binary,
    /// The prefix occurs as plain text and can be replaced freely.
    Text,
}

impl FileMode {
    /// The lowercase name used in metadata files and the relocation manifest.
    pub fn as_str(self) -> &'static str {
        match self {
            FileMode::Binary => "binary",
            FileMode::Text => "text",
        }
    }

    /// Returns `true` for [`FileMode::Binary`].
    pub fn is_binary(self) -> bool {
        matches!(self, FileMode::Binary)
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error returned when parsing a file mode that is neither `text` nor
/// `binary`.
#[derive(Debug, thiserror::Error)]
#[error("invalid file mode {0:?}, expected \"text\" or \"binary\"")]
pub struct ParseFileModeError(String);

impl FromStr for FileMode {
    type Err = ParseFileModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(FileMode::Text),
            "binary" => Ok(FileMode::Binary),
            other => Err(ParseFileModeError(other.to_string())),
        }
    }
}

/// How a path was placed into an installation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathType {
    /// A hard link into the package cache.
    HardLink,
    /// A symbolic link.
    SoftLink,
    /// An (empty) directory.
    Directory,
}

/// A representation of the `info/paths.json` manifest found in package
/// archives, describing every file the package installs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsJson {
    /// The version of the file format.
    pub paths_version: usize,

    /// One entry per installed path.
    pub paths: Vec<PathsEntry>,
}

impl PathsJson {
    /// Parses a `paths.json` file from a reader.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, std::io::Error> {
        let mut buffer = String::new();
        reader.read_to_string(&mut buffer)?;
        Self::from_str(&buffer)
    }

    /// Parses a `paths.json` file.
    pub fn from_path(path: &Path) -> Result<Self, std::io::Error> {
        Self::from_reader(fs_err::File::open(path)?)
    }

    /// Reads the manifest from an extracted package directory.
    pub fn from_package_directory(path: &Path) -> Result<Self, std::io::Error> {
        Self::from_path(&path.join("info/paths.json"))
    }
}

impl FromStr for PathsJson {
    type Err = std::io::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s).map_err(Into::into)
    }
}

/// A single entry of `paths.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsEntry {
    /// The path, relative to the root of the installed package.
    #[serde(rename = "_path")]
    pub relative_path: PathBuf,

    /// How the path lands in an installation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_type: Option<PathType>,

    /// Whether an embedded prefix is textual or binary. Only meaningful
    /// together with [`PathsEntry::prefix_placeholder`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_mode: Option<FileMode>,

    /// The build-time prefix recorded inside the file, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_placeholder: Option<String>,

    /// Hex SHA-256 of the file contents, present in newer archives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    /// Size of the file in bytes, present in newer archives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_in_bytes: Option<u64>,
}

/// The plain path list of older package archives (`info/files`), one
/// archive-relative path per line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackageFiles {
    /// The listed paths.
    pub files: Vec<PathBuf>,
}

impl PackageFiles {
    /// Parses an `info/files` listing.
    pub fn from_path(path: &Path) -> Result<Self, std::io::Error> {
        Ok(Self::parse(&fs_err::read_to_string(path)?))
    }

    /// Reads the listing from an extracted package directory.
    pub fn from_package_directory(path: &Path) -> Result<Self, std::io::Error> {
        Self::from_path(&path.join("info/files"))
    }

    fn parse(s: &str) -> Self {
        Self {
            files: s
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(PathBuf::from)
                .collect(),
        }
    }
}

impl FromStr for PackageFiles {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

#[cfg(test)]
mod test {
    use super::{FileMode, PackageFiles, PathType, PathsJson};
    use std::path::Path;

    #[test]
    fn parse_paths_json() {
        let parsed: PathsJson = r#"{
            "paths_version": 1,
            "paths": [
                {
                    "_path": "bin/tool",
                    "path_type": "hardlink",
                    "file_mode": "text",
                    "prefix_placeholder": "/opt/build/placeholder",
                    "sha256": "abc",
                    "size_in_bytes": 42
                },
                {
                    "_path": "share/doc.txt",
                    "path_type": "hardlink"
                }
            ]
        }"#
        .parse()
        .unwrap();

        assert_eq!(parsed.paths.len(), 2);

        let tool = &parsed.paths[0];
        assert_eq!(tool.relative_path, Path::new("bin/tool"));
        assert_eq!(tool.path_type, Some(PathType::HardLink));
        assert_eq!(tool.file_mode, Some(FileMode::Text));
        assert_eq!(
            tool.prefix_placeholder.as_deref(),
            Some("/opt/build/placeholder")
        );

        let doc = &parsed.paths[1];
        assert_eq!(doc.file_mode, None);
        assert_eq!(doc.prefix_placeholder, None);
    }

    #[test]
    fn parse_files_listing() {
        let listed: PackageFiles = "bin/tool\nlib/libx.so\n\nshare/doc.txt\n".parse().unwrap();
        assert_eq!(
            listed.files,
            vec![
                Path::new("bin/tool"),
                Path::new("lib/libx.so"),
                Path::new("share/doc.txt")
            ]
        );
    }

    #[test]
    fn file_mode_round_trip() {
        assert_eq!("text".parse::<FileMode>().unwrap(), FileMode::Text);
        assert_eq!("binary".parse::<FileMode>().unwrap(), FileMode::Binary);
        assert_eq!(FileMode::Text.to_string(), "text");
        assert!("executable".parse::<FileMode>().is_err());
    }
}
