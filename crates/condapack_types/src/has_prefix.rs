use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::paths::{FileMode, ParseFileModeError};
use crate::PREFIX_PLACEHOLDER;

/// A parsed `info/has_prefix` file: the paths of a package archive that embed
/// the build prefix, one per line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HasPrefix {
    /// One entry per non-empty line.
    pub entries: Vec<HasPrefixEntry>,
}

/// A single `has_prefix` line: either a bare path (conventional placeholder,
/// text mode) or an explicit `<placeholder> <mode> <path>` triple, with
/// shell-style quoting for fields containing whitespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HasPrefixEntry {
    /// The byte string embedded in the file at build time.
    pub placeholder: String,
    /// Whether the embedding is textual or binary.
    pub file_mode: FileMode,
    /// The affected path, relative to the package root.
    pub relative_path: PathBuf,
}

/// The error returned for `has_prefix` content that cannot be interpreted.
#[derive(Debug, thiserror::Error)]
pub enum ParseHasPrefixError {
    /// The line could not be split into shell tokens.
    #[error("malformed has_prefix line {0:?}")]
    Malformed(String),

    /// A line had a field count other than one or three.
    #[error("expected 1 or 3 fields in has_prefix line {line:?}, found {count}")]
    FieldCount {
        /// The offending line.
        line: String,
        /// The number of fields it tokenized into.
        count: usize,
    },

    /// The mode field was neither `text` nor `binary`.
    #[error(transparent)]
    FileMode(#[from] ParseFileModeError),

    /// The file could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HasPrefix {
    /// Reads and parses a `has_prefix` file.
    pub fn from_path(path: &Path) -> Result<Self, ParseHasPrefixError> {
        Self::from_str(&fs_err::read_to_string(path)?)
    }

    /// Reads the file from an extracted package directory.
    pub fn from_package_directory(path: &Path) -> Result<Self, ParseHasPrefixError> {
        Self::from_path(&path.join("info/has_prefix"))
    }
}

impl FromStr for HasPrefix {
    type Err = ParseHasPrefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            entries: s
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(HasPrefixEntry::from_str)
                .collect::<Result<_, _>>()?,
        })
    }
}

impl FromStr for HasPrefixEntry {
    type Err = ParseHasPrefixError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let tokens = shlex::split(line)
            .ok_or_else(|| ParseHasPrefixError::Malformed(line.to_string()))?;
        match tokens.as_slice() {
            [path] => Ok(Self {
                placeholder: PREFIX_PLACEHOLDER.to_string(),
                file_mode: FileMode::Text,
                relative_path: PathBuf::from(path),
            }),
            [placeholder, mode, path] => Ok(Self {
                placeholder: placeholder.clone(),
                file_mode: mode.parse()?,
                relative_path: PathBuf::from(path),
            }),
            other => Err(ParseHasPrefixError::FieldCount {
                line: line.to_string(),
                count: other.len(),
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{HasPrefix, HasPrefixEntry, ParseHasPrefixError};
    use crate::{FileMode, PREFIX_PLACEHOLDER};
    use assert_matches::assert_matches;
    use std::path::PathBuf;
    use std::str::FromStr;

    #[test]
    fn parse_bare_path() {
        let parsed = HasPrefixEntry::from_str("lib/pkgconfig/zlib.pc").unwrap();
        assert_eq!(
            parsed,
            HasPrefixEntry {
                placeholder: PREFIX_PLACEHOLDER.to_string(),
                file_mode: FileMode::Text,
                relative_path: PathBuf::from("lib/pkgconfig/zlib.pc"),
            }
        );
    }

    #[test]
    fn parse_triple() {
        let parsed =
            HasPrefixEntry::from_str("/opt/build/placeholder binary lib/libz.so").unwrap();
        assert_eq!(parsed.placeholder, "/opt/build/placeholder");
        assert_eq!(parsed.file_mode, FileMode::Binary);
        assert_eq!(parsed.relative_path, PathBuf::from("lib/libz.so"));
    }

    #[test]
    fn parse_quoted_triple_strips_quotes() {
        let parsed = HasPrefixEntry::from_str(
            "\"/opt/build dir/placeholder\" text \"lib/pkg config/zlib.pc\"",
        )
        .unwrap();
        assert_eq!(parsed.placeholder, "/opt/build dir/placeholder");
        assert_eq!(parsed.file_mode, FileMode::Text);
        assert_eq!(parsed.relative_path, PathBuf::from("lib/pkg config/zlib.pc"));
    }

    #[test]
    fn reject_two_fields() {
        assert_matches!(
            HasPrefixEntry::from_str("/opt/build/placeholder lib/libz.so"),
            Err(ParseHasPrefixError::FieldCount { count: 2, .. })
        );
    }

    #[test]
    fn reject_unknown_mode() {
        assert_matches!(
            HasPrefixEntry::from_str("/opt/build/placeholder executable lib/libz.so"),
            Err(ParseHasPrefixError::FileMode(_))
        );
    }

    #[test]
    fn parse_file_skips_blank_lines() {
        let parsed = HasPrefix::from_str("bin/tool\n\nlib/libz.pc\n").unwrap();
        assert_eq!(parsed.entries.len(), 2);
    }
}
