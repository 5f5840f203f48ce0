use std::path::{Path, PathBuf};

use glob::Pattern;

use crate::error::CondaPackError;
use crate::load::{self, LoadOptions};
use crate::pack::{self, PackOptions};
use crate::discovery;
use crate::reporter::Reporter;

/// How (if at all) the installation prefix is embedded in a file's bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrefixMode {
    /// The bytes do not depend on the prefix; the file passes through
    /// verbatim.
    None,

    /// The prefix occurs in text form, declared by the package metadata.
    Text {
        /// The byte string embedded in the file in place of the final prefix.
        placeholder: String,
    },

    /// The prefix is embedded inside a compiled object. Rewriting is length
    /// sensitive and happens at extraction time through the relocation
    /// manifest.
    Binary {
        /// The byte string embedded in the file in place of the final prefix.
        placeholder: String,
    },

    /// Nothing is known about the file; the packer scans the bytes itself.
    Unknown,
}

impl PrefixMode {
    /// The declared placeholder, for the modes that carry one.
    pub fn placeholder(&self) -> Option<&str> {
        match self {
            PrefixMode::Text { placeholder } | PrefixMode::Binary { placeholder } => {
                Some(placeholder)
            }
            PrefixMode::None | PrefixMode::Unknown => None,
        }
    }
}

/// A single file of an environment and how it will land in the archive.
///
/// Records are produced by the loader and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute path of the file on the originating filesystem. For managed
    /// files with declared prefix handling this points into the package
    /// cache, whose copies still hold the pristine build placeholder.
    pub source: PathBuf,

    /// Path of the entry inside the archive, relative to the archive root.
    pub target: PathBuf,

    /// Whether the file was declared by a package, as opposed to found by
    /// scanning the environment tree.
    pub is_conda: bool,

    /// How the installation prefix is embedded in the file.
    pub prefix_mode: PrefixMode,
}

/// An installed environment: an absolute prefix plus the sequence of files
/// that will be packed.
///
/// The value is immutable; the filter operations return new environments.
#[derive(Clone, Debug)]
pub struct Environment {
    prefix: PathBuf,
    files: Vec<FileRecord>,
}

impl Environment {
    /// Loads the environment installed at `prefix`.
    pub fn from_prefix(
        prefix: impl AsRef<Path>,
        options: &LoadOptions,
        reporter: &dyn Reporter,
    ) -> Result<Self, CondaPackError> {
        let prefix = prefix.as_ref().to_path_buf();
        let files = load::load_environment(&prefix, options, reporter)?;
        Ok(Self { prefix, files })
    }

    /// Loads the environment registered under `name` with the package
    /// manager.
    pub fn from_name(
        name: &str,
        options: &LoadOptions,
        reporter: &dyn Reporter,
    ) -> Result<Self, CondaPackError> {
        Self::from_prefix(discovery::named_prefix(name)?, options, reporter)
    }

    /// Loads the package manager's default environment.
    pub fn from_default(
        options: &LoadOptions,
        reporter: &dyn Reporter,
    ) -> Result<Self, CondaPackError> {
        Self::from_prefix(discovery::default_prefix()?, options, reporter)
    }

    /// The absolute installation prefix.
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// The name of the environment: the base name of its prefix.
    pub fn name(&self) -> String {
        self.prefix
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "environment".to_string())
    }

    /// The files that will be packed, in archive order.
    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    /// The number of files that will be packed.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` when no files are left to pack.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterates over the file records in archive order.
    pub fn iter(&self) -> std::slice::Iter<'_, FileRecord> {
        self.files.iter()
    }

    /// Keeps only the files matching the predicate.
    pub fn filter(&self, pred: impl Fn(&FileRecord) -> bool) -> Environment {
        Environment {
            prefix: self.prefix.clone(),
            files: self.files.iter().filter(|f| pred(f)).cloned().collect(),
        }
    }

    /// Removes the files matching the predicate.
    pub fn remove(&self, pred: impl Fn(&FileRecord) -> bool) -> Environment {
        self.filter(|f| !pred(f))
    }

    /// Keeps only the files whose target matches the glob pattern.
    pub fn filter_glob(&self, pattern: &str) -> Result<Environment, CondaPackError> {
        let pattern = Pattern::new(pattern)?;
        Ok(self.filter(|f| pattern.matches_path(&f.target)))
    }

    /// Removes the files whose target matches the glob pattern.
    pub fn exclude_glob(&self, pattern: &str) -> Result<Environment, CondaPackError> {
        let pattern = Pattern::new(pattern)?;
        Ok(self.remove(|f| pattern.matches_path(&f.target)))
    }

    /// Packages the environment into an archive, returning the output path.
    pub fn pack(
        &self,
        options: &PackOptions,
        reporter: &dyn Reporter,
    ) -> Result<PathBuf, CondaPackError> {
        pack::pack_environment(self, options, reporter)
    }
}

impl<'a> IntoIterator for &'a Environment {
    type Item = &'a FileRecord;
    type IntoIter = std::slice::Iter<'a, FileRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
