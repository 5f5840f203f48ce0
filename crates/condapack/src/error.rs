use std::path::PathBuf;

use itertools::Itertools;

use crate::load::UncachedPackage;

/// The error type for everything that can go wrong while inspecting or
/// packing an environment.
#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum CondaPackError {
    #[error("cannot specify both a name and a prefix")]
    NameAndPrefix,

    #[error("environment path {0:?} doesn't exist")]
    MissingPrefix(PathBuf),

    #[error("path {0:?} is not a conda environment")]
    NotAnEnvironment(PathBuf),

    #[error("no python interpreter found in prefix {0:?}")]
    PythonNotFound(PathBuf),

    #[error("multiple python interpreters found in prefix {0:?}")]
    MultiplePythons(PathBuf),

    #[error("environment name {0:?} doesn't exist")]
    UnknownEnvironmentName(String),

    #[error(
        "cannot pack an environment with editable packages installed \
         (e.g. from `pip install -e`). Editable packages found:\n\n{}",
        bulleted(.0)
    )]
    EditablePackages(Vec<String>),

    #[error(
        "conda-managed packages were found without entries in the package \
         cache. This is usually due to `conda clean -p` being unaware of \
         symlinked or copied packages. Uncached packages:\n\n{}",
        .0.iter().join("\n")
    )]
    UncachedPackages(Vec<UncachedPackage>),

    #[error("file {0:?} already exists")]
    OutputExists(PathBuf),

    #[error("record file {0:?} already exists")]
    RecordExists(PathBuf),

    #[error("unknown archive format {0:?}")]
    UnknownFormat(String),

    #[error("failed to query the package manager for environment info")]
    CondaInfo(#[source] std::io::Error),

    #[error("malformed JSON metadata")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    HasPrefix(#[from] condapack_types::ParseHasPrefixError),

    #[error("invalid filter pattern")]
    Pattern(#[from] glob::PatternError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

fn bulleted(lines: &[String]) -> String {
    lines.iter().map(|line| format!("- {line}")).join("\n")
}
