#![deny(missing_docs)]

//! Data types for the on-disk metadata of conda-style environments and
//! package archives: the records an installation keeps in `conda-meta/`, the
//! path manifests shipped inside extracted packages, and the placeholder
//! conventions used for prefix relocation.

mod conda_meta;
mod has_prefix;
mod no_arch;
mod paths;

pub use conda_meta::{CondaMetaRecord, Link};
pub use has_prefix::{HasPrefix, HasPrefixEntry, ParseHasPrefixError};
pub use no_arch::{noarch_kind, NoArchKind};
pub use paths::{FileMode, PackageFiles, ParseFileModeError, PathType, PathsEntry, PathsJson};

/// The byte string standing in for the installation prefix inside archived
/// files, substituted with the real extraction path at unpack time.
///
/// Assembled from two pieces so the token never appears verbatim in this
/// crate's own source files.
pub const PREFIX_PLACEHOLDER: &str = concat!("/opt/anaconda1", "anaconda2anaconda3");
