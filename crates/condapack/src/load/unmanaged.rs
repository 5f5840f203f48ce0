//! Discovery of files present under the prefix but not claimed by any
//! package.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use fs_err as fs;
use walkdir::WalkDir;

use super::python::python_source_of;
use crate::environment::{FileRecord, PrefixMode};
use crate::error::CondaPackError;

/// Top-level entries that are never part of a packed environment.
const IGNORED_TOP_LEVEL: &[&str] = &[
    "pkgs",
    "envs",
    "conda-bld",
    "conda-meta",
    ".conda_lock",
    "users",
    "LICENSE.txt",
    "info",
    "conda-recipes",
    ".index",
    ".unionfs",
    ".nonadmin",
    "python.app",
    "Launcher.app",
];

/// Files owned by the installer itself rather than any package.
const INSTALLER_FILES: &[&str] = &["bin/conda", "bin/activate", "bin/deactivate"];

/// Walks the environment tree and emits a record for every file no package
/// claims: regular files, symlinked directories (as entries, not descended)
/// and empty leaf directories.
pub(crate) fn collect_unmanaged(
    prefix: &Path,
    managed: &[FileRecord],
) -> Result<Vec<FileRecord>, CondaPackError> {
    let mut found = BTreeSet::new();

    for entry in fs::read_dir(prefix)? {
        let entry = entry?;
        let name = entry.file_name();
        if name
            .to_str()
            .is_some_and(|name| IGNORED_TOP_LEVEL.contains(&name))
        {
            continue;
        }
        let path = entry.path();
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            // A dangling top-level symlink; nothing to walk.
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => continue,
            Err(error) => return Err(error.into()),
        };
        if metadata.is_file() {
            found.insert(PathBuf::from(name));
            continue;
        }

        for walked in WalkDir::new(&path) {
            let Ok(walked) = walked else {
                continue;
            };
            let relative = walked
                .path()
                .strip_prefix(prefix)
                .expect("walked paths stay under the prefix")
                .to_path_buf();
            let file_type = walked.file_type();
            if file_type.is_file() || file_type.is_symlink() {
                found.insert(relative);
            } else if file_type.is_dir()
                && fs::read_dir(walked.path())?.next().is_none()
            {
                // Empty leaf directories are archived explicitly, otherwise
                // they would silently vanish from the extracted tree.
                found.insert(relative);
            }
        }
    }

    let managed_targets: HashSet<&Path> =
        managed.iter().map(|file| file.target.as_path()).collect();

    let mut records = Vec::new();
    for relative in found {
        if managed_targets.contains(relative.as_path()) {
            continue;
        }
        if INSTALLER_FILES.iter().any(|file| Path::new(file) == relative) {
            continue;
        }
        let text = relative.to_string_lossy();
        if text.ends_with('~') || text.ends_with(".DS_Store") {
            continue;
        }
        // Compiled artefacts whose source is managed travel with the source.
        if python_source_of(&relative)
            .is_some_and(|source| managed_targets.contains(source.as_path()))
        {
            continue;
        }
        records.push(FileRecord {
            source: prefix.join(&relative),
            target: relative,
            is_conda: false,
            prefix_mode: PrefixMode::Unknown,
        });
    }
    Ok(records)
}
