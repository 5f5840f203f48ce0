//! Expansion of a single installed package into file records.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use condapack_types::{
    noarch_kind, CondaMetaRecord, FileMode, HasPrefix, NoArchKind, PackageFiles, PathsJson,
};

use crate::environment::{FileRecord, PrefixMode};
use crate::error::CondaPackError;
use crate::BIN_DIR;

/// Turns one `conda-meta` record whose package-cache entry still exists into
/// file records sourced from the cache. Cache copies hold the pristine build
/// placeholder, which is what makes declared text/binary handling reliable.
pub(crate) fn load_managed_package(
    record: &CondaMetaRecord,
    pkg_dir: &Path,
    prefix: &Path,
    site_packages: &Path,
) -> Result<Vec<FileRecord>, CondaPackError> {
    let is_noarch_python = noarch_kind(pkg_dir)? == Some(NoArchKind::Python);

    let mut files = if pkg_dir.join("info/paths.json").exists() {
        PathsJson::from_package_directory(pkg_dir)?
            .paths
            .into_iter()
            .map(|entry| {
                managed_file(
                    is_noarch_python,
                    site_packages,
                    pkg_dir,
                    &entry.relative_path,
                    entry.prefix_placeholder,
                    entry.file_mode,
                )
            })
            .collect::<Vec<_>>()
    } else {
        let listed = PackageFiles::from_package_directory(pkg_dir)?;
        let mut overrides: HashMap<PathBuf, (String, FileMode)> = HashMap::new();
        if pkg_dir.join("info/has_prefix").exists() {
            for entry in HasPrefix::from_package_directory(pkg_dir)?.entries {
                overrides.insert(entry.relative_path, (entry.placeholder, entry.file_mode));
            }
        }
        listed
            .files
            .into_iter()
            .map(|relative| {
                let (placeholder, mode) = match overrides.get(&relative) {
                    Some((placeholder, mode)) => (Some(placeholder.clone()), Some(*mode)),
                    None => (None, None),
                };
                managed_file(is_noarch_python, site_packages, pkg_dir, &relative, placeholder, mode)
            })
            .collect()
    };

    // Noarch python installs generate files the package archive doesn't
    // carry (entry-point scripts, compiled modules). Those only exist inside
    // the environment itself and have to be scanned.
    if is_noarch_python {
        let seen: HashSet<PathBuf> = files.iter().map(|file| file.target.clone()).collect();
        for listed in &record.files {
            if seen.contains(listed) {
                continue;
            }
            let prefix_mode = if listed.starts_with(BIN_DIR) {
                PrefixMode::Unknown
            } else {
                PrefixMode::None
            };
            files.push(FileRecord {
                source: prefix.join(listed),
                target: listed.clone(),
                is_conda: true,
                prefix_mode,
            });
        }
    }

    Ok(files)
}

fn managed_file(
    is_noarch_python: bool,
    site_packages: &Path,
    pkg_dir: &Path,
    relative: &Path,
    placeholder: Option<String>,
    mode: Option<FileMode>,
) -> FileRecord {
    let target = if is_noarch_python {
        if let Ok(rest) = relative.strip_prefix("site-packages") {
            site_packages.join(rest)
        } else if let Ok(rest) = relative.strip_prefix("python-scripts") {
            Path::new(BIN_DIR).join(rest)
        } else {
            relative.to_path_buf()
        }
    } else {
        relative.to_path_buf()
    };

    // A declared mode without a recorded placeholder leaves nothing to
    // substitute; such entries pass through verbatim.
    let prefix_mode = match (mode, placeholder) {
        (Some(FileMode::Text), Some(placeholder)) => PrefixMode::Text { placeholder },
        (Some(FileMode::Binary), Some(placeholder)) => PrefixMode::Binary { placeholder },
        _ => PrefixMode::None,
    };

    FileRecord {
        source: pkg_dir.join(relative),
        target,
        is_conda: true,
        prefix_mode,
    }
}

#[cfg(test)]
mod test {
    use super::managed_file;
    use crate::environment::PrefixMode;
    use condapack_types::FileMode;
    use std::path::{Path, PathBuf};

    #[test]
    fn noarch_targets_are_remapped() {
        let site_packages = Path::new("lib/python3.11/site-packages");
        let pkg_dir = Path::new("/opt/conda/pkgs/pkg-1.0-0");

        let record = managed_file(
            true,
            site_packages,
            pkg_dir,
            Path::new("site-packages/pkg/__init__.py"),
            None,
            None,
        );
        assert_eq!(
            record.target,
            PathBuf::from("lib/python3.11/site-packages/pkg/__init__.py")
        );
        assert_eq!(
            record.source,
            PathBuf::from("/opt/conda/pkgs/pkg-1.0-0/site-packages/pkg/__init__.py")
        );

        let record = managed_file(
            true,
            site_packages,
            pkg_dir,
            Path::new("python-scripts/tool"),
            None,
            None,
        );
        assert_eq!(record.target, PathBuf::from("bin/tool"));

        let record = managed_file(
            true,
            site_packages,
            pkg_dir,
            Path::new("share/doc.txt"),
            None,
            None,
        );
        assert_eq!(record.target, PathBuf::from("share/doc.txt"));
    }

    #[test]
    fn arch_specific_targets_are_untouched() {
        let record = managed_file(
            false,
            Path::new("lib/python3.11/site-packages"),
            Path::new("/opt/conda/pkgs/pkg-1.0-0"),
            Path::new("site-packages/pkg/__init__.py"),
            None,
            None,
        );
        assert_eq!(record.target, PathBuf::from("site-packages/pkg/__init__.py"));
    }

    #[test]
    fn declared_modes_require_a_placeholder() {
        let with_placeholder = managed_file(
            false,
            Path::new("lib/python3.11/site-packages"),
            Path::new("/opt/conda/pkgs/pkg-1.0-0"),
            Path::new("bin/tool"),
            Some("/opt/build/placeholder".to_string()),
            Some(FileMode::Text),
        );
        assert_eq!(
            with_placeholder.prefix_mode,
            PrefixMode::Text { placeholder: "/opt/build/placeholder".to_string() }
        );

        let without_placeholder = managed_file(
            false,
            Path::new("lib/python3.11/site-packages"),
            Path::new("/opt/conda/pkgs/pkg-1.0-0"),
            Path::new("bin/tool"),
            None,
            Some(FileMode::Text),
        );
        assert_eq!(without_placeholder.prefix_mode, PrefixMode::None);
    }
}
