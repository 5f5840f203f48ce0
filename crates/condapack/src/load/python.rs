//! Interpreter-specific discovery: the site-packages directory, editable
//! installs, and the sources of compiled modules.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use fs_err as fs;

use condapack_types::CondaMetaRecord;

use crate::error::CondaPackError;

/// Locates `lib/python<major.minor>/site-packages` from the single `python`
/// record in `conda-meta`. Zero or multiple interpreters is an error.
pub(crate) fn find_site_packages(prefix: &Path) -> Result<PathBuf, CondaPackError> {
    let mut versions = Vec::new();
    for entry in fs::read_dir(prefix.join("conda-meta"))? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if !file_name.starts_with("python-") || !file_name.ends_with(".json") {
            continue;
        }
        let record = CondaMetaRecord::from_path(entry.path())?;
        if record.name == "python" {
            versions.push(record.version);
        }
    }

    match versions.as_slice() {
        [] => Err(CondaPackError::PythonNotFound(prefix.to_path_buf())),
        [version] => {
            let major_minor = version.split('.').take(2).collect::<Vec<_>>().join(".");
            Ok(PathBuf::from(format!("lib/python{major_minor}/site-packages")))
        }
        _ => Err(CondaPackError::MultiplePythons(prefix.to_path_buf())),
    }
}

/// Fails when any `.pth` file in site-packages points outside the prefix,
/// which is how editable installs hook themselves into the interpreter.
pub(crate) fn check_no_editable_packages(
    prefix: &Path,
    site_packages: &Path,
) -> Result<(), CondaPackError> {
    let directory = prefix.join(site_packages);
    let entries = match fs::read_dir(&directory) {
        Ok(entries) => entries,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(error.into()),
    };

    let mut editable = BTreeSet::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().map_or(true, |ext| ext != "pth") {
            continue;
        }
        for line in fs::read_to_string(&path)?.lines() {
            if line.starts_with('#') {
                continue;
            }
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            let location = normalize(&directory.join(line));
            if !location.starts_with(prefix) {
                editable.insert(line.to_string());
            }
        }
    }

    if editable.is_empty() {
        Ok(())
    } else {
        Err(CondaPackError::EditablePackages(editable.into_iter().collect()))
    }
}

/// Lexical path normalization, resolving `.` and `..` without consulting the
/// filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// The `.py` source a compiled `.pyc`/`.pyo` artefact was generated from,
/// accounting for the `__pycache__` tag suffix layout.
pub(crate) fn python_source_of(path: &Path) -> Option<PathBuf> {
    let file_name = path.file_name()?.to_str()?;
    let stem = file_name
        .strip_suffix(".pyc")
        .or_else(|| file_name.strip_suffix(".pyo"))?;
    let parent = path.parent().unwrap_or(Path::new(""));
    if parent.file_name() == Some(OsStr::new("__pycache__")) {
        let module = stem.split_once('.').map_or(stem, |(module, _tag)| module);
        Some(parent.parent().unwrap_or(Path::new("")).join(format!("{module}.py")))
    } else {
        Some(path.with_extension("py"))
    }
}

#[cfg(test)]
mod test {
    use super::{normalize, python_source_of};
    use rstest::rstest;
    use std::path::{Path, PathBuf};

    #[rstest]
    #[case::pycache("lib/python3.11/foo/__pycache__/bar.cpython-311.pyc", "lib/python3.11/foo/bar.py")]
    #[case::pycache_pyo("pkg/__pycache__/mod.cpython-311.opt-1.pyo", "pkg/mod.py")]
    #[case::legacy_same_dir("lib/python3.11/foo/bar.pyc", "lib/python3.11/foo/bar.py")]
    fn compiled_sources(#[case] compiled: &str, #[case] source: &str) {
        assert_eq!(python_source_of(Path::new(compiled)), Some(PathBuf::from(source)));
    }

    #[rstest]
    #[case::pycache_opt_tag("pkg/__pycache__/mod.cpython-311.opt-1.pyc")]
    fn compiled_sources_strip_every_tag(#[case] compiled: &str) {
        assert_eq!(python_source_of(Path::new(compiled)), Some(PathBuf::from("pkg/mod.py")));
    }

    #[test]
    fn plain_files_have_no_compiled_source() {
        assert_eq!(python_source_of(Path::new("lib/module.py")), None);
        assert_eq!(python_source_of(Path::new("bin/tool")), None);
    }

    #[test]
    fn normalize_resolves_dots() {
        assert_eq!(
            normalize(Path::new("/src/env/lib/../lib64/./x")),
            PathBuf::from("/src/env/lib64/x")
        );
    }
}
