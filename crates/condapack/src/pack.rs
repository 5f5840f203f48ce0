use std::io::{Seek, Write};
use std::path::{Component, Path, PathBuf};

use fs_err as fs;

use condapack_types::FileMode;

use crate::archive::{ArchiveFormat, ArchiveWriter};
use crate::environment::{Environment, FileRecord, PrefixMode};
use crate::error::CondaPackError;
use crate::relocate::{replace_prefix, rewrite_shebang, ManifestEntry};
use crate::reporter::Reporter;
use crate::{scripts, BIN_DIR};

/// Archive-relative location of the relocation manifest consumed by the
/// activation hook.
pub const MANIFEST_PATH: &str = "conda-meta/relocate.manifest";

/// Options controlling a single pack call.
#[derive(Clone, Debug, Default)]
pub struct PackOptions {
    /// The output path. Defaults to `<environment name>.<format extension>`
    /// in the current directory.
    pub output: Option<PathBuf>,

    /// The archive format. Inferred from the output suffix when absent.
    pub format: Option<ArchiveFormat>,

    /// The directory name prefixed to every archive target. Defaults to the
    /// environment name.
    pub arcroot: Option<PathBuf>,

    /// Log progress through the reporter.
    pub verbose: bool,

    /// Duplicate the relocation manifest to this path, one
    /// `<target> -> <placeholder>` row per line.
    pub record: Option<PathBuf>,

    /// Store symbolic links as links in zip archives instead of
    /// dereferencing them. Ignored for the tar formats, which always
    /// preserve links.
    pub zip_symlinks: bool,
}

/// Drives every file record through classification, transformation and the
/// archive sink, then atomically moves the finished archive into place.
pub(crate) fn pack_environment(
    env: &Environment,
    options: &PackOptions,
    reporter: &dyn Reporter,
) -> Result<PathBuf, CondaPackError> {
    let arcroot = match &options.arcroot {
        Some(root) => strip_separators(root),
        None => PathBuf::from(env.name()),
    };

    let format = options
        .format
        .unwrap_or_else(|| ArchiveFormat::infer(options.output.as_deref()));
    let output = options
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.{}", env.name(), format.extension())));

    if output.exists() {
        return Err(CondaPackError::OutputExists(output));
    }
    if let Some(record) = &options.record {
        if record.exists() {
            return Err(CondaPackError::RecordExists(record.clone()));
        }
    }

    if options.verbose {
        reporter.log(&format!(
            "Packing environment at {:?} to {:?}",
            env.prefix(),
            output
        ));
    }

    // The temporary file lives next to the output so the final rename never
    // crosses a filesystem boundary.
    let out_dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::Builder::new()
        .prefix(".condapack-")
        .tempfile_in(out_dir)?;

    let manifest = match write_archive(
        env,
        temp.as_file_mut(),
        format,
        &arcroot,
        options.zip_symlinks,
        reporter,
    ) {
        Ok(manifest) => manifest,
        Err(error) => {
            // Writing failed; make sure no partial output survives.
            let _ = temp.close();
            return Err(error);
        }
    };

    if let Err(persist_error) = temp.persist_noclobber(&output) {
        let error = persist_error.error;
        let _ = persist_error.file.close();
        return Err(CondaPackError::Io(error));
    }

    if let Some(record_path) = &options.record {
        let rows: String = manifest
            .iter()
            .map(|entry| format!("{}\n", entry.record_line()))
            .collect();
        fs::write(record_path, rows)?;
    }

    Ok(output)
}

fn strip_separators(root: &Path) -> PathBuf {
    root.components()
        .filter(|component| matches!(component, Component::Normal(_)))
        .collect()
}

fn write_archive<W: Write + Seek>(
    env: &Environment,
    writer: W,
    format: ArchiveFormat,
    arcroot: &Path,
    zip_symlinks: bool,
    reporter: &dyn Reporter,
) -> Result<Vec<ManifestEntry>, CondaPackError> {
    let mut archive = ArchiveWriter::new(writer, format, arcroot, zip_symlinks);
    let prefix = env.prefix().to_string_lossy();
    let mut manifest = Vec::new();

    for record in env.files() {
        add_file(&mut archive, &mut manifest, record, &prefix, reporter)?;
        reporter.file_written(&record.target);
    }

    // The activation hooks land last, at fixed targets in the binary
    // directory.
    for (target, contents) in scripts::activation_scripts() {
        archive.add_bytes(None, contents.as_bytes(), Path::new(&target))?;
    }

    let manifest_text: String = manifest
        .iter()
        .map(|entry| format!("{}\n", entry.manifest_line()))
        .collect();
    archive.add_bytes(None, manifest_text.as_bytes(), Path::new(MANIFEST_PATH))?;

    archive.finish()?;
    Ok(manifest)
}

fn add_file<W: Write + Seek>(
    archive: &mut ArchiveWriter<W>,
    manifest: &mut Vec<ManifestEntry>,
    record: &FileRecord,
    prefix: &str,
    reporter: &dyn Reporter,
) -> Result<(), CondaPackError> {
    let metadata = fs::symlink_metadata(&record.source)?;
    if matches!(record.prefix_mode, PrefixMode::None)
        || metadata.file_type().is_symlink()
        || metadata.is_dir()
    {
        return archive.add(&record.source, &record.target);
    }

    match &record.prefix_mode {
        PrefixMode::Unknown => {
            let data = fs::read(&record.source)?;
            let (mut data, placeholder) = replace_prefix(data, prefix);
            if let Some(placeholder) = placeholder {
                let covered = if record.target.starts_with(BIN_DIR) {
                    let (rewritten, covered) =
                        rewrite_shebang(data, &record.target, placeholder, reporter);
                    data = rewritten;
                    covered
                } else {
                    false
                };
                if !covered {
                    manifest.push(ManifestEntry {
                        target: record.target.clone(),
                        placeholder: placeholder.to_string(),
                        file_mode: FileMode::Text,
                    });
                }
            }
            archive.add_bytes(Some(&record.source), &data, &record.target)
        }
        PrefixMode::Text { placeholder } => {
            if record.target.starts_with(BIN_DIR) {
                let data = fs::read(&record.source)?;
                let (data, covered) =
                    rewrite_shebang(data, &record.target, placeholder, reporter);
                if !covered {
                    manifest.push(ManifestEntry {
                        target: record.target.clone(),
                        placeholder: placeholder.clone(),
                        file_mode: FileMode::Text,
                    });
                }
                archive.add_bytes(Some(&record.source), &data, &record.target)
            } else {
                archive.add(&record.source, &record.target)?;
                manifest.push(ManifestEntry {
                    target: record.target.clone(),
                    placeholder: placeholder.clone(),
                    file_mode: FileMode::Text,
                });
                Ok(())
            }
        }
        PrefixMode::Binary { placeholder } => {
            archive.add(&record.source, &record.target)?;
            manifest.push(ManifestEntry {
                target: record.target.clone(),
                placeholder: placeholder.clone(),
                file_mode: FileMode::Binary,
            });
            Ok(())
        }
        PrefixMode::None => unreachable!("pass-through files are added by path above"),
    }
}

#[cfg(test)]
mod test {
    use super::strip_separators;
    use std::path::{Path, PathBuf};

    #[test]
    fn arcroot_separators_are_stripped() {
        assert_eq!(strip_separators(Path::new("/my/env/")), PathBuf::from("my/env"));
        assert_eq!(strip_separators(Path::new("env")), PathBuf::from("env"));
        assert_eq!(strip_separators(Path::new("/")), PathBuf::new());
    }
}
