//! Discovery of everything an environment holds on disk: the files every
//! installed package declares, plus whatever else ended up under the prefix.

mod managed;
mod python;
mod unmanaged;

use std::fmt;
use std::path::Path;

use condapack_types::CondaMetaRecord;

use crate::environment::{FileRecord, PrefixMode};
use crate::error::CondaPackError;
use crate::reporter::Reporter;

/// What to do when an installed package's cache entry has been cleared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingCachePolicy {
    /// Proceed silently.
    Ignore,
    /// Emit a warning through the reporter and continue.
    #[default]
    Warn,
    /// Fail the load with the list of affected packages.
    Raise,
}

/// Options controlling environment discovery.
#[derive(Clone, Copy, Debug)]
pub struct LoadOptions {
    /// Also collect files not claimed by any package.
    pub unmanaged: bool,

    /// Policy for packages whose package-cache entry no longer exists.
    pub on_missing_cache: MissingCachePolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            unmanaged: true,
            on_missing_cache: MissingCachePolicy::Warn,
        }
    }
}

/// A package recorded by the environment whose extracted archive is no
/// longer present in the package cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UncachedPackage {
    /// The package name.
    pub name: String,
    /// The package version.
    pub version: String,
    /// Where the package came from, when the record carries it.
    pub url: Option<String>,
}

impl fmt::Display for UncachedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "- {}={}  {}",
            self.name,
            self.version,
            self.url.as_deref().unwrap_or("")
        )
    }
}

/// Produces the complete file sequence for the environment at `prefix`:
/// managed files package by package (in `conda-meta` file-name order), then
/// unmanaged files in walk order.
pub(crate) fn load_environment(
    prefix: &Path,
    options: &LoadOptions,
    reporter: &dyn Reporter,
) -> Result<Vec<FileRecord>, CondaPackError> {
    if !prefix.exists() {
        return Err(CondaPackError::MissingPrefix(prefix.to_path_buf()));
    }
    if !prefix.join("conda-meta").exists() {
        return Err(CondaPackError::NotAnEnvironment(prefix.to_path_buf()));
    }

    let site_packages = python::find_site_packages(prefix)?;
    python::check_no_editable_packages(prefix, &site_packages)?;

    let mut files = Vec::new();
    let mut uncached = Vec::new();
    for record in CondaMetaRecord::collect_from_prefix(prefix)? {
        let cached_dir = record
            .link
            .as_ref()
            .map(|link| link.source.clone())
            .filter(|dir| dir.exists());
        match cached_dir {
            Some(pkg_dir) => {
                files.extend(managed::load_managed_package(
                    &record,
                    &pkg_dir,
                    prefix,
                    &site_packages,
                )?);
            }
            None => {
                // The cache entry is gone; fall back to scanning the
                // installed copies like unmanaged files.
                files.extend(record.files.iter().map(|relative| FileRecord {
                    source: prefix.join(relative),
                    target: relative.clone(),
                    is_conda: true,
                    prefix_mode: PrefixMode::Unknown,
                }));
                uncached.push(UncachedPackage {
                    name: record.name,
                    version: record.version,
                    url: record.url,
                });
            }
        }
    }

    if options.unmanaged {
        let extra = unmanaged::collect_unmanaged(prefix, &files)?;
        files.extend(extra);
    }

    if !uncached.is_empty() {
        match options.on_missing_cache {
            MissingCachePolicy::Ignore => {}
            MissingCachePolicy::Warn => reporter.warn(&uncached_warning(&uncached)),
            MissingCachePolicy::Raise => {
                return Err(CondaPackError::UncachedPackages(uncached));
            }
        }
    }

    Ok(files)
}

fn uncached_warning(packages: &[UncachedPackage]) -> String {
    format!(
        "{}\n\nContinuing with packing, treating these packages as if they \
         were unmanaged files (e.g. from `pip`). This is usually fine, but \
         may cause issues as prefixes aren't handled as robustly.",
        CondaPackError::UncachedPackages(packages.to_vec())
    )
}
