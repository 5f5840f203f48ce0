#![deny(missing_docs)]

//! Package an installed conda environment into a relocatable archive.
//!
//! An installed environment is tied to the absolute path it was created at:
//! thousands of its files embed that prefix, both in script text and inside
//! compiled objects. This crate enumerates the files of an environment,
//! classifies how each one embeds the prefix, rewrites what can safely be
//! rewritten at pack time (text substitution and `#!` interpreter lines) and
//! records the rest in a relocation manifest that the bundled activation
//! hook resolves at the extraction site.
//!
//! ```no_run
//! use condapack::{Environment, LoadOptions, PackOptions, TracingReporter};
//!
//! let reporter = TracingReporter;
//! let env = Environment::from_prefix("/opt/envs/science", &LoadOptions::default(), &reporter)?;
//! let archive = env.pack(&PackOptions::default(), &reporter)?;
//! # Ok::<_, condapack::CondaPackError>(())
//! ```

pub mod archive;
mod discovery;
mod environment;
mod error;
mod load;
mod pack;
pub mod relocate;
mod reporter;
mod scripts;

pub use archive::ArchiveFormat;
pub use environment::{Environment, FileRecord, PrefixMode};
pub use error::CondaPackError;
pub use load::{LoadOptions, MissingCachePolicy, UncachedPackage};
pub use pack::{PackOptions, MANIFEST_PATH};
pub use reporter::{Reporter, TracingReporter};

/// The directory holding executables inside a POSIX environment.
pub const BIN_DIR: &str = "bin";

/// Packages an environment resolved by name, by prefix, or (when neither is
/// given) the package manager's active default.
pub fn pack(
    name: Option<&str>,
    prefix: Option<&std::path::Path>,
    load_options: &LoadOptions,
    pack_options: &PackOptions,
    reporter: &dyn Reporter,
) -> Result<std::path::PathBuf, CondaPackError> {
    if pack_options.verbose {
        reporter.log("Collecting packages...");
    }

    let env = match (name, prefix) {
        (Some(_), Some(_)) => return Err(CondaPackError::NameAndPrefix),
        (None, Some(prefix)) => Environment::from_prefix(prefix, load_options, reporter)?,
        (Some(name), None) => Environment::from_name(name, load_options, reporter)?,
        (None, None) => Environment::from_default(load_options, reporter)?,
    };

    env.pack(pack_options, reporter)
}
