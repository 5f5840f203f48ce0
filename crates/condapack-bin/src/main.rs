use std::path::PathBuf;

use clap::Parser;
use condapack::{ArchiveFormat, Environment, LoadOptions, MissingCachePolicy, PackOptions, Reporter};
use miette::IntoDiagnostic;
use tracing_subscriber::{filter::LevelFilter, util::SubscriberInitExt, EnvFilter};

use crate::reporter::ConsoleReporter;

mod reporter;

/// Package an existing conda environment into a relocatable archive.
#[derive(Debug, Parser)]
#[clap(author, version, about, long_about = None)]
struct Opt {
    /// Name of the environment to pack
    #[clap(short, long, conflicts_with = "prefix")]
    name: Option<String>,

    /// Path to the environment to pack
    #[clap(short, long)]
    prefix: Option<PathBuf>,

    /// Path of the output archive [default: <environment name>.<format>]
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Archive format: zip, tar, tar.gz, tgz, tar.bz2 or tbz2 [default: inferred
    /// from the output suffix, falling back to zip]
    #[clap(long)]
    format: Option<String>,

    /// Name of the root directory inside the archive [default: the environment
    /// name]
    #[clap(long)]
    arcroot: Option<PathBuf>,

    /// Remove files matching this glob pattern (may be repeated)
    #[clap(long, value_name = "PATTERN")]
    exclude: Vec<String>,

    /// After exclusions, keep only files matching this glob pattern (may be
    /// repeated)
    #[clap(long, value_name = "PATTERN")]
    include: Vec<String>,

    /// Write a `<target> -> <placeholder>` relocation record to this path
    #[clap(long)]
    record: Option<PathBuf>,

    /// Store symbolic links as links in zip archives. Not every unzip
    /// implementation supports them
    #[clap(long)]
    zip_symlinks: bool,

    /// Proceed silently when installed packages are missing from the package
    /// cache
    #[clap(long)]
    ignore_missing_cache: bool,

    /// Report progress while collecting and packing
    #[clap(short, long)]
    verbose: bool,
}

fn main() -> miette::Result<()> {
    let opt = Opt::parse();

    // RUST_LOG wins over the verbosity flag, mirroring the library's tracing
    // channels when used without the CLI reporter.
    let default_filter = if opt.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_filter.into())
        .from_env()
        .into_diagnostic()?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .finish()
        .try_init()
        .into_diagnostic()?;

    let load_options = LoadOptions {
        unmanaged: true,
        on_missing_cache: if opt.ignore_missing_cache {
            MissingCachePolicy::Ignore
        } else {
            MissingCachePolicy::Warn
        },
    };

    let console = ConsoleReporter::plain();
    if opt.verbose {
        console.log("Collecting packages...");
    }

    let mut env = if let Some(prefix) = &opt.prefix {
        Environment::from_prefix(prefix, &load_options, &console).into_diagnostic()?
    } else if let Some(name) = &opt.name {
        Environment::from_name(name, &load_options, &console).into_diagnostic()?
    } else {
        Environment::from_default(&load_options, &console).into_diagnostic()?
    };

    for pattern in &opt.exclude {
        env = env.exclude_glob(pattern).into_diagnostic()?;
    }
    for pattern in &opt.include {
        env = env.filter_glob(pattern).into_diagnostic()?;
    }

    let format = opt
        .format
        .as_deref()
        .map(str::parse::<ArchiveFormat>)
        .transpose()
        .into_diagnostic()?;

    let pack_options = PackOptions {
        output: opt.output,
        format,
        arcroot: opt.arcroot,
        verbose: opt.verbose,
        record: opt.record,
        zip_symlinks: opt.zip_symlinks,
    };

    let progress = if opt.verbose {
        ConsoleReporter::with_progress(env.len() as u64)
    } else {
        ConsoleReporter::plain()
    };
    let output = env.pack(&pack_options, &progress).into_diagnostic()?;
    progress.finish();

    console.log(&format!(
        "Packed environment at {} to {}",
        env.prefix().display(),
        output.display()
    ));
    Ok(())
}
