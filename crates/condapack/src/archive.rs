//! Streaming archive sinks for the four supported output formats.
//!
//! Every sink accepts files by path (streamed from disk, preserving
//! permissions, symlinks and directory entries) or as in-memory buffers for
//! content the packer rewrote. Targets are prefixed with the archive-root
//! directory handed to [`ArchiveWriter::new`].

use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bzip2::write::BzEncoder;
use flate2::write::GzEncoder;
use fs_err as fs;
use itertools::Itertools;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::CondaPackError;

/// The archive formats the packer can emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// A zip archive, optionally storing symlinks as links.
    Zip,
    /// An uncompressed tar archive.
    Tar,
    /// A gzip-compressed tar archive.
    TarGz,
    /// A bzip2-compressed tar archive.
    TarBz2,
}

impl ArchiveFormat {
    /// Infers the format from the output file name, defaulting to zip for
    /// unknown suffixes (and for a missing output path).
    pub fn infer(output: Option<&Path>) -> Self {
        let Some(name) = output.and_then(Path::file_name).and_then(|name| name.to_str()) else {
            return Self::Zip;
        };
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Self::TarGz
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
            Self::TarBz2
        } else if name.ends_with(".tar") {
            Self::Tar
        } else {
            Self::Zip
        }
    }

    /// The canonical file suffix for the format.
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::TarBz2 => "tar.bz2",
        }
    }
}

impl FromStr for ArchiveFormat {
    type Err = CondaPackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zip" => Ok(ArchiveFormat::Zip),
            "tar" => Ok(ArchiveFormat::Tar),
            "tar.gz" | "tgz" => Ok(ArchiveFormat::TarGz),
            "tar.bz2" | "tbz2" => Ok(ArchiveFormat::TarBz2),
            other => Err(CondaPackError::UnknownFormat(other.to_string())),
        }
    }
}

enum TarStream<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
    Bzip2(BzEncoder<W>),
}

impl<W: Write> Write for TarStream<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TarStream::Plain(writer) => writer.write(buf),
            TarStream::Gzip(writer) => writer.write(buf),
            TarStream::Bzip2(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TarStream::Plain(writer) => writer.flush(),
            TarStream::Gzip(writer) => writer.flush(),
            TarStream::Bzip2(writer) => writer.flush(),
        }
    }
}

impl<W: Write> TarStream<W> {
    fn finish(self) -> io::Result<W> {
        match self {
            TarStream::Plain(writer) => Ok(writer),
            TarStream::Gzip(encoder) => encoder.finish(),
            TarStream::Bzip2(encoder) => encoder.finish(),
        }
    }
}

/// A scoped archive sink: entries are added one at a time and the archive is
/// sealed by [`ArchiveWriter::finish`].
pub struct ArchiveWriter<W: Write + Seek> {
    root: PathBuf,
    inner: Inner<W>,
}

enum Inner<W: Write + Seek> {
    Zip { writer: ZipWriter<W>, symlinks: bool },
    Tar(tar::Builder<TarStream<W>>),
}

impl<W: Write + Seek> ArchiveWriter<W> {
    /// Creates a sink for `format` writing through `writer`. Every target is
    /// placed under the `root` directory inside the archive.
    pub fn new(writer: W, format: ArchiveFormat, root: &Path, zip_symlinks: bool) -> Self {
        let inner = match format {
            ArchiveFormat::Zip => Inner::Zip {
                writer: ZipWriter::new(writer),
                symlinks: zip_symlinks,
            },
            ArchiveFormat::Tar => Inner::Tar(tar_builder(TarStream::Plain(writer))),
            ArchiveFormat::TarGz => Inner::Tar(tar_builder(TarStream::Gzip(GzEncoder::new(
                writer,
                flate2::Compression::default(),
            )))),
            ArchiveFormat::TarBz2 => Inner::Tar(tar_builder(TarStream::Bzip2(BzEncoder::new(
                writer,
                bzip2::Compression::default(),
            )))),
        };
        Self {
            root: root.to_path_buf(),
            inner,
        }
    }

    /// Streams a file, directory entry or symlink from disk into the
    /// archive.
    pub fn add(&mut self, source: &Path, target: &Path) -> Result<(), CondaPackError> {
        let target = self.root.join(target);
        match &mut self.inner {
            Inner::Tar(builder) => {
                builder.append_path_with_name(source, &target)?;
                Ok(())
            }
            Inner::Zip { writer, symlinks } => {
                let metadata = fs::symlink_metadata(source)?;
                if metadata.file_type().is_symlink() {
                    let destination = fs::read_link(source)?;
                    if *symlinks {
                        writer.add_symlink(
                            entry_name(&target),
                            destination.to_string_lossy().into_owned(),
                            entry_options(&metadata),
                        )?;
                        return Ok(());
                    }
                    // The zip standard has no portable symlink story; store
                    // the resolved contents instead.
                    return match fs::metadata(source) {
                        Ok(resolved) if resolved.is_dir() => {
                            writer.add_directory(entry_name(&target), entry_options(&resolved))?;
                            Ok(())
                        }
                        Ok(resolved) => {
                            writer.start_file(entry_name(&target), entry_options(&resolved))?;
                            io::copy(&mut fs::File::open(source)?, writer)?;
                            Ok(())
                        }
                        // A dangling link can only be preserved as a link.
                        Err(_) => {
                            writer.add_symlink(
                                entry_name(&target),
                                destination.to_string_lossy().into_owned(),
                                entry_options(&metadata),
                            )?;
                            Ok(())
                        }
                    };
                }
                if metadata.is_dir() {
                    writer.add_directory(entry_name(&target), entry_options(&metadata))?;
                } else {
                    writer.start_file(entry_name(&target), entry_options(&metadata))?;
                    io::copy(&mut fs::File::open(source)?, writer)?;
                }
                Ok(())
            }
        }
    }

    /// Streams an in-memory buffer as the target's contents. `source` is
    /// advisory and only consulted for permissions and timestamps.
    pub fn add_bytes(
        &mut self,
        source: Option<&Path>,
        data: &[u8],
        target: &Path,
    ) -> Result<(), CondaPackError> {
        let target = self.root.join(target);
        let metadata = source.and_then(|path| fs::metadata(path).ok());
        match &mut self.inner {
            Inner::Tar(builder) => {
                let mut header = tar::Header::new_gnu();
                match &metadata {
                    Some(metadata) => header.set_metadata(metadata),
                    None => {
                        header.set_mode(0o755);
                        header.set_mtime(0);
                    }
                }
                header.set_size(data.len() as u64);
                header.set_cksum();
                builder.append_data(&mut header, &target, data)?;
                Ok(())
            }
            Inner::Zip { writer, .. } => {
                let options = match &metadata {
                    Some(metadata) => entry_options(metadata),
                    None => SimpleFileOptions::default()
                        .compression_method(zip::CompressionMethod::Deflated)
                        .unix_permissions(0o755),
                };
                writer.start_file(entry_name(&target), options)?;
                writer.write_all(data)?;
                Ok(())
            }
        }
    }

    /// Seals the archive and hands back the underlying writer.
    pub fn finish(self) -> Result<W, CondaPackError> {
        match self.inner {
            Inner::Zip { writer, .. } => Ok(writer.finish()?),
            Inner::Tar(builder) => Ok(builder.into_inner()?.finish()?),
        }
    }
}

fn tar_builder<W: Write>(stream: TarStream<W>) -> tar::Builder<TarStream<W>> {
    let mut builder = tar::Builder::new(stream);
    builder.follow_symlinks(false);
    builder
}

/// Forward-slash entry name for zip archives.
fn entry_name(target: &Path) -> String {
    target
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .join("/")
}

fn entry_options(metadata: &std::fs::Metadata) -> SimpleFileOptions {
    use std::os::unix::fs::PermissionsExt;

    SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(metadata.permissions().mode())
}

#[cfg(test)]
mod test {
    use super::{ArchiveFormat, ArchiveWriter};
    use std::collections::BTreeMap;
    use std::io::{Cursor, Read};
    use std::path::{Path, PathBuf};

    fn source_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.txt"), "hello").unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();
        std::os::unix::fs::symlink("doc.txt", dir.path().join("alias")).unwrap();
        dir
    }

    fn write_archive(format: ArchiveFormat, zip_symlinks: bool) -> Vec<u8> {
        let source = source_tree();
        let mut writer = ArchiveWriter::new(
            Cursor::new(Vec::new()),
            format,
            Path::new("env"),
            zip_symlinks,
        );
        writer
            .add(&source.path().join("doc.txt"), Path::new("share/doc.txt"))
            .unwrap();
        writer
            .add(&source.path().join("empty"), Path::new("share/empty"))
            .unwrap();
        writer
            .add(&source.path().join("alias"), Path::new("share/alias"))
            .unwrap();
        writer
            .add_bytes(
                Some(&source.path().join("doc.txt")),
                b"rewritten",
                Path::new("bin/tool"),
            )
            .unwrap();
        writer
            .add_bytes(None, b"#!/bin/sh\n", Path::new("bin/activate"))
            .unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn tar_entries(reader: impl Read) -> BTreeMap<PathBuf, (Vec<u8>, tar::EntryType)> {
        let mut archive = tar::Archive::new(reader);
        let mut entries = BTreeMap::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().into_owned();
            let entry_type = entry.header().entry_type();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            entries.insert(path, (data, entry_type));
        }
        entries
    }

    fn assert_tar_contents(entries: &BTreeMap<PathBuf, (Vec<u8>, tar::EntryType)>) {
        assert_eq!(entries[Path::new("env/share/doc.txt")].0, b"hello");
        assert_eq!(entries[Path::new("env/bin/tool")].0, b"rewritten");
        assert_eq!(entries[Path::new("env/bin/activate")].0, b"#!/bin/sh\n");
        assert_eq!(
            entries[Path::new("env/share/empty")].1,
            tar::EntryType::Directory
        );
        assert_eq!(
            entries[Path::new("env/share/alias")].1,
            tar::EntryType::Symlink
        );
    }

    #[test]
    fn tar_round_trip() {
        let bytes = write_archive(ArchiveFormat::Tar, false);
        assert_tar_contents(&tar_entries(Cursor::new(bytes)));
    }

    #[test]
    fn tar_gz_round_trip() {
        let bytes = write_archive(ArchiveFormat::TarGz, false);
        let decoder = flate2::read::GzDecoder::new(Cursor::new(bytes));
        assert_tar_contents(&tar_entries(decoder));
    }

    #[test]
    fn tar_bz2_round_trip() {
        let bytes = write_archive(ArchiveFormat::TarBz2, false);
        let decoder = bzip2::read::BzDecoder::new(Cursor::new(bytes));
        assert_tar_contents(&tar_entries(decoder));
    }

    #[test]
    fn zip_round_trip_dereferences_links() {
        let bytes = write_archive(ArchiveFormat::Zip, false);
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();

        let mut contents = String::new();
        archive
            .by_name("env/share/doc.txt")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "hello");

        // Without zip_symlinks the alias is stored as a copy of its target.
        let mut contents = String::new();
        archive
            .by_name("env/share/alias")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "hello");

        assert!(archive.by_name("env/share/empty/").is_ok());
    }

    #[test]
    fn zip_round_trip_preserves_links_on_request() {
        let bytes = write_archive(ArchiveFormat::Zip, true);
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();

        // Symlink entries carry the link destination as their contents.
        let mut destination = String::new();
        archive
            .by_name("env/share/alias")
            .unwrap()
            .read_to_string(&mut destination)
            .unwrap();
        assert_eq!(destination, "doc.txt");
    }

    #[test]
    fn formats_are_inferred_from_suffixes() {
        for (name, expected) in [
            ("env.zip", ArchiveFormat::Zip),
            ("env.tar", ArchiveFormat::Tar),
            ("env.tar.gz", ArchiveFormat::TarGz),
            ("env.tgz", ArchiveFormat::TarGz),
            ("env.tar.bz2", ArchiveFormat::TarBz2),
            ("env.tbz2", ArchiveFormat::TarBz2),
            ("env.custom", ArchiveFormat::Zip),
        ] {
            assert_eq!(ArchiveFormat::infer(Some(Path::new(name))), expected);
        }
        assert_eq!(ArchiveFormat::infer(None), ArchiveFormat::Zip);
    }

    #[test]
    fn explicit_formats_must_be_known() {
        assert_eq!("tgz".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::TarGz);
        assert!("rar".parse::<ArchiveFormat>().is_err());
    }
}
