//! Detection and rewriting of the embedded installation prefix.
//!
//! Text files are rewritten at pack time: every occurrence of the prefix is
//! substituted with the fixed placeholder token, and `#!` interpreter lines
//! in the binary directory are turned into their portable `/usr/bin/env`
//! form. Binary files are never touched here; their rewriting is length
//! sensitive and is deferred to extraction time through the manifest.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use condapack_types::{FileMode, PREFIX_PLACEHOLDER};

use crate::reporter::Reporter;

/// One row of the relocation manifest: a file whose prefix substitution is
/// finished at extraction time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    /// The archive target, relative to the archive root.
    pub target: PathBuf,
    /// The byte string to substitute with the extraction prefix.
    pub placeholder: String,
    /// Whether the substitution is textual or length-preserving binary.
    pub file_mode: FileMode,
}

impl ManifestEntry {
    /// The line consumed by the activation hook, in the same quoted
    /// `<placeholder> <mode> <path>` form as a package's `has_prefix` file.
    pub fn manifest_line(&self) -> String {
        format!(
            "{} {} {}",
            quote(&self.placeholder),
            self.file_mode,
            quote(&self.target.to_string_lossy())
        )
    }

    /// The `<target> -> <placeholder>` form used for the on-disk record
    /// file.
    pub fn record_line(&self) -> String {
        format!("{} -> {}", self.target.display(), self.placeholder)
    }
}

fn quote(value: &str) -> Cow<'_, str> {
    if value.chars().any(char::is_whitespace) {
        Cow::Owned(format!("\"{value}\""))
    } else {
        Cow::Borrowed(value)
    }
}

/// Substitutes every textual occurrence of `prefix` with the placeholder
/// token.
///
/// Returns the resulting bytes together with the placeholder when a
/// substitution happened. Buffers that do not decode as UTF-8 are binary
/// content and are returned untouched.
pub fn replace_prefix(data: Vec<u8>, prefix: &str) -> (Vec<u8>, Option<&'static str>) {
    match std::str::from_utf8(&data) {
        Ok(text) if text.contains(prefix) => (
            text.replace(prefix, PREFIX_PLACEHOLDER).into_bytes(),
            Some(PREFIX_PLACEHOLDER),
        ),
        _ => (data, None),
    }
}

/// Rewrites a leading `#!` interpreter line pointing under `prefix` to the
/// portable `#!/usr/bin/env <name>` form, preserving interpreter options.
///
/// Returns the (possibly rewritten) bytes and whether the shebang site fully
/// accounts for the file's prefix occurrences. When the prefix occurs more
/// than once a single shebang rewrite cannot cover the rest; a warning is
/// emitted and the bytes are returned unchanged so the manifest row can
/// finish the job after extraction.
pub fn rewrite_shebang(
    data: Vec<u8>,
    target: &Path,
    prefix: &str,
    reporter: &dyn Reporter,
) -> (Vec<u8>, bool) {
    let line_end = memchr::memchr(b'\n', &data).unwrap_or(data.len());
    let shebang = lazy_regex::regex!(r"(?-u)^#!(?: *)(/(?:\\ |[^ \n\r\t])*)(.*)$"B);
    let captures = match shebang.captures(&data[..line_end]) {
        Some(captures) => captures,
        None => return (data, false),
    };

    if memchr::memmem::find_iter(&data, prefix.as_bytes()).count() > 1 {
        reporter.warn(&format!(
            "Executable {:?} not fully relocatable without running prefix cleanup script.",
            target
        ));
        return (data, false);
    }

    let executable = captures.get(1).map_or(&b""[..], |m| m.as_bytes());
    if !executable.starts_with(prefix.as_bytes()) {
        // The interpreter lives outside the environment; nothing to rewrite
        // and nothing left for the manifest.
        return (data, true);
    }

    let name = executable
        .rsplit(|&byte| byte == b'/')
        .next()
        .unwrap_or(executable);
    let options = captures.get(2).map_or(&b""[..], |m| m.as_bytes());

    let mut rewritten = Vec::with_capacity(data.len());
    rewritten.extend_from_slice(b"#!/usr/bin/env ");
    rewritten.extend_from_slice(name);
    rewritten.extend_from_slice(options);
    rewritten.extend_from_slice(&data[line_end..]);
    (rewritten, true)
}

#[cfg(test)]
mod test {
    use super::{replace_prefix, rewrite_shebang, ManifestEntry};
    use crate::reporter::Reporter;
    use condapack_types::{FileMode, PREFIX_PLACEHOLDER};
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};

    #[derive(Default)]
    struct Collector {
        warnings: RefCell<Vec<String>>,
    }

    impl Reporter for Collector {
        fn warn(&self, message: &str) {
            self.warnings.borrow_mut().push(message.to_string());
        }

        fn log(&self, _message: &str) {}
    }

    #[test]
    fn replace_prefix_rewrites_text() {
        let (data, placeholder) =
            replace_prefix(b"home=/src/env\npath=/src/env/bin\n".to_vec(), "/src/env");
        assert_eq!(placeholder, Some(PREFIX_PLACEHOLDER));
        assert_eq!(
            data,
            format!("home={PREFIX_PLACEHOLDER}\npath={PREFIX_PLACEHOLDER}/bin\n").into_bytes()
        );
    }

    #[test]
    fn replace_prefix_leaves_binary_content_alone() {
        let mut raw = vec![0u8, 159, 146, 150];
        raw.extend_from_slice(b"/src/env");
        let (data, placeholder) = replace_prefix(raw.clone(), "/src/env");
        assert_eq!(placeholder, None);
        assert_eq!(data, raw);
    }

    #[test]
    fn replace_prefix_without_occurrence() {
        let (data, placeholder) = replace_prefix(b"nothing here\n".to_vec(), "/src/env");
        assert_eq!(placeholder, None);
        assert_eq!(data, b"nothing here\n");
    }

    #[test]
    fn shebang_is_rewritten_with_options() {
        let collector = Collector::default();
        let (data, covered) = rewrite_shebang(
            b"#!/ph/bin/python -E\nbody\n".to_vec(),
            Path::new("bin/tool"),
            "/ph",
            &collector,
        );
        assert!(covered);
        assert_eq!(data, b"#!/usr/bin/env python -E\nbody\n");
        assert!(collector.warnings.borrow().is_empty());
    }

    #[test]
    fn shebang_outside_prefix_is_left_alone_but_covered() {
        let collector = Collector::default();
        let (data, covered) = rewrite_shebang(
            b"#!/bin/sh\necho ok\n".to_vec(),
            Path::new("bin/tool"),
            "/ph",
            &collector,
        );
        assert!(covered);
        assert_eq!(data, b"#!/bin/sh\necho ok\n");
    }

    #[test]
    fn multiple_occurrences_warn_and_defer_to_manifest() {
        let collector = Collector::default();
        let original = b"#!/ph/bin/python\nimport sys; sys.path.append('/ph/lib')\n".to_vec();
        let (data, covered) =
            rewrite_shebang(original.clone(), Path::new("bin/tool"), "/ph", &collector);
        assert!(!covered);
        assert_eq!(data, original);
        assert_eq!(collector.warnings.borrow().len(), 1);
        assert!(collector.warnings.borrow()[0].contains("bin/tool"));
    }

    #[test]
    fn missing_shebang_is_not_covered() {
        let collector = Collector::default();
        let (data, covered) = rewrite_shebang(
            b"plain text\n".to_vec(),
            Path::new("bin/tool"),
            "/ph",
            &collector,
        );
        assert!(!covered);
        assert_eq!(data, b"plain text\n");
        assert!(collector.warnings.borrow().is_empty());
    }

    #[test]
    fn relative_interpreter_is_not_a_shebang_site() {
        let collector = Collector::default();
        let (_, covered) = rewrite_shebang(
            b"#!python\n".to_vec(),
            Path::new("bin/tool"),
            "/ph",
            &collector,
        );
        assert!(!covered);
    }

    #[test]
    fn manifest_lines_are_quoted_when_needed() {
        let entry = ManifestEntry {
            target: PathBuf::from("lib/lib x.so"),
            placeholder: "/opt/build/placeholder".to_string(),
            file_mode: FileMode::Binary,
        };
        assert_eq!(
            entry.manifest_line(),
            "/opt/build/placeholder binary \"lib/lib x.so\""
        );
        assert_eq!(
            entry.record_line(),
            "lib/lib x.so -> /opt/build/placeholder"
        );
    }
}
