use std::path::Path;

use serde::Deserialize;

/// The two flavors of architecture-independent packages.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NoArchKind {
    /// Portable data, docs or source code with no interpreter coupling.
    Generic,
    /// A python package whose install targets are remapped into the
    /// interpreter's standard locations at link time.
    Python,
}

#[derive(Deserialize)]
struct NoArchMetadata {
    #[serde(default)]
    noarch: Option<NoArchField>,
}

#[derive(Deserialize)]
struct NoArchField {
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

/// Determines the noarch flavor of an extracted package by reading
/// `info/link.json`, falling back to the older `info/package_metadata.json`.
/// Returns `None` for architecture-specific packages.
pub fn noarch_kind(package_dir: &Path) -> Result<Option<NoArchKind>, std::io::Error> {
    for file_name in ["link.json", "package_metadata.json"] {
        let path = package_dir.join("info").join(file_name);
        let contents = match fs_err::read_to_string(&path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => continue,
            Err(error) => return Err(error),
        };
        let metadata: NoArchMetadata = serde_json::from_str(&contents)?;
        return Ok(metadata
            .noarch
            .and_then(|field| field.kind)
            .and_then(|kind| match kind.as_str() {
                "python" => Some(NoArchKind::Python),
                "generic" => Some(NoArchKind::Generic),
                _ => None,
            }));
    }
    Ok(None)
}
