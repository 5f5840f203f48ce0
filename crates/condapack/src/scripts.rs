//! Activation hooks shipped into every archive.

use crate::BIN_DIR;

const ACTIVATE: &str = include_str!("../scripts/activate");
const DEACTIVATE: &str = include_str!("../scripts/deactivate");

/// The helper scripts appended after every payload file, with their fixed
/// archive-relative targets, in archive order.
pub(crate) fn activation_scripts() -> [(String, &'static str); 2] {
    [
        (format!("{BIN_DIR}/activate"), ACTIVATE),
        (format!("{BIN_DIR}/deactivate"), DEACTIVATE),
    ]
}
