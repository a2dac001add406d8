//! # Utility Functions Module
//!
//! Small helpers shared by the invocation builder and the path resolver.

use std::path::Path;

/// Builds an argument vector from heterogeneous `ToString` items.
///
/// ```ignore
/// let fps = 15;
/// let args = args!["-vf", format!("fps={}", fps), "-y"];
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        vec![$(::std::string::ToString::to_string(&$item)),*]
    };
}

/// Path rendered as a single argument token.
pub fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// File stem, or `"output"` for paths without one.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

/// Extension including the leading dot, or an empty string.
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}
