//! On-disk file access for one storage node. Every filename arriving over
//! the wire is reduced to its basename before touching disk, so a client
//! sending `"../../evil"` can only ever write `<storage_dir>/evil` — this
//! is the only thing standing between a malicious filename and path
//! traversal (spec §4.2).

use std::path::{Path, PathBuf};

/// The final path component of `filename`, with any leading path
/// separators and `..` segments stripped away by taking only the last
/// component `Path` itself ever reports.
pub fn basename(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

pub fn resolve(storage_dir: &Path, filename: &str) -> PathBuf {
    storage_dir.join(basename(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_strips_path_traversal() {
        assert_eq!(basename("../../evil"), "evil");
        assert_eq!(basename("a/b/c.txt"), "c.txt");
        assert_eq!(basename("plain.txt"), "plain.txt");
    }

    #[test]
    fn resolve_stays_within_storage_dir() {
        let dir = Path::new("storage_node1");
        assert_eq!(resolve(dir, "../../evil"), PathBuf::from("storage_node1/evil"));
    }
}
