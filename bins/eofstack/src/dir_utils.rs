//! Test suite discovery.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Returns all `.json` files under `path`, or `path` itself if it is a json file.
///
/// Files are returned sorted by path, so suites run in the same order on every platform.
pub fn find_all_json_tests(path: &Path) -> Vec<PathBuf> {
    WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == "json")
                .unwrap_or(false)
        })
        .map(DirEntry::into_path)
        .collect::<Vec<PathBuf>>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_fixture_suite() {
        let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
        let files = find_all_json_tests(&fixtures);
        assert!(files.iter().any(|f| f.ends_with("stack_validation.json")));
        assert!(files.iter().all(|f| f.extension().is_some_and(|ext| ext == "json")));

        let single = fixtures.join("stack_validation.json");
        assert_eq!(find_all_json_tests(&single), vec![single]);
    }
}
