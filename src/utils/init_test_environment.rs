use std::path::PathBuf;

use tempfile::TempDir;

/// make a scratch directory for a test image named `image_name`
/// # Return
/// the directory guard, removing everything when dropped,
/// and the path of the (not yet created) image inside it
pub fn init_test_environment(image_name: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temporary directory");
    let image_path = dir.path().join(image_name);
    (dir, image_path)
}
