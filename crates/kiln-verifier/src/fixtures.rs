//! Fixture extraction: each test run gets a fresh copy of the fixture
//! project so no state leaks between runs.

use std::fs;
use std::path::{Path, PathBuf};

use crate::{Result, VerifierError};

/// Copy `fixtures_root/<id>` into `dest` and return `dest`.
///
/// Fails with [`VerifierError::FixtureNotFound`] when the fixture directory
/// does not exist.
pub fn extract_fixture(fixtures_root: &Path, id: &str, dest: &Path) -> Result<PathBuf> {
    let src = fixtures_root.join(id);
    if !src.is_dir() {
        return Err(VerifierError::FixtureNotFound {
            id: id.to_string(),
            root: fixtures_root.to_path_buf(),
        });
    }

    tracing::debug!(
        target: "kiln.verifier",
        fixture = id,
        dest = %dest.display(),
        "extracting fixture"
    );
    copy_dir(&src, dest)?;
    Ok(dest.to_path_buf())
}

fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let path = entry.path();
        let target = dest.join(entry.file_name());
        if path.is_dir() {
            copy_dir(&path, &target)?;
        } else {
            fs::copy(&path, &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_nested_fixture_files() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("fixtures");
        fs::create_dir_all(root.join("sample").join("sub")).unwrap();
        fs::write(root.join("sample").join("pom-template.xml"), "<project/>").unwrap();
        fs::write(root.join("sample").join("sub").join("file.txt"), "x").unwrap();

        let dest = tmp.path().join("work");
        let extracted = extract_fixture(&root, "sample", &dest).unwrap();

        assert_eq!(extracted, dest);
        assert_eq!(
            fs::read_to_string(dest.join("pom-template.xml")).unwrap(),
            "<project/>"
        );
        assert_eq!(fs::read_to_string(dest.join("sub").join("file.txt")).unwrap(), "x");
    }

    #[test]
    fn missing_fixture_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let err = extract_fixture(tmp.path(), "mng-0000", &tmp.path().join("work")).unwrap_err();
        assert!(matches!(err, VerifierError::FixtureNotFound { ref id, .. } if id == "mng-0000"));
    }
}
