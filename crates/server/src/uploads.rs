use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempPath};

/// What a staged file holds; decides its name prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadKind {
    Source,
    Target,
    Result,
}

impl UploadKind {
    fn prefix(self) -> &'static str {
        match self {
            UploadKind::Source => "src_",
            UploadKind::Target => "tgt_",
            UploadKind::Result => "result_",
        }
    }
}

/// Stages request payloads under the upload directory with random,
/// collision-resistant names.
///
/// Staged files are deleted when their [`StagedFile`] is dropped unless the
/// store was created with `keep` set.
#[derive(Clone, Debug)]
pub struct UploadStore {
    dir: PathBuf,
    keep: bool,
}

/// A file written by [`UploadStore::stage`].
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    _temp: Option<TempPath>,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UploadStore {
    pub fn new(dir: &Path, keep: bool) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            keep,
        })
    }

    pub fn keeps_files(&self) -> bool {
        self.keep
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stage(&self, kind: UploadKind, bytes: &[u8]) -> io::Result<StagedFile> {
        let mut file = Builder::new()
            .prefix(kind.prefix())
            .suffix(".jpg")
            .tempfile_in(&self.dir)?;
        file.write_all(bytes)?;
        file.flush()?;

        let temp = file.into_temp_path();
        if self.keep {
            let path = temp.keep()?;
            log::debug!("Kept {}", path.display());
            Ok(StagedFile { path, _temp: None })
        } else {
            Ok(StagedFile {
                path: temp.to_path_buf(),
                _temp: Some(temp),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_new_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("uploads");
        UploadStore::new(&dir, false).unwrap();
        assert!(dir.is_dir());
    }

    #[rstest]
    #[case(UploadKind::Source, "src_")]
    #[case(UploadKind::Target, "tgt_")]
    #[case(UploadKind::Result, "result_")]
    fn test_staged_name_and_contents(#[case] kind: UploadKind, #[case] prefix: &str) {
        let tmp = TempDir::new().unwrap();
        let store = UploadStore::new(tmp.path(), false).unwrap();
        let staged = store.stage(kind, b"payload").unwrap();

        let name = staged.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(prefix), "{name}");
        assert!(name.ends_with(".jpg"), "{name}");
        assert_eq!(fs::read(staged.path()).unwrap(), b"payload");
    }

    #[test]
    fn test_staged_file_removed_on_drop() {
        let tmp = TempDir::new().unwrap();
        let store = UploadStore::new(tmp.path(), false).unwrap();
        let staged = store.stage(UploadKind::Source, b"x").unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        drop(staged);
        assert!(!path.exists());
        assert!(file_names(tmp.path()).is_empty());
    }

    #[test]
    fn test_keep_retains_file_after_drop() {
        let tmp = TempDir::new().unwrap();
        let store = UploadStore::new(tmp.path(), true).unwrap();
        assert!(store.keeps_files());
        let path = store.stage(UploadKind::Result, b"jpeg").unwrap().path().to_path_buf();
        assert!(path.exists());
    }

    #[test]
    fn test_names_do_not_collide() {
        let tmp = TempDir::new().unwrap();
        let store = UploadStore::new(tmp.path(), true).unwrap();
        for _ in 0..20 {
            store.stage(UploadKind::Source, b"same").unwrap();
        }
        assert_eq!(file_names(tmp.path()).len(), 20);
    }
}
