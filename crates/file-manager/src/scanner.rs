use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

pub const DATA_FILE_EXTENSION: &str = "root";
pub const KEY_FILE_EXTENSION: &str = "key";

/// Lists the files with one extension directly inside a directory.
pub struct FileScanner {
    dir: PathBuf,
    extension: &'static str,
}

impl FileScanner {
    pub fn new(dir: impl AsRef<Path>, extension: &'static str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            extension,
        }
    }

    #[must_use]
    pub fn data_files(dir: impl AsRef<Path>) -> Self {
        Self::new(dir, DATA_FILE_EXTENSION)
    }

    #[must_use]
    pub fn key_files(dir: impl AsRef<Path>) -> Self {
        Self::new(dir, KEY_FILE_EXTENSION)
    }

    /// Matching files, sorted by path. Hidden files and subdirectories are
    /// skipped; symlinks count as the file they point to.
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let mut builder = WalkBuilder::new(&self.dir);
        builder
            .max_depth(Some(1))
            .follow_links(true)
            .hidden(true)
            .parents(false)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false);

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }
                    let path = entry.path();
                    if !self.has_extension(path) {
                        continue;
                    }
                    files.push(path.to_path_buf());
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        files.sort();
        log::debug!(
            "Found {} '*.{}' files in {}",
            files.len(),
            self.extension,
            self.dir.display()
        );
        files
    }

    fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == self.extension)
    }
}
