//! Read-only view of the project the inspection tools operate on.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "dist", "build", "__pycache__"];

/// Extensions treated as searchable source or text.
const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "go", "java", "kt", "c", "h", "cc", "cpp",
    "hpp", "cs", "rb", "php", "swift", "json", "toml", "yaml", "yml", "md", "txt",
];

/// Files larger than this are not read.
const MAX_FILE_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ProjectRoot {
    root: PathBuf,
}

impl ProjectRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Resolve `path` against the root unless it is already absolute.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        }
    }

    /// `path` relative to the root, for display.
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Walk `dir` (defaults to the root), yielding source files in
    /// file-name order. Hidden entries and build/vendor directories are
    /// skipped.
    pub fn source_files(&self, dir: Option<&Path>) -> impl Iterator<Item = PathBuf> {
        let start = dir.map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
        WalkDir::new(start)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_ignored(entry))
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file() && is_source_file(entry.path()))
            .filter(|entry| {
                entry
                    .metadata()
                    .map(|m| m.len() <= MAX_FILE_BYTES)
                    .unwrap_or(false)
            })
            .map(DirEntry::into_path)
    }

    /// Walk the tree below the root down to `max_depth` levels, in
    /// file-name order, skipping the same entries as [`Self::source_files`].
    pub fn entries(&self, max_depth: usize) -> impl Iterator<Item = DirEntry> {
        WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_ignored(entry))
            .filter_map(Result::ok)
    }
}

/// Read a text file, returning `None` for missing, oversized or binary files.
pub fn read_text(path: &Path) -> Option<String> {
    let meta = std::fs::metadata(path).ok()?;
    if !meta.is_file() || meta.len() > MAX_FILE_BYTES {
        return None;
    }
    std::fs::read_to_string(path).ok()
}

fn is_ignored(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || (entry.file_type().is_dir() && SKIPPED_DIRS.contains(&name.as_ref()))
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_files_skip_hidden_and_vendor_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
        std::fs::write(root.join("node_modules/pkg/index.js"), "x").unwrap();
        std::fs::write(root.join(".git/config"), "x").unwrap();
        std::fs::write(root.join("logo.png"), [0u8, 1, 2]).unwrap();

        let project = ProjectRoot::new(root);
        let files: Vec<String> = project
            .source_files(None)
            .map(|p| project.relative(&p))
            .collect();
        assert_eq!(files, vec!["src/main.rs"]);
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let project = ProjectRoot::new("/work/project");
        assert_eq!(project.resolve("src/a.rs"), PathBuf::from("/work/project/src/a.rs"));
        assert_eq!(project.resolve("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }
}
