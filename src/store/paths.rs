use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const SOURCE_SUBFOLDER: &str = "source_subfolder";
pub const BUILD_SUBFOLDER: &str = "build_subfolder";
pub const INSTALL_FOLDER: &str = "install";
pub const PACKAGE_FOLDER: &str = "package";

/// Directory layout of one build invocation.
#[derive(Clone, Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    pub fn source(&self) -> PathBuf {
        self.root.join(SOURCE_SUBFOLDER)
    }

    pub fn build(&self) -> PathBuf {
        self.root.join(BUILD_SUBFOLDER)
    }

    pub fn install(&self) -> InstallTree {
        InstallTree::new(self.root.join(INSTALL_FOLDER))
    }

    pub fn package(&self) -> PathBuf {
        self.root.join(PACKAGE_FOLDER)
    }
}

/// The staging tree populated by `make install` or the unpacked installer.
#[derive(Clone, Debug)]
pub struct InstallTree {
    root: PathBuf,
}

impl InstallTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn include(&self) -> PathBuf {
        self.root.join("include")
    }

    pub fn lib(&self) -> PathBuf {
        self.root.join("lib")
    }
}

/// Regular files below `source`, relative to it and sorted.
pub fn get_relative_files(source: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(source)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| !entry.file_type().is_dir())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(source)
                .ok()
                .map(|path| path.to_path_buf())
        })
        .collect();

    files.sort();

    files
}
