use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("options `cxx` and `parallel` cannot be enabled together")]
    IncompatibleOptions,

    #[error("unknown hdf5 version: {0}")]
    UnknownVersion(String),

    #[error("unsupported operating system: {0}")]
    UnsupportedOs(String),

    #[error("unsupported architecture: {0}")]
    UnsupportedArch(String),

    #[error("failed to read settings from {path}: {reason}")]
    Settings { path: PathBuf, reason: String },
}

#[derive(thiserror::Error, Debug)]
pub enum AcquisitionError {
    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("{algorithm} mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        algorithm: String,
        expected: String,
        actual: String,
    },

    #[error("failed to extract {archive}: {reason}")]
    Extract { archive: PathBuf, reason: String },

    #[error("extracted archive has no folder named {0}")]
    MissingFolder(String),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unsupported Visual Studio compiler version `{version}` (expected 14, 15 or 16)")]
pub struct UnsupportedCompilerError {
    pub version: String,
}

#[derive(thiserror::Error, Debug)]
pub enum BuildToolError {
    #[error("failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("{program} exited with {}: {last_line}", describe_exit(.code))]
    Failed {
        program: String,
        code: Option<i32>,
        last_line: String,
    },

    #[error("pattern `{search}` not found in {path}")]
    PatchNotApplicable { path: PathBuf, search: String },

    #[error("failed to {operation} {path}: {reason}")]
    FileOperation {
        operation: &'static str,
        path: PathBuf,
        reason: String,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "signal".to_string(),
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RecipeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    UnsupportedCompiler(#[from] UnsupportedCompilerError),

    #[error(transparent)]
    BuildTool(#[from] BuildToolError),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RecipeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RecipeError::Io {
            path: path.into(),
            source,
        }
    }
}
