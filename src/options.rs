use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TargetOs {
    Linux,
    Macos,
    Windows,
}

impl TargetOs {
    pub fn current() -> Option<Self> {
        match std::env::consts::OS {
            "linux" => Some(Self::Linux),
            "macos" => Some(Self::Macos),
            "windows" => Some(Self::Windows),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Macos => "macos",
            Self::Windows => "windows",
        }
    }

    pub fn is_windows(&self) -> bool {
        *self == Self::Windows
    }
}

impl fmt::Display for TargetOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize, clap::ValueEnum)]
pub enum Arch {
    #[serde(rename = "x86")]
    #[value(name = "x86")]
    X86,

    #[serde(rename = "x86_64")]
    #[value(name = "x86_64")]
    X8664,
}

impl Arch {
    pub fn current() -> Option<Self> {
        match std::env::consts::ARCH {
            "x86" => Some(Self::X86),
            "x86_64" => Some(Self::X8664),
            _ => None,
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            Self::X86 => 32,
            Self::X8664 => 64,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize, clap::ValueEnum)]
pub enum BuildType {
    Debug,
    #[default]
    Release,
}

impl BuildType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "Debug",
            Self::Release => "Release",
        }
    }
}

/// Compiler wrapper names used when `parallel` is enabled.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MpiWrappers {
    pub cc: String,
    pub cxx: String,
}

impl Default for MpiWrappers {
    fn default() -> Self {
        Self {
            cc: "mpicc".to_string(),
            cxx: "mpicxx".to_string(),
        }
    }
}

impl MpiWrappers {
    /// Reads `MPICC` and `MPICXX`, falling back to the stock wrapper names.
    pub fn from_environment(environment: &BTreeMap<String, String>) -> Self {
        let defaults = Self::default();

        let pick = |key: &str, fallback: String| {
            environment
                .get(key)
                .filter(|value| !value.is_empty())
                .cloned()
                .unwrap_or(fallback)
        };

        Self {
            cc: pick("MPICC", defaults.cc),
            cxx: pick("MPICXX", defaults.cxx),
        }
    }
}

/// The build configuration for one invocation.
///
/// Built once from resolved settings and never mutated afterwards; every
/// planner takes it by shared reference.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BuildOptions {
    pub os: TargetOs,
    pub arch: Arch,
    pub compiler_version: String,
    pub build_type: BuildType,
    pub shared: bool,
    pub cxx: bool,
    pub parallel: bool,
    pub mpi: MpiWrappers,
    pub jobs: Option<usize>,
    pub zlib_root: Option<PathBuf>,
}

impl BuildOptions {
    pub fn new(os: TargetOs) -> Self {
        Self {
            os,
            arch: Arch::X8664,
            compiler_version: String::new(),
            build_type: BuildType::Release,
            shared: false,
            cxx: false,
            parallel: false,
            mpi: MpiWrappers::default(),
            jobs: None,
            zlib_root: None,
        }
    }
}

/// Snapshot of the process environment, used to seed plan execution.
pub fn environment_snapshot() -> BTreeMap<String, String> {
    std::env::vars().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mpi_wrappers_default_names() {
        let wrappers = MpiWrappers::from_environment(&BTreeMap::new());

        assert_eq!(wrappers.cc, "mpicc");
        assert_eq!(wrappers.cxx, "mpicxx");
    }

    #[test]
    fn mpi_wrappers_from_environment() {
        let environment = BTreeMap::from([
            ("MPICC".to_string(), "/opt/mpi/bin/mpicc".to_string()),
            ("MPICXX".to_string(), String::new()),
        ]);

        let wrappers = MpiWrappers::from_environment(&environment);

        assert_eq!(wrappers.cc, "/opt/mpi/bin/mpicc");
        assert_eq!(wrappers.cxx, "mpicxx");
    }

    #[test]
    fn macos_identifier() {
        assert_eq!(TargetOs::Macos.as_str(), "macos");
        assert!(TargetOs::Windows.is_windows());
    }
}
