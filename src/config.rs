use crate::error::ConfigError;
use crate::options::{Arch, BuildOptions, BuildType, MpiWrappers, TargetOs};
use crate::source::DEFAULT_VERSION;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const PROJECT_SETTINGS_FILE: &str = "Recipe.toml";

/// One layer of recipe settings.
///
/// Every field is optional so a layer only carries what it sets; layers are
/// combined with [`RecipeSettings::merge`].
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RecipeSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<TargetOs>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<Arch>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_type: Option<BuildType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cxx: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub zlib_root: Option<PathBuf>,
}

impl RecipeSettings {
    /// Built-in defaults. `os` and `arch` come from the host and stay unset
    /// on hosts the recipe does not know.
    pub fn defaults() -> Self {
        Self {
            version: Some(DEFAULT_VERSION.to_string()),
            os: TargetOs::current(),
            arch: Arch::current(),
            compiler_version: None,
            build_type: Some(BuildType::Release),
            shared: Some(false),
            cxx: Some(false),
            parallel: Some(false),
            jobs: None,
            zlib_root: None,
        }
    }

    /// Values in `other` win over values in `self`.
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            version: other.version.clone().or_else(|| self.version.clone()),
            os: other.os.or(self.os),
            arch: other.arch.or(self.arch),
            compiler_version: other
                .compiler_version
                .clone()
                .or_else(|| self.compiler_version.clone()),
            build_type: other.build_type.or(self.build_type),
            shared: other.shared.or(self.shared),
            cxx: other.cxx.or(self.cxx),
            parallel: other.parallel.or(self.parallel),
            jobs: other.jobs.or(self.jobs),
            zlib_root: other.zlib_root.clone().or_else(|| self.zlib_root.clone()),
        }
    }

    /// Turns the merged layers into build options. `environment` supplies
    /// the MPI wrapper names.
    pub fn resolve(
        &self,
        environment: &BTreeMap<String, String>,
    ) -> Result<ResolvedSettings, ConfigError> {
        let os = self
            .os
            .ok_or_else(|| ConfigError::UnsupportedOs(std::env::consts::OS.to_string()))?;

        // Only the Visual Studio generator depends on the architecture.
        let arch = match (self.arch, os) {
            (Some(arch), _) => arch,
            (None, TargetOs::Windows) => {
                return Err(ConfigError::UnsupportedArch(
                    std::env::consts::ARCH.to_string(),
                ))
            }
            (None, _) => Arch::X8664,
        };

        let options = BuildOptions {
            os,
            arch,
            compiler_version: self.compiler_version.clone().unwrap_or_default(),
            build_type: self.build_type.unwrap_or_default(),
            shared: self.shared.unwrap_or_default(),
            cxx: self.cxx.unwrap_or_default(),
            parallel: self.parallel.unwrap_or_default(),
            mpi: MpiWrappers::from_environment(environment),
            jobs: self.jobs,
            zlib_root: self.zlib_root.clone(),
        };

        Ok(ResolvedSettings {
            version: self
                .version
                .clone()
                .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            options,
        })
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedSettings {
    pub version: String,
    pub options: BuildOptions,
}

/// Load the `[options]` table of a `Recipe.toml`.
///
/// A missing file or a file without `[options]` yields an empty layer.
pub fn load_project_settings(path: &Path) -> Result<RecipeSettings, ConfigError> {
    if !path.exists() {
        return Ok(RecipeSettings::default());
    }

    let settings_error = |reason: String| ConfigError::Settings {
        path: path.to_path_buf(),
        reason,
    };

    let contents = fs::read_to_string(path).map_err(|err| settings_error(err.to_string()))?;

    let table: toml::Table = toml::from_str(&contents).map_err(|err| settings_error(err.to_string()))?;

    match table.get("options") {
        Some(options) => options
            .clone()
            .try_into()
            .map_err(|err: toml::de::Error| settings_error(err.to_string())),
        None => Ok(RecipeSettings::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_settings(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join(PROJECT_SETTINGS_FILE);
        fs::write(&path, contents).unwrap();
        (temp, path)
    }

    #[test]
    fn defaults_are_release_static_serial() {
        let defaults = RecipeSettings::defaults();

        assert_eq!(defaults.version.as_deref(), Some("1.10.5"));
        assert_eq!(defaults.build_type, Some(BuildType::Release));
        assert_eq!(defaults.shared, Some(false));
        assert_eq!(defaults.cxx, Some(false));
        assert_eq!(defaults.parallel, Some(false));
        assert_eq!(defaults.jobs, None);
    }

    #[test]
    fn merge_partial_override() {
        let base = RecipeSettings::defaults();
        let partial = RecipeSettings {
            shared: Some(true),
            jobs: Some(4),
            ..Default::default()
        };

        let merged = base.merge(&partial);

        assert_eq!(merged.shared, Some(true));
        assert_eq!(merged.jobs, Some(4));
        assert_eq!(merged.cxx, Some(false));
        assert_eq!(merged.version, base.version);
    }

    #[test]
    fn merge_empty_keeps_base() {
        let base = RecipeSettings::defaults();

        assert_eq!(base.merge(&RecipeSettings::default()), base);
    }

    #[test]
    fn load_missing_file() {
        let temp = tempfile::tempdir().unwrap();

        let settings = load_project_settings(&temp.path().join(PROJECT_SETTINGS_FILE)).unwrap();

        assert_eq!(settings, RecipeSettings::default());
    }

    #[test]
    fn load_options_table() {
        let (_temp, path) = write_settings(
            r#"
[package]
name = "ignored"

[options]
version = "1.10.1"
os = "macos"
build_type = "Debug"
shared = true
zlib_root = "/opt/zlib"
"#,
        );

        let settings = load_project_settings(&path).unwrap();

        assert_eq!(settings.version.as_deref(), Some("1.10.1"));
        assert_eq!(settings.os, Some(TargetOs::Macos));
        assert_eq!(settings.build_type, Some(BuildType::Debug));
        assert_eq!(settings.shared, Some(true));
        assert_eq!(settings.zlib_root, Some(PathBuf::from("/opt/zlib")));
        assert_eq!(settings.cxx, None);
    }

    #[test]
    fn load_without_options_table() {
        let (_temp, path) = write_settings("[package]\nname = \"x\"\n");

        assert_eq!(load_project_settings(&path).unwrap(), RecipeSettings::default());
    }

    #[test]
    fn load_invalid_toml() {
        let (_temp, path) = write_settings("[options\nshared = ");

        assert!(matches!(
            load_project_settings(&path),
            Err(ConfigError::Settings { .. })
        ));
    }

    #[test]
    fn load_invalid_value() {
        let (_temp, path) = write_settings("[options]\nos = \"solaris\"\n");

        assert!(matches!(
            load_project_settings(&path),
            Err(ConfigError::Settings { .. })
        ));
    }

    #[test]
    fn resolve_into_options() {
        let settings = RecipeSettings::defaults().merge(&RecipeSettings {
            os: Some(TargetOs::Windows),
            arch: Some(Arch::X86),
            compiler_version: Some("15".to_string()),
            cxx: Some(true),
            ..Default::default()
        });

        let environment = BTreeMap::from([("MPICC".to_string(), "/opt/mpi/mpicc".to_string())]);
        let resolved = settings.resolve(&environment).unwrap();

        assert_eq!(resolved.version, "1.10.5");
        assert_eq!(resolved.options.os, TargetOs::Windows);
        assert_eq!(resolved.options.arch, Arch::X86);
        assert_eq!(resolved.options.compiler_version, "15");
        assert!(resolved.options.cxx);
        assert!(!resolved.options.shared);
        assert_eq!(resolved.options.mpi.cc, "/opt/mpi/mpicc");
        assert_eq!(resolved.options.mpi.cxx, "mpicxx");
    }

    #[test]
    fn resolve_requires_os() {
        let settings = RecipeSettings::default();

        assert!(matches!(
            settings.resolve(&BTreeMap::new()),
            Err(ConfigError::UnsupportedOs(_))
        ));
    }

    #[test]
    fn windows_requires_known_arch() {
        let settings = RecipeSettings {
            os: Some(TargetOs::Windows),
            ..Default::default()
        };

        assert!(matches!(
            settings.resolve(&BTreeMap::new()),
            Err(ConfigError::UnsupportedArch(_))
        ));

        let linux = RecipeSettings {
            os: Some(TargetOs::Linux),
            ..Default::default()
        };
        assert!(linux.resolve(&BTreeMap::new()).is_ok());
    }
}
