use crate::config::ResolvedSettings;
use crate::error::RecipeError;
use crate::execute::Executor;
use crate::normalize::normalize;
use crate::options::{environment_snapshot, BuildOptions};
use crate::package::{package, PackageManifest};
use crate::plan::{generate, CommandPlan};
use crate::source::{acquire, resolve, ArchiveLocation, SourceSpec};
use crate::store::paths::Workspace;
use crate::validate::validate;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Validated options with the source they build.
#[derive(Clone, Debug)]
pub struct Recipe {
    pub options: BuildOptions,
    pub source: SourceSpec,
}

impl Recipe {
    pub fn new(settings: &ResolvedSettings) -> Result<Self, RecipeError> {
        validate(&settings.options)?;

        let source = resolve(&settings.version, settings.options.os)?;

        Ok(Self {
            options: settings.options.clone(),
            source,
        })
    }

    pub fn plan(&self) -> Result<CommandPlan, RecipeError> {
        generate(&self.options, &self.source)
    }

    /// Fetches and extracts the sources into `source_subfolder`.
    pub async fn fetch(
        &self,
        workspace: &Workspace,
        archive: Option<PathBuf>,
    ) -> Result<PathBuf, RecipeError> {
        let location = ArchiveLocation::for_spec(&self.source, archive);

        acquire(&self.source, &location, workspace).await
    }

    /// Fetches the sources and clears the build and install trees left by
    /// earlier runs. Extracted sources keep archive mtimes, so stale objects
    /// in `build_subfolder` would otherwise look up to date to `make`.
    pub async fn prepare(
        &self,
        workspace: &Workspace,
        archive: Option<PathBuf>,
    ) -> Result<PathBuf, RecipeError> {
        let source_path = self.fetch(workspace, archive).await?;

        for tree in [workspace.build(), workspace.install().root().to_path_buf()] {
            if tree.exists() {
                info!("removing previous tree: {}", tree.display());

                fs::remove_dir_all(&tree)
                    .await
                    .map_err(|err| RecipeError::io(&tree, err))?;
            }
        }

        Ok(source_path)
    }

    /// Runs the whole recipe: fetch, build, normalize and package.
    ///
    /// The plan is generated before anything touches the workspace, so an
    /// unsupported compiler fails without downloading.
    pub async fn build(
        &self,
        workspace: &Workspace,
        archive: Option<PathBuf>,
        package_dir: &Path,
    ) -> Result<PackageManifest, RecipeError> {
        let plan = self.plan()?;

        self.prepare(workspace, archive).await?;

        let mut executor = Executor::new(workspace.clone(), environment_snapshot());

        info!("building hdf5 {} ({} steps)", self.source.version, plan.len());

        executor.run(&plan).await?;

        normalize(&mut executor, &self.options).await?;

        package(&mut executor, &self.options, package_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::options::{MpiWrappers, TargetOs};
    use crate::store::archives;

    fn settings(options: BuildOptions) -> ResolvedSettings {
        ResolvedSettings {
            version: "1.10.5".to_string(),
            options,
        }
    }

    #[test]
    fn invalid_options_rejected_before_resolution() {
        let options = BuildOptions {
            cxx: true,
            parallel: true,
            ..BuildOptions::new(TargetOs::Linux)
        };

        let err = Recipe::new(&ResolvedSettings {
            version: "0.0.0".to_string(),
            options,
        })
        .unwrap_err();

        assert!(matches!(err, RecipeError::Config(ConfigError::IncompatibleOptions)));
    }

    #[test]
    fn recipe_plans_for_target() {
        let options = BuildOptions {
            parallel: true,
            mpi: MpiWrappers::default(),
            ..BuildOptions::new(TargetOs::Linux)
        };

        let recipe = Recipe::new(&settings(options)).unwrap();

        assert_eq!(recipe.source.archive_filename, "hdf5-1.10.5.tar.gz");
        assert!(!recipe.plan().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsupported_compiler_fails_before_fetch() {
        let temp = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(temp.path().join("work"));

        let options = BuildOptions {
            compiler_version: "12".to_string(),
            ..BuildOptions::new(TargetOs::Windows)
        };

        let recipe = Recipe::new(&settings(options)).unwrap();

        let err = recipe
            .build(&workspace, None, Path::new("package"))
            .await
            .unwrap_err();

        assert!(matches!(err, RecipeError::UnsupportedCompiler(_)));
        assert!(!workspace.root().exists());
    }

    #[tokio::test]
    async fn prepare_clears_previous_build_trees() {
        let temp = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(temp.path().join("work"));

        let tree = temp.path().join("tree/hdf5-1.10.5");
        std::fs::create_dir_all(&tree).unwrap();
        std::fs::write(tree.join("configure"), "#!/bin/sh\n").unwrap();

        let archive = temp.path().join("hdf5-1.10.5.tar.gz");
        archives::compress_tar_gz(&temp.path().join("tree"), &archive)
            .await
            .unwrap();

        let stale_object = workspace.build().join("src/H5.o");
        let stale_library = workspace.install().lib().join("libhdf5.a");
        for stale in [&stale_object, &stale_library] {
            std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
            std::fs::write(stale, "").unwrap();
        }

        let options = BuildOptions::new(TargetOs::Linux);
        let recipe = Recipe {
            source: SourceSpec {
                checksum: None,
                ..resolve("1.10.5", options.os).unwrap()
            },
            options,
        };

        let source = recipe.prepare(&workspace, Some(archive)).await.unwrap();

        assert!(source.join("configure").is_file());
        assert!(!stale_object.exists());
        assert!(!workspace.build().exists());
        assert!(!workspace.install().root().exists());
    }
}
