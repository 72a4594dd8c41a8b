use crate::error::RecipeError;
use crate::execute::Executor;
use crate::normalize::{CHANGES_FILE, LICENSE_FILE};
use crate::options::{BuildOptions, BuildType};
use crate::plan::{CommandPlan, Step};
use crate::store::paths::{get_relative_files, INSTALL_FOLDER, SOURCE_SUBFOLDER};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

pub const MANIFEST_FILE: &str = "manifest.json";

pub const DYNAMIC_LIB_DEFINE: &str = "H5_BUILT_AS_DYNAMIC_LIB";

/// What a consumer needs to link against the packaged build.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PackageManifest {
    pub binaries: BTreeSet<PathBuf>,
    pub headers: BTreeSet<PathBuf>,
    /// Link order: primary library first, optional bindings last.
    pub libraries: Vec<String>,
    pub license_files: BTreeSet<PathBuf>,
    pub defines: Vec<String>,
}

fn library_name(name: &str, options: &BuildOptions) -> String {
    if !options.os.is_windows() {
        return name.to_string();
    }

    let prefix = if options.shared { "" } else { "lib" };
    let suffix = match options.build_type {
        BuildType::Debug => "_D",
        BuildType::Release => "",
    };

    format!("{prefix}{name}{suffix}")
}

pub fn libraries(options: &BuildOptions) -> Vec<String> {
    let mut libraries = vec![
        library_name("hdf5", options),
        library_name("hdf5_hl", options),
    ];

    if !options.os.is_windows() && !options.shared {
        libraries.push("dl".to_string());
    }

    if options.cxx {
        libraries.push(library_name("hdf5_cpp", options));
    }

    libraries
}

pub fn defines(options: &BuildOptions) -> Vec<String> {
    if options.os.is_windows() && options.shared {
        return vec![DYNAMIC_LIB_DEFINE.to_string()];
    }

    vec![]
}

fn license_files(options: &BuildOptions) -> Vec<&'static str> {
    if options.os.is_windows() {
        return vec![];
    }

    vec![LICENSE_FILE, CHANGES_FILE]
}

/// Copy steps from the install tree and source folder into `package_dir`.
pub fn plan(options: &BuildOptions, package_dir: &Path) -> CommandPlan {
    let mut plan = CommandPlan::new();

    for folder in ["bin", "include", "lib"] {
        plan.push(Step::FileCopy {
            from: Path::new(INSTALL_FOLDER).join(folder),
            to: package_dir.join(folder),
        });
    }

    for file in license_files(options) {
        plan.push(Step::FileCopy {
            from: Path::new(SOURCE_SUBFOLDER).join(file),
            to: package_dir.join(file),
        });
    }

    plan
}

/// Repackages the normalized install tree into `package_dir` and writes
/// `manifest.json` next to it.
pub async fn package(
    executor: &mut Executor,
    options: &BuildOptions,
    package_dir: &Path,
) -> Result<PackageManifest, RecipeError> {
    let package_path = executor.workspace().resolve(package_dir);

    if package_path.exists() {
        fs::remove_dir_all(&package_path)
            .await
            .map_err(|err| RecipeError::io(&package_path, err))?;
    }

    executor.run(&plan(options, package_dir)).await?;

    let manifest = PackageManifest {
        binaries: get_relative_files(&package_path.join("bin"))
            .into_iter()
            .collect(),
        headers: get_relative_files(&package_path.join("include"))
            .into_iter()
            .collect(),
        libraries: libraries(options),
        license_files: license_files(options).into_iter().map(PathBuf::from).collect(),
        defines: defines(options),
    };

    let manifest_path = package_path.join(MANIFEST_FILE);

    let manifest_json = serde_json::to_string_pretty(&manifest).map_err(|err| {
        RecipeError::io(&manifest_path, std::io::Error::other(err))
    })?;

    fs::write(&manifest_path, manifest_json)
        .await
        .map_err(|err| RecipeError::io(&manifest_path, err))?;

    info!("packaged {} -> {}", INSTALL_FOLDER, package_path.display());

    Ok(manifest)
}
