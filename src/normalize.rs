use crate::error::RecipeError;
use crate::execute::Executor;
use crate::options::{BuildOptions, TargetOs};
use crate::plan::{CommandPlan, ShellCommand, Step, ToleratedFailure};
use crate::store::paths::{Workspace, INSTALL_FOLDER, SOURCE_SUBFOLDER};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub const LICENSE_FILE: &str = "LICENSE.hdf5";
pub const CHANGES_FILE: &str = "CHANGES.hdf5";

const WRAPPER_PREFIX: &str = r#"prefix="""#;
const WRAPPER_PREFIX_RELOCATABLE: &str = r#"prefix="$(cd "$(dirname "$0")/.." && pwd)""#;

const TOOLS: &[&str] = &[
    "gif2h5",
    "h52gif",
    "h5clear",
    "h5copy",
    "h5debug",
    "h5diff",
    "h5dump",
    "h5format_convert",
    "h5import",
    "h5jam",
    "h5ls",
    "h5mkgrp",
    "h5perf_serial",
    "h5repack",
    "h5repart",
    "h5stat",
    "h5unjam",
    "h5watch",
];

const PARALLEL_TOOLS: &[&str] = &["ph5diff", "h5perf"];

fn install_path(parts: &[&str]) -> PathBuf {
    parts.iter().fold(PathBuf::from(INSTALL_FOLDER), |path, part| path.join(part))
}

/// Compiler wrapper scripts installed for the given options.
pub fn wrappers(options: &BuildOptions) -> Vec<&'static str> {
    let mut wrappers = vec![if options.parallel { "h5pcc" } else { "h5cc" }];

    if options.cxx {
        wrappers.push("h5c++");
    }

    wrappers
}

/// Executables that need an `@executable_path` rpath on macOS.
pub fn tools(options: &BuildOptions) -> Vec<&'static str> {
    let mut tools = TOOLS.to_vec();

    if options.parallel {
        tools.extend_from_slice(PARALLEL_TOOLS);
    }

    tools
}

/// Regular `*.dylib` files directly under `lib`, sorted. Version symlinks are
/// skipped: they resolve to one of the returned files.
fn dylibs(lib: &Path) -> Vec<String> {
    let mut names = vec![];

    if !lib.is_dir() {
        return names;
    }

    for entry in WalkDir::new(lib).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("failed to read {}: {}", lib.display(), err);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();

        if name.ends_with(".dylib") {
            names.push(name);
        }
    }

    names
}

/// Plans the post-install fixups. Reads the install tree to find which
/// wrappers, tools and libraries are present.
pub fn plan(workspace: &Workspace, options: &BuildOptions) -> CommandPlan {
    let mut plan = CommandPlan::new();

    if options.os.is_windows() {
        return plan;
    }

    let install = workspace.install();

    for wrapper in wrappers(options) {
        if !install.bin().join(wrapper).is_file() {
            continue;
        }

        plan.push(Step::FilePatch {
            path: install_path(&["bin", wrapper]),
            search: WRAPPER_PREFIX.to_string(),
            replace: WRAPPER_PREFIX_RELOCATABLE.to_string(),
        });
    }

    if options.os == TargetOs::Macos && options.shared {
        for tool in tools(options) {
            if !install.bin().join(tool).is_file() {
                continue;
            }

            plan.shell(
                ShellCommand::new("install_name_tool", install_path(&["bin"]))
                    .with_arguments(&["-add_rpath", "@executable_path/../lib", tool])
                    .with_tolerate(ToleratedFailure::RpathExists),
            );
        }

        for dylib in dylibs(&install.lib()) {
            plan.shell(
                ShellCommand::new("install_name_tool", install_path(&["lib"])).with_arguments(&[
                    "-id".to_string(),
                    format!("@rpath/{dylib}"),
                    dylib.clone(),
                ]),
            );
        }
    }

    let source = PathBuf::from(SOURCE_SUBFOLDER);

    plan.push(Step::FileRename {
        from: source.join("COPYING"),
        to: source.join(LICENSE_FILE),
    });

    plan.push(Step::FileRename {
        from: source.join("release_docs").join("RELEASE.txt"),
        to: source.join(CHANGES_FILE),
    });

    plan
}

pub async fn normalize(executor: &mut Executor, options: &BuildOptions) -> Result<(), RecipeError> {
    let plan = plan(executor.workspace(), options);

    info!("normalizing install tree ({} steps)", plan.len());

    executor.run(&plan).await
}
