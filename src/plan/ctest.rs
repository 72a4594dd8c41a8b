use crate::error::{RecipeError, UnsupportedCompilerError};
use crate::options::{Arch, BuildOptions};
use crate::plan::{BuildPlanner, CommandPlan, ShellCommand, Step, ToleratedFailure, WORKSPACE_VAR};
use crate::source::SourceSpec;
use crate::store::paths::INSTALL_FOLDER;
use std::path::PathBuf;

/// Drives the CMake-hdf5 bundle through `ctest -S HDF5config.cmake` on Windows.
pub struct CTestPlanner;

/// Maps a Visual Studio major version to the `BUILD_GENERATOR` value
/// understood by `HDF5config.cmake`.
pub fn generator(compiler_version: &str, arch: Arch) -> Result<String, UnsupportedCompilerError> {
    let studio = match compiler_version {
        "14" => "VS2015",
        "15" => "VS2017",
        "16" => "VS2019",
        _ => {
            return Err(UnsupportedCompilerError {
                version: compiler_version.to_string(),
            })
        }
    };

    match arch {
        Arch::X8664 => Ok(format!("{studio}64")),
        Arch::X86 => Ok(studio.to_string()),
    }
}

/// Base name of the installer zip produced by the ctest script.
pub fn installer_name(version: &str, arch: Arch) -> String {
    format!("HDF5-{version}-win{}", arch.bits())
}

impl BuildPlanner for CTestPlanner {
    fn name(&self) -> &'static str {
        "ctest"
    }

    fn plan(&self, options: &BuildOptions, source: &SourceSpec) -> Result<CommandPlan, RecipeError> {
        let generator = generator(&options.compiler_version, options.arch)?;

        let mut script = format!("HDF5config.cmake,BUILD_GENERATOR={generator}");

        if !options.shared {
            script.push_str(",STATIC_ONLY=YES");
        }

        let mut plan = CommandPlan::new();

        plan.shell(
            ShellCommand::new("ctest", &source.local_folder_name)
                .with_arguments(&[
                    "-S",
                    script.as_str(),
                    "-C",
                    options.build_type.as_str(),
                    "-V",
                    "-O",
                    "hdf5.log",
                ])
                .with_tolerate(ToleratedFailure::NoTestsFound),
        );

        let installer = installer_name(&source.version, options.arch);

        let installer_zip = format!(
            "{WORKSPACE_VAR}/{source}/build/{installer}.zip",
            source = source.local_folder_name
        );

        plan.shell(ShellCommand::new("cmake", "").with_arguments(&["-E", "tar", "xf", installer_zip.as_str()]));

        plan.push(Step::FileRename {
            from: PathBuf::from(&installer),
            to: PathBuf::from(INSTALL_FOLDER),
        });

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{BuildType, TargetOs};
    use crate::plan::generate;
    use crate::source::resolve;

    fn windows(compiler_version: &str) -> BuildOptions {
        BuildOptions {
            compiler_version: compiler_version.to_string(),
            ..BuildOptions::new(TargetOs::Windows)
        }
    }

    fn plan_for(options: &BuildOptions) -> Result<CommandPlan, RecipeError> {
        let source = resolve("1.10.5", TargetOs::Windows).unwrap();
        generate(options, &source)
    }

    #[test]
    fn generator_for_supported_versions() {
        assert_eq!(generator("14", Arch::X8664).unwrap(), "VS201564");
        assert_eq!(generator("15", Arch::X8664).unwrap(), "VS201764");
        assert_eq!(generator("16", Arch::X8664).unwrap(), "VS201964");
        assert_eq!(generator("15", Arch::X86).unwrap(), "VS2017");
    }

    #[test]
    fn other_compiler_versions_rejected() {
        for version in ["", "12", "17", "2019"] {
            assert_eq!(
                generator(version, Arch::X8664),
                Err(UnsupportedCompilerError {
                    version: version.to_string()
                })
            );
        }

        assert!(matches!(
            plan_for(&windows("13")),
            Err(RecipeError::UnsupportedCompiler(err)) if err.version == "13"
        ));
    }

    #[test]
    fn static_release_ctest_invocation() {
        let plan = plan_for(&windows("16")).unwrap();
        let ctest = plan.shell_commands().next().unwrap();

        assert_eq!(ctest.program, "ctest");
        assert_eq!(ctest.directory, PathBuf::from("source_subfolder"));
        assert_eq!(
            ctest.arguments,
            vec![
                "-S",
                "HDF5config.cmake,BUILD_GENERATOR=VS201964,STATIC_ONLY=YES",
                "-C",
                "Release",
                "-V",
                "-O",
                "hdf5.log"
            ]
        );
        assert_eq!(ctest.tolerate, Some(ToleratedFailure::NoTestsFound));
    }

    #[test]
    fn shared_debug_drops_static_only() {
        let options = BuildOptions {
            shared: true,
            build_type: BuildType::Debug,
            ..windows("14")
        };

        let plan = plan_for(&options).unwrap();
        let ctest = plan.shell_commands().next().unwrap();

        assert_eq!(ctest.arguments[1], "HDF5config.cmake,BUILD_GENERATOR=VS201564");
        assert_eq!(ctest.arguments[3], "Debug");
    }

    #[test]
    fn installer_unpacked_into_install() {
        let options = BuildOptions {
            arch: Arch::X86,
            ..windows("15")
        };

        let plan = plan_for(&options).unwrap();
        let steps = plan.steps();

        assert_eq!(steps.len(), 3);

        let Step::Shell(unpack) = &steps[1] else {
            panic!("expected unpack command, got {:?}", steps[1]);
        };
        assert_eq!(unpack.program, "cmake");
        assert_eq!(unpack.directory, PathBuf::new());
        assert_eq!(
            unpack.arguments.last().unwrap(),
            "$RECIPE_WORKSPACE/source_subfolder/build/HDF5-1.10.5-win32.zip"
        );

        assert_eq!(
            steps[2],
            Step::FileRename {
                from: PathBuf::from("HDF5-1.10.5-win32"),
                to: PathBuf::from("install"),
            }
        );
    }
}
