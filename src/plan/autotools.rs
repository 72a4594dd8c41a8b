use crate::error::RecipeError;
use crate::options::{BuildOptions, BuildType, TargetOs};
use crate::plan::{BuildPlanner, CommandPlan, EnvMerge, ShellCommand, Step, WORKSPACE_VAR};
use crate::source::SourceSpec;
use crate::store::paths::{BUILD_SUBFOLDER, INSTALL_FOLDER};
use std::path::Path;

pub const LINUX_RPATH_FLAG: &str = "-Wl,-rpath,'$$ORIGIN/../lib'";

pub const LIBTOOL_INSTALL_NAME: &str = r"-install_name \$rpath/\$soname";
pub const LIBTOOL_INSTALL_NAME_RELOCATABLE: &str = r"-install_name @rpath/\$soname";

/// `configure` + `make` driver for Linux and macOS.
pub struct AutotoolsPlanner;

pub fn configure_flags(options: &BuildOptions) -> Vec<String> {
    let mut flags = vec![
        "--prefix=".to_string(),
        "--enable-hl".to_string(),
        "--disable-sharedlib-rpath".to_string(),
    ];

    if options.build_type == BuildType::Debug {
        flags.push("--enable-build-mode=debug".to_string());
    }

    if options.cxx {
        flags.push("--enable-cxx".to_string());
    }

    if options.shared {
        flags.push("--enable-shared".to_string());
        flags.push("--disable-static".to_string());
    } else {
        flags.push("--disable-shared".to_string());
        flags.push("--enable-static".to_string());
    }

    if options.parallel {
        flags.push("--enable-parallel".to_string());
    }

    if let Some(zlib_root) = &options.zlib_root {
        flags.push(format!("--with-zlib={}", zlib_root.display()));
    }

    flags
}

impl BuildPlanner for AutotoolsPlanner {
    fn name(&self) -> &'static str {
        "autotools"
    }

    fn plan(&self, options: &BuildOptions, source: &SourceSpec) -> Result<CommandPlan, RecipeError> {
        let mut plan = CommandPlan::new();

        // Environment

        if options.parallel {
            plan.env("CC", &options.mpi.cc, EnvMerge::KeepExisting);
            plan.env("CXX", &options.mpi.cxx, EnvMerge::KeepExisting);
        }

        if options.os == TargetOs::Linux && options.shared {
            plan.env(
                "LDFLAGS",
                LINUX_RPATH_FLAG,
                EnvMerge::Append {
                    separator: " ".to_string(),
                },
            );
        }

        // Configure

        let configure = format!(
            "{WORKSPACE_VAR}/{source}/configure",
            source = source.local_folder_name
        );

        plan.shell(
            ShellCommand::new(&configure, BUILD_SUBFOLDER).with_arguments(&configure_flags(options)),
        );

        // libtool is generated by configure and read during compilation

        if options.os == TargetOs::Macos && options.shared {
            plan.push(Step::FilePatch {
                path: Path::new(BUILD_SUBFOLDER).join("libtool"),
                search: LIBTOOL_INSTALL_NAME.to_string(),
                replace: LIBTOOL_INSTALL_NAME_RELOCATABLE.to_string(),
            });
        }

        // Build and install

        let mut make = ShellCommand::new("make", BUILD_SUBFOLDER);

        if let Some(jobs) = options.jobs {
            make = make.with_arguments(&[format!("-j{jobs}")]);
        }

        plan.shell(make);

        plan.shell(ShellCommand::new("make", BUILD_SUBFOLDER).with_arguments(&[
            "install".to_string(),
            format!("DESTDIR={WORKSPACE_VAR}/{INSTALL_FOLDER}"),
        ]));

        Ok(plan)
    }
}
