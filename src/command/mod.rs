use crate::config::{load_project_settings, RecipeSettings, PROJECT_SETTINGS_FILE};
use crate::execute::Executor;
use crate::log::{print_manifest, print_plan, print_source};
use crate::options::{environment_snapshot, Arch, BuildType, TargetOs};
use crate::recipe::Recipe;
use crate::store::paths::{Workspace, PACKAGE_FOLDER};
use crate::upload::{upload, UploadTarget};
use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::env::current_dir;
use std::path::PathBuf;
use tracing::{subscriber, Level};
use tracing_subscriber::{fmt::writer::MakeWriterExt, FmtSubscriber};

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum PlanFormat {
    #[default]
    Text,
    Json,
}

/// Command-line overrides; they win over `Recipe.toml`.
#[derive(Args, Clone, Debug, Default)]
pub struct OptionArgs {
    /// HDF5 release to build
    #[arg(id = "hdf5_version", global = true, long = "hdf5-version")]
    pub version: Option<String>,

    #[arg(global = true, long)]
    pub os: Option<TargetOs>,

    #[arg(global = true, long)]
    pub arch: Option<Arch>,

    /// Visual Studio major version (14, 15 or 16)
    #[arg(global = true, long)]
    pub compiler_version: Option<String>,

    #[arg(global = true, long)]
    pub build_type: Option<BuildType>,

    #[arg(global = true, long)]
    pub shared: Option<bool>,

    #[arg(global = true, long)]
    pub cxx: Option<bool>,

    #[arg(global = true, long)]
    pub parallel: Option<bool>,

    /// Parallel make jobs
    #[arg(global = true, long)]
    pub jobs: Option<usize>,

    /// zlib installation prefix passed to configure
    #[arg(global = true, long)]
    pub zlib_root: Option<PathBuf>,
}

impl From<OptionArgs> for RecipeSettings {
    fn from(args: OptionArgs) -> Self {
        Self {
            version: args.version,
            os: args.os,
            arch: args.arch,
            compiler_version: args.compiler_version,
            build_type: args.build_type,
            shared: args.shared,
            cxx: args.cxx,
            parallel: args.parallel,
            jobs: args.jobs,
            zlib_root: args.zlib_root,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Download, verify and extract the sources
    Source {
        /// Use a local archive instead of downloading
        #[arg(long)]
        archive: Option<PathBuf>,
    },

    /// Print the build plan without running it
    Plan {
        #[arg(default_value = "text", long, value_enum)]
        format: PlanFormat,
    },

    /// Fetch, build, normalize and package
    Build {
        #[arg(long)]
        archive: Option<PathBuf>,

        /// Package directory, relative to the workspace
        #[arg(default_value = PACKAGE_FOLDER, long)]
        package: PathBuf,
    },

    /// Upload the package with the conan client
    Upload {
        #[arg(long)]
        remote: String,

        #[arg(long)]
        user: String,

        #[arg(default_value = "stable", long)]
        channel: String,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,

    // Log level
    #[arg(default_value_t = Level::INFO, global = true, long)]
    level: Level,

    /// Project settings file
    #[arg(default_value = PROJECT_SETTINGS_FILE, global = true, long)]
    config: PathBuf,

    /// Workspace root for sources, build and install trees
    #[arg(default_value = ".", global = true, long)]
    workspace: PathBuf,

    #[command(flatten)]
    options: OptionArgs,
}

pub async fn run() -> Result<()> {
    let Cli {
        command,
        level,
        config,
        workspace,
        options,
    } = Cli::parse();

    // Set up tracing subscriber

    let subscriber_writer = std::io::stderr.with_max_level(level);

    let mut subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(subscriber_writer)
        .without_time();

    if [Level::DEBUG, Level::TRACE].contains(&level) {
        subscriber = subscriber.with_file(true).with_line_number(true);
    }

    subscriber::set_global_default(subscriber.finish())?;

    // Resolve settings

    let settings = RecipeSettings::defaults()
        .merge(&load_project_settings(&config)?)
        .merge(&options.into());

    let environment = environment_snapshot();

    let resolved = settings.resolve(&environment)?;

    let workspace = Workspace::new(current_dir()?.join(workspace));

    match command {
        Command::Source { archive } => {
            let recipe = Recipe::new(&resolved)?;

            let source_path = recipe.fetch(&workspace, archive).await?;

            print_source(&recipe.source, &source_path);
        }

        Command::Plan { format } => {
            let recipe = Recipe::new(&resolved)?;

            let plan = recipe.plan()?;

            match format {
                PlanFormat::Text => print_plan(&plan),
                PlanFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
            }
        }

        Command::Build { archive, package } => {
            let recipe = Recipe::new(&resolved)?;

            let manifest = recipe.build(&workspace, archive, &package).await?;

            print_manifest(&manifest, &workspace.resolve(&package));
        }

        Command::Upload {
            remote,
            user,
            channel,
        } => {
            let target = UploadTarget {
                remote,
                user,
                channel,
            };

            let mut executor = Executor::new(workspace, environment);

            upload(&mut executor, &target, &resolved.version).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_project_settings() {
        let cli = Cli::try_parse_from([
            "hdf5-recipe",
            "plan",
            "--os",
            "windows",
            "--arch",
            "x86",
            "--shared",
            "true",
            "--compiler-version",
            "16",
        ])
        .unwrap();

        let project = RecipeSettings {
            shared: Some(false),
            cxx: Some(true),
            ..Default::default()
        };

        let settings = RecipeSettings::defaults()
            .merge(&project)
            .merge(&cli.options.into());

        assert_eq!(settings.os, Some(TargetOs::Windows));
        assert_eq!(settings.arch, Some(Arch::X86));
        assert_eq!(settings.shared, Some(true));
        assert_eq!(settings.cxx, Some(true));
        assert_eq!(settings.compiler_version.as_deref(), Some("16"));
    }

    #[test]
    fn build_defaults() {
        let cli = Cli::try_parse_from(["hdf5-recipe", "build"]).unwrap();

        assert_eq!(cli.level, Level::INFO);
        assert_eq!(cli.config, PathBuf::from("Recipe.toml"));

        match cli.command {
            Command::Build { archive, package } => {
                assert!(archive.is_none());
                assert_eq!(package, PathBuf::from("package"));
            }
            _ => panic!("expected build"),
        }
    }
}
