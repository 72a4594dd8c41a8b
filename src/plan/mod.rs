use crate::error::RecipeError;
use crate::options::{BuildOptions, TargetOs};
use crate::source::SourceSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub mod autotools;
pub mod ctest;

/// Placeholder for the absolute workspace root, expanded by the executor.
pub const WORKSPACE_VAR: &str = "$RECIPE_WORKSPACE";

/// Failures of a shell step that are expected and must not abort the plan.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToleratedFailure {
    /// CTest exits non-zero when the test suite was never built.
    NoTestsFound,
    /// `install_name_tool -add_rpath` refuses to add an rpath twice.
    RpathExists,
}

impl ToleratedFailure {
    pub fn signal(&self) -> &'static str {
        match self {
            Self::NoTestsFound => "No tests were found",
            Self::RpathExists => "would duplicate path",
        }
    }

    pub fn matches(&self, line: &str) -> bool {
        line.contains(self.signal())
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ShellCommand {
    pub program: String,
    pub arguments: Vec<String>,
    pub directory: PathBuf,
    pub tolerate: Option<ToleratedFailure>,
}

impl ShellCommand {
    pub fn new(program: &str, directory: impl Into<PathBuf>) -> Self {
        Self {
            program: program.to_string(),
            arguments: vec![],
            directory: directory.into(),
            tolerate: None,
        }
    }

    pub fn with_arguments<S: AsRef<str>>(mut self, arguments: &[S]) -> Self {
        self.arguments
            .extend(arguments.iter().map(|argument| argument.as_ref().to_string()));
        self
    }

    pub fn with_tolerate(mut self, tolerate: ToleratedFailure) -> Self {
        self.tolerate = Some(tolerate);
        self
    }
}

/// How an `EnvSet` step combines with a value already present.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvMerge {
    /// Replace any existing value.
    Overwrite,
    /// Only set when the variable is unset or empty.
    KeepExisting,
    /// Join onto a non-empty existing value with `separator`.
    Append { separator: String },
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EnvSet {
    pub key: String,
    pub value: String,
    pub merge: EnvMerge,
}

impl EnvSet {
    pub fn apply(&self, environment: &mut BTreeMap<String, String>) {
        let existing = environment
            .get(&self.key)
            .filter(|value| !value.is_empty())
            .cloned();

        let value = match (&self.merge, existing) {
            (EnvMerge::KeepExisting, Some(existing)) => existing,
            (EnvMerge::Append { separator }, Some(existing)) => {
                format!("{existing}{separator}{}", self.value)
            }
            _ => self.value.clone(),
        };

        environment.insert(self.key.clone(), value);
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    Shell(ShellCommand),
    EnvSet(EnvSet),
    FileRename {
        from: PathBuf,
        to: PathBuf,
    },
    FileCopy {
        from: PathBuf,
        to: PathBuf,
    },
    FilePatch {
        path: PathBuf,
        search: String,
        replace: String,
    },
}

/// An ordered, fully resolved list of steps. Paths are relative to the
/// workspace root.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct CommandPlan {
    steps: Vec<Step>,
}

impl CommandPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn shell(&mut self, command: ShellCommand) {
        self.push(Step::Shell(command));
    }

    pub fn env(&mut self, key: &str, value: &str, merge: EnvMerge) {
        self.push(Step::EnvSet(EnvSet {
            key: key.to_string(),
            value: value.to_string(),
            merge,
        }));
    }

    pub fn extend(&mut self, other: CommandPlan) {
        self.steps.extend(other.steps);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn shell_commands(&self) -> impl Iterator<Item = &ShellCommand> {
        self.steps.iter().filter_map(|step| match step {
            Step::Shell(command) => Some(command),
            _ => None,
        })
    }

    /// The environment every step after the last `EnvSet` observes, given
    /// the caller's `base` environment.
    pub fn environment(&self, base: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut environment = base.clone();

        for step in &self.steps {
            if let Step::EnvSet(set) = step {
                set.apply(&mut environment);
            }
        }

        environment
    }
}

/// Turns build options into a command plan for one platform family.
pub trait BuildPlanner {
    fn name(&self) -> &'static str;

    fn plan(&self, options: &BuildOptions, source: &SourceSpec) -> Result<CommandPlan, RecipeError>;
}

pub fn planner_for(os: TargetOs) -> Box<dyn BuildPlanner> {
    match os {
        TargetOs::Windows => Box::new(ctest::CTestPlanner),
        TargetOs::Linux | TargetOs::Macos => Box::new(autotools::AutotoolsPlanner),
    }
}

/// Generates the build plan. Options are expected to be validated already.
pub fn generate(options: &BuildOptions, source: &SourceSpec) -> Result<CommandPlan, RecipeError> {
    let planner = planner_for(options.os);

    let plan = planner.plan(options, source)?;

    tracing::debug!(planner = planner.name(), steps = plan.len(), "generated build plan");

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_set(key: &str, value: &str, merge: EnvMerge) -> EnvSet {
        EnvSet {
            key: key.to_string(),
            value: value.to_string(),
            merge,
        }
    }

    #[test]
    fn keep_existing_does_not_clobber() {
        let mut environment = BTreeMap::from([("CC".to_string(), "clang".to_string())]);

        env_set("CC", "mpicc", EnvMerge::KeepExisting).apply(&mut environment);
        env_set("CXX", "mpicxx", EnvMerge::KeepExisting).apply(&mut environment);

        assert_eq!(environment["CC"], "clang");
        assert_eq!(environment["CXX"], "mpicxx");
    }

    #[test]
    fn keep_existing_replaces_empty_value() {
        let mut environment = BTreeMap::from([("CC".to_string(), String::new())]);

        env_set("CC", "mpicc", EnvMerge::KeepExisting).apply(&mut environment);

        assert_eq!(environment["CC"], "mpicc");
    }

    #[test]
    fn append_preserves_existing_value() {
        let append = || {
            env_set(
                "LDFLAGS",
                "-Wl,-rpath,'$$ORIGIN/../lib'",
                EnvMerge::Append {
                    separator: " ".to_string(),
                },
            )
        };

        let mut empty = BTreeMap::new();
        append().apply(&mut empty);
        assert_eq!(empty["LDFLAGS"], "-Wl,-rpath,'$$ORIGIN/../lib'");

        let mut existing = BTreeMap::from([("LDFLAGS".to_string(), "-L/opt/zlib/lib".to_string())]);
        append().apply(&mut existing);
        assert_eq!(
            existing["LDFLAGS"],
            "-L/opt/zlib/lib -Wl,-rpath,'$$ORIGIN/../lib'"
        );
    }

    #[test]
    fn overwrite_replaces() {
        let mut environment = BTreeMap::from([("CC".to_string(), "gcc".to_string())]);

        env_set("CC", "cc", EnvMerge::Overwrite).apply(&mut environment);

        assert_eq!(environment["CC"], "cc");
    }

    #[test]
    fn no_tests_signal_only() {
        let tolerate = ToleratedFailure::NoTestsFound;

        assert!(tolerate.matches("No tests were found!!!"));
        assert!(!tolerate.matches("Error(s) when building project"));
        assert!(!tolerate.matches("would duplicate path, file already has LC_RPATH"));
    }

    #[test]
    fn rpath_exists_signal() {
        let tolerate = ToleratedFailure::RpathExists;

        assert!(tolerate.matches(
            "error: install_name_tool: h5dump would duplicate path, file already has LC_RPATH for: @executable_path/../lib"
        ));
        assert!(!tolerate.matches("error: install_name_tool: can't open file: h5dump"));
    }

    #[test]
    fn plan_serializes_with_kind_tag() {
        let mut plan = CommandPlan::new();
        plan.env("CC", "mpicc", EnvMerge::KeepExisting);
        plan.shell(ShellCommand::new("make", "build_subfolder").with_arguments(&["-j4"]));

        let json = serde_json::to_value(&plan).unwrap();

        assert_eq!(json["steps"][0]["kind"], "env_set");
        assert_eq!(json["steps"][0]["merge"], "keep_existing");
        assert_eq!(json["steps"][1]["kind"], "shell");
        assert_eq!(json["steps"][1]["arguments"][0], "-j4");
    }
}
