use crate::error::{BuildToolError, RecipeError};
use crate::plan::{CommandPlan, EnvSet, ShellCommand, Step, WORKSPACE_VAR};
use crate::store::paths::Workspace;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_stream::{wrappers::SplitStream, StreamExt};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Runs command plans against a workspace.
///
/// The executor owns a private copy of the environment: `EnvSet` steps mutate
/// it and every spawned process receives exactly that map. The process
/// environment of the recipe itself is never touched.
pub struct Executor {
    workspace: Workspace,
    environment: BTreeMap<String, String>,
}

fn file_error(operation: &'static str, path: &Path, reason: impl ToString) -> RecipeError {
    BuildToolError::FileOperation {
        operation,
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
    .into()
}

impl Executor {
    pub fn new(workspace: Workspace, environment: BTreeMap<String, String>) -> Self {
        Self {
            workspace,
            environment,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    fn expand(&self, text: &str) -> String {
        text.replace(WORKSPACE_VAR, &self.workspace.root().display().to_string())
    }

    pub async fn run(&mut self, plan: &CommandPlan) -> Result<(), RecipeError> {
        for (index, step) in plan.steps().iter().enumerate() {
            debug!("step {}/{}: {:?}", index + 1, plan.len(), step);

            self.run_step(step).await?;
        }

        Ok(())
    }

    pub async fn run_step(&mut self, step: &Step) -> Result<(), RecipeError> {
        match step {
            Step::Shell(command) => self.shell(command).await,
            Step::EnvSet(set) => {
                self.env_set(set);
                Ok(())
            }
            Step::FileRename { from, to } => self.rename(from, to).await,
            Step::FileCopy { from, to } => self.copy(from, to).await,
            Step::FilePatch {
                path,
                search,
                replace,
            } => self.patch(path, search, replace).await,
        }
    }

    fn env_set(&mut self, set: &EnvSet) {
        let set = EnvSet {
            value: self.expand(&set.value),
            ..set.clone()
        };

        set.apply(&mut self.environment);

        debug!("{}={}", set.key, self.environment[&set.key]);
    }

    async fn shell(&self, shell: &ShellCommand) -> Result<(), RecipeError> {
        let program = self.expand(&shell.program);

        let arguments: Vec<String> = shell
            .arguments
            .iter()
            .map(|argument| self.expand(argument))
            .collect();

        let directory = self.workspace.resolve(&shell.directory);

        fs::create_dir_all(&directory)
            .await
            .map_err(|err| RecipeError::io(&directory, err))?;

        info!("running: {} {}", program, arguments.join(" "));

        let mut child = Command::new(&program)
            .args(&arguments)
            .current_dir(&directory)
            .env_clear()
            .envs(&self.environment)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| BuildToolError::Spawn {
                program: program.clone(),
                reason: err.to_string(),
            })?;

        let spawn_error = |reason: &str| BuildToolError::Spawn {
            program: program.clone(),
            reason: reason.to_string(),
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error("failed to capture stdout"))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| spawn_error("failed to capture stderr"))?;

        let stdout = SplitStream::new(BufReader::new(stdout).split(b'\n'));
        let stderr = SplitStream::new(BufReader::new(stderr).split(b'\n'));

        let mut stdio_merged = StreamExt::merge(stdout, stderr);

        let mut last_line = "".to_string();
        let mut tolerated = false;

        while let Some(line) = stdio_merged.next().await {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!("failed to read output of {}: {}", program, err);
                    break;
                }
            };

            // Compilers may emit non-UTF-8 text in legacy locales.
            let output = String::from_utf8_lossy(&line)
                .trim_end_matches('\r')
                .to_string();

            info!("{}", output);

            if let Some(tolerate) = shell.tolerate {
                tolerated |= tolerate.matches(&output);
            }

            last_line = output;
        }

        let status = child
            .wait()
            .await
            .map_err(|err| spawn_error(&err.to_string()))?;

        if status.success() {
            return Ok(());
        }

        if tolerated {
            warn!(
                "{} exited with {:?}, ignoring: {}",
                program,
                status.code(),
                shell.tolerate.map(|tolerate| tolerate.signal()).unwrap_or_default()
            );

            return Ok(());
        }

        Err(BuildToolError::Failed {
            program,
            code: status.code(),
            last_line,
        }
        .into())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), RecipeError> {
        let from = self.workspace.resolve(from);
        let to = self.workspace.resolve(to);

        if !from.exists() {
            if to.exists() {
                debug!("already renamed: {}", to.display());
                return Ok(());
            }

            return Err(file_error("rename", &from, "no such file or directory"));
        }

        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| RecipeError::io(parent, err))?;
        }

        fs::rename(&from, &to)
            .await
            .map_err(|err| file_error("rename", &from, err))?;

        info!("renamed {} -> {}", from.display(), to.display());

        Ok(())
    }

    async fn copy(&self, from: &Path, to: &Path) -> Result<(), RecipeError> {
        let from = self.workspace.resolve(from);
        let to = self.workspace.resolve(to);

        if !from.exists() {
            return Err(file_error("copy", &from, "no such file or directory"));
        }

        if from.is_file() {
            return copy_file(&from, &to).await;
        }

        for entry in WalkDir::new(&from) {
            let entry = entry.map_err(|err| file_error("copy", &from, err))?;

            let relative = entry
                .path()
                .strip_prefix(&from)
                .map_err(|err| file_error("copy", entry.path(), err))?;

            let target = to.join(relative);

            if entry.path_is_symlink() {
                copy_symlink(entry.path(), &target).await?;
            } else if entry.file_type().is_dir() {
                fs::create_dir_all(&target)
                    .await
                    .map_err(|err| RecipeError::io(&target, err))?;
            } else {
                copy_file(entry.path(), &target).await?;
            }
        }

        info!("copied {} -> {}", from.display(), to.display());

        Ok(())
    }

    async fn patch(&self, path: &Path, search: &str, replace: &str) -> Result<(), RecipeError> {
        let path = self.workspace.resolve(path);

        let contents = fs::read_to_string(&path)
            .await
            .map_err(|err| file_error("patch", &path, err))?;

        if !contents.contains(search) {
            if contents.contains(replace) {
                debug!("already patched: {}", path.display());
                return Ok(());
            }

            return Err(BuildToolError::PatchNotApplicable {
                path,
                search: search.to_string(),
            }
            .into());
        }

        fs::write(&path, contents.replace(search, replace))
            .await
            .map_err(|err| file_error("patch", &path, err))?;

        info!("patched {}", path.display());

        Ok(())
    }
}

async fn copy_file(from: &Path, to: &Path) -> Result<(), RecipeError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|err| RecipeError::io(parent, err))?;
    }

    fs::copy(from, to)
        .await
        .map_err(|err| file_error("copy", from, err))?;

    Ok(())
}

#[cfg(unix)]
async fn copy_symlink(from: &Path, to: &Path) -> Result<(), RecipeError> {
    let link = fs::read_link(from)
        .await
        .map_err(|err| file_error("copy", from, err))?;

    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|err| RecipeError::io(parent, err))?;
    }

    if fs::symlink_metadata(to).await.is_ok() {
        fs::remove_file(to)
            .await
            .map_err(|err| RecipeError::io(to, err))?;
    }

    fs::symlink(&link, to)
        .await
        .map_err(|err| file_error("copy", from, err))
}

#[cfg(not(unix))]
async fn copy_symlink(from: &Path, to: &Path) -> Result<(), RecipeError> {
    copy_file(from, to).await
}
