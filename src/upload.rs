use crate::error::RecipeError;
use crate::execute::Executor;
use crate::plan::{ShellCommand, Step};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Package repository coordinates for `conan upload`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct UploadTarget {
    pub remote: String,
    pub user: String,
    pub channel: String,
}

impl UploadTarget {
    pub fn reference(&self, version: &str) -> String {
        format!("hdf5/{version}@{}/{}", self.user, self.channel)
    }
}

pub fn upload_command(target: &UploadTarget, version: &str) -> ShellCommand {
    ShellCommand::new("conan", "").with_arguments(&[
        "upload".to_string(),
        "--all".to_string(),
        "--remote".to_string(),
        target.remote.clone(),
        target.reference(version),
    ])
}

pub async fn upload(
    executor: &mut Executor,
    target: &UploadTarget,
    version: &str,
) -> Result<(), RecipeError> {
    info!("uploading {} to {}", target.reference(version), target.remote);

    executor
        .run_step(&Step::Shell(upload_command(target, version)))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildToolError;
    use crate::options::environment_snapshot;
    use crate::store::paths::Workspace;

    fn target() -> UploadTarget {
        UploadTarget {
            remote: "ess-dmsc".to_string(),
            user: "ess-dmsc".to_string(),
            channel: "stable".to_string(),
        }
    }

    #[test]
    fn conan_upload_arguments() {
        let command = upload_command(&target(), "1.10.5");

        assert_eq!(command.program, "conan");
        assert_eq!(
            command.arguments,
            vec![
                "upload",
                "--all",
                "--remote",
                "ess-dmsc",
                "hdf5/1.10.5@ess-dmsc/stable"
            ]
        );
        assert!(command.tolerate.is_none());
    }

    #[tokio::test]
    async fn missing_client_fails() {
        let temp = tempfile::tempdir().unwrap();
        let mut environment = environment_snapshot();
        environment.insert("PATH".to_string(), temp.path().display().to_string());

        let mut executor = Executor::new(Workspace::new(temp.path()), environment);

        let err = upload(&mut executor, &target(), "1.10.5").await.unwrap_err();

        assert!(matches!(err, RecipeError::BuildTool(BuildToolError::Spawn { .. })));
    }
}
