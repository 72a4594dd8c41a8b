use crate::error::RecipeError;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

pub fn get_temp_path(parent: &Path, prefix: &str) -> PathBuf {
    parent.join(format!(".{}-{}", prefix, Uuid::now_v7()))
}

pub async fn create_temp_dir(parent: &Path, prefix: &str) -> Result<PathBuf, RecipeError> {
    let temp_dir = get_temp_path(parent, prefix);

    fs::create_dir_all(&temp_dir)
        .await
        .map_err(|err| RecipeError::io(&temp_dir, err))?;

    Ok(temp_dir)
}
