use crate::error::{AcquisitionError, RecipeError};
use crate::source::SourceSpec;
use crate::store::{archives, hashes, paths::Workspace, temps};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info};
use url::Url;

/// Where the source archive is read from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArchiveLocation {
    Remote(String),
    Local(PathBuf),
}

impl ArchiveLocation {
    pub fn for_spec(spec: &SourceSpec, local: Option<PathBuf>) -> Self {
        match local {
            Some(path) => Self::Local(path),
            None => Self::Remote(spec.archive_url.clone()),
        }
    }
}

async fn download(url: &str, target: &Path) -> Result<(), AcquisitionError> {
    let download_error = |reason: String| AcquisitionError::Download {
        url: url.to_string(),
        reason,
    };

    let url = Url::parse(url).map_err(|err| download_error(err.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        error!("invalid source url scheme: {}", url.scheme());
        return Err(download_error(format!("unsupported scheme {}", url.scheme())));
    }

    info!("downloading source: {}", url);

    let response = reqwest::get(url.as_str())
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|err| download_error(err.to_string()))?;

    let data = response
        .bytes()
        .await
        .map_err(|err| download_error(err.to_string()))?;

    fs::write(target, &data)
        .await
        .map_err(|err| download_error(err.to_string()))?;

    debug!("downloaded {} bytes to {}", data.len(), target.display());

    Ok(())
}

fn verify(spec: &SourceSpec, data: &[u8]) -> Result<(), AcquisitionError> {
    let Some(checksum) = &spec.checksum else {
        info!("no checksum for {}, skipping verification", spec.archive_filename);
        return Ok(());
    };

    let actual = hashes::get_digest(checksum.algorithm, data);

    if !actual.eq_ignore_ascii_case(&checksum.value) {
        return Err(AcquisitionError::ChecksumMismatch {
            file: spec.archive_filename.clone(),
            algorithm: checksum.algorithm.to_string(),
            expected: checksum.value.clone(),
            actual,
        });
    }

    info!("verified {} ({})", spec.archive_filename, checksum.algorithm);

    Ok(())
}

fn archive_kind(spec: &SourceSpec, data: &[u8]) -> Option<archives::ArchiveKind> {
    archives::detect_kind(data).or_else(|| {
        if spec.archive_filename.ends_with(".zip") {
            Some(archives::ArchiveKind::Zip)
        } else if spec.archive_filename.ends_with(".tar.gz") {
            Some(archives::ArchiveKind::Gzip)
        } else {
            None
        }
    })
}

async fn extract(
    spec: &SourceSpec,
    archive: &Path,
    data: &[u8],
    workspace: &Workspace,
    source_path: &Path,
) -> Result<(), RecipeError> {
    let kind = archive_kind(spec, data).ok_or_else(|| AcquisitionError::Extract {
        archive: archive.to_path_buf(),
        reason: "unrecognized archive format".to_string(),
    })?;

    let temp_dir = temps::create_temp_dir(workspace.root(), "extract").await?;

    let result: Result<(), RecipeError> = async {
        archives::unpack(kind, archive, &temp_dir)
            .await
            .map_err(|err| AcquisitionError::Extract {
                archive: archive.to_path_buf(),
                reason: err.to_string(),
            })?;

        let extracted = temp_dir.join(&spec.extracted_folder);

        if !extracted.is_dir() {
            return Err(AcquisitionError::MissingFolder(spec.extracted_folder.clone()).into());
        }

        fs::rename(&extracted, source_path)
            .await
            .map_err(|err| RecipeError::io(source_path, err))
    }
    .await;

    let _ = fs::remove_dir_all(&temp_dir).await;

    result
}

/// Fetches, verifies and extracts the source archive into
/// `<workspace>/source_subfolder`.
///
/// Any previous `source_subfolder` is removed first. On failure the
/// downloaded archive and the extraction directory are deleted, so no
/// partially prepared source tree survives.
pub async fn acquire(
    spec: &SourceSpec,
    location: &ArchiveLocation,
    workspace: &Workspace,
) -> Result<PathBuf, RecipeError> {
    let source_path = workspace.root().join(&spec.local_folder_name);

    fs::create_dir_all(workspace.root())
        .await
        .map_err(|err| RecipeError::io(workspace.root(), err))?;

    if source_path.exists() {
        info!("removing previous source: {}", source_path.display());

        fs::remove_dir_all(&source_path)
            .await
            .map_err(|err| RecipeError::io(&source_path, err))?;
    }

    let (archive, downloaded) = match location {
        ArchiveLocation::Remote(url) => {
            let target = workspace.root().join(&spec.archive_filename);
            (target, Some(url))
        }
        ArchiveLocation::Local(path) => {
            info!("using local source archive: {}", path.display());
            (path.clone(), None)
        }
    };

    let result: Result<(), RecipeError> = async {
        if let Some(url) = downloaded {
            download(url, &archive).await?;
        }

        let data = fs::read(&archive)
            .await
            .map_err(|err| RecipeError::io(&archive, err))?;

        verify(spec, &data)?;

        extract(spec, &archive, &data, workspace, &source_path).await
    }
    .await;

    if downloaded.is_some() && archive.exists() {
        let _ = fs::remove_file(&archive).await;
    }

    result?;

    info!("prepared source: {}", source_path.display());

    Ok(source_path)
}
