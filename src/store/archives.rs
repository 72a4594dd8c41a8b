use anyhow::{anyhow, Result};
use async_compression::tokio::bufread::GzipDecoder;
use async_zip::tokio::read::seek::ZipFileReader;
use std::path::{Path, PathBuf};
use tokio::fs::{create_dir_all, File, OpenOptions};
use tokio::io::BufReader;
use tokio_tar::ArchiveBuilder;
use tokio_util::compat::{TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveKind {
    Gzip,
    Zip,
}

/// Sniffs the archive format from its magic bytes.
pub fn detect_kind(data: &[u8]) -> Option<ArchiveKind> {
    match infer::get(data)?.mime_type() {
        "application/gzip" => Some(ArchiveKind::Gzip),
        "application/zip" => Some(ArchiveKind::Zip),
        _ => None,
    }
}

pub async fn unpack(kind: ArchiveKind, archive: &Path, target_dir: &Path) -> Result<()> {
    match kind {
        ArchiveKind::Gzip => unpack_tar_gz(target_dir, archive).await,
        ArchiveKind::Zip => unpack_zip(archive, target_dir).await,
    }
}

pub async fn unpack_tar_gz(target_dir: &Path, source_tar: &Path) -> Result<()> {
    let tar_gz = File::open(source_tar).await?;
    let buf_reader = BufReader::new(tar_gz);
    let gz_decoder = GzipDecoder::new(buf_reader);
    let archive_builder = ArchiveBuilder::new(gz_decoder)
        .set_preserve_permissions(true)
        .set_ignore_zeros(true);
    let mut archive = archive_builder.build();

    archive.unpack(target_dir).await?;

    Ok(())
}

/// Returns a relative path without reserved names, redundant separators, ".", or "..".
fn sanitize_file_path(path: &str) -> PathBuf {
    path.replace('\\', "/")
        .split('/')
        .map(sanitize_filename::sanitize)
        .collect()
}

pub async fn unpack_zip(source_path: &Path, out_dir: &Path) -> Result<()> {
    let archive_file = File::open(source_path).await?;
    let archive = BufReader::new(archive_file).compat();
    let mut reader = ZipFileReader::new(archive).await?;

    for index in 0..reader.file().entries().len() {
        let entry = reader
            .file()
            .entries()
            .get(index)
            .ok_or_else(|| anyhow!("zip entry {index} missing"))?;

        let path = out_dir.join(sanitize_file_path(entry.filename().as_str()?));

        // Directory entries end with '/'
        let entry_is_dir = entry.dir()?;

        let mut entry_reader = reader.reader_without_entry(index).await?;

        if entry_is_dir {
            if !path.exists() {
                create_dir_all(&path).await?;
            }

            continue;
        }

        if let Some(parent) = path.parent() {
            if !parent.is_dir() {
                create_dir_all(parent).await?;
            }
        }

        let writer = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        futures_lite::io::copy(&mut entry_reader, &mut writer.compat_write()).await?;
    }

    Ok(())
}

#[cfg(test)]
pub(crate) async fn compress_tar_gz(source: &Path, output: &Path) -> Result<()> {
    use async_compression::tokio::write::GzipEncoder;
    use tokio::io::AsyncWriteExt;
    use tokio_tar::Builder;

    let tar = File::create(output).await?;
    let mut builder = Builder::new(GzipEncoder::new(tar));

    for entry in walkdir::WalkDir::new(source).min_depth(1) {
        let entry = entry?;
        let relative_path = entry.path().strip_prefix(source)?;

        if entry.file_type().is_file() {
            builder
                .append_path_with_name(entry.path(), relative_path)
                .await?;
        }
    }

    let mut encoder = builder.into_inner().await?;
    encoder.shutdown().await?;

    Ok(())
}
