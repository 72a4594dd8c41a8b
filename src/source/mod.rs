use crate::error::ConfigError;
use crate::options::TargetOs;
use crate::store::hashes::{Checksum, ChecksumAlgorithm};
use crate::store::paths::SOURCE_SUBFOLDER;
use serde::{Deserialize, Serialize};

pub mod fetch;

pub use fetch::{acquire, ArchiveLocation};

const RELEASES_URL: &str = "https://support.hdfgroup.org/ftp/HDF5/releases";

/// Upstream releases with a known tarball digest.
const RELEASES: &[(&str, ChecksumAlgorithm, &str)] = &[
    ("1.10.1", ChecksumAlgorithm::Md5, "43a2f9466702fb1db31df98ae6677f15"),
    (
        "1.10.5",
        ChecksumAlgorithm::Sha256,
        "6d4ce8bf902a97b050f6f491f4268634e252a63dadd6656a1a9be5b7b7726fa8",
    ),
];

pub const DEFAULT_VERSION: &str = "1.10.5";

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SourceSpec {
    pub version: String,
    pub archive_url: String,
    pub archive_filename: String,
    pub checksum: Option<Checksum>,
    pub extracted_folder: String,
    pub local_folder_name: String,
}

pub fn known_versions() -> impl Iterator<Item = &'static str> {
    RELEASES.iter().map(|(version, _, _)| *version)
}

/// `1.10.5` -> `1.10`
fn release_series(version: &str) -> &str {
    match version.rmatch_indices('.').next() {
        Some((index, _)) => &version[..index],
        None => version,
    }
}

pub fn resolve(version: &str, os: TargetOs) -> Result<SourceSpec, ConfigError> {
    let (_, algorithm, digest) = RELEASES
        .iter()
        .find(|(release, _, _)| *release == version)
        .ok_or_else(|| ConfigError::UnknownVersion(version.to_string()))?;

    let (extracted_folder, archive_filename, checksum) = match os {
        TargetOs::Windows => {
            let folder = format!("CMake-hdf5-{version}");
            let filename = format!("{folder}.zip");
            (folder, filename, None)
        }
        TargetOs::Linux | TargetOs::Macos => {
            let folder = format!("hdf5-{version}");
            let filename = format!("{folder}.tar.gz");
            let checksum = Checksum {
                algorithm: *algorithm,
                value: digest.to_string(),
            };
            (folder, filename, Some(checksum))
        }
    };

    let archive_url = format!(
        "{RELEASES_URL}/hdf5-{series}/hdf5-{version}/src/{archive_filename}",
        series = release_series(version),
    );

    Ok(SourceSpec {
        version: version.to_string(),
        archive_url,
        archive_filename,
        checksum,
        extracted_folder,
        local_folder_name: SOURCE_SUBFOLDER.to_string(),
    })
}
