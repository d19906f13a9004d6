use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::github::{Asset, GithubClient, GithubError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
    Windows,
    Android,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Platform::MacOs => "macOS",
            Platform::Linux => "Linux",
            Platform::Windows => "Windows",
            Platform::Android => "Android",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    SevenZip,
    Tar,
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ArchiveKind::Zip => "ZIP",
            ArchiveKind::SevenZip => "7z",
            ArchiveKind::Tar => "tar",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Platform(Platform),
    Archive(ArchiveKind),
    Other,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Platform(p) => p.fmt(f),
            AssetKind::Archive(a) => a.fmt(f),
            AssetKind::Other => f.write_str("Other"),
        }
    }
}

/// Platform substrings win over the file extension.
pub fn classify(file_name: &str) -> AssetKind {
    let name = file_name.to_lowercase();
    let platforms = [
        ("darwin", Platform::MacOs),
        ("linux", Platform::Linux),
        ("windows", Platform::Windows),
        ("android", Platform::Android),
    ];
    if let Some((_, platform)) = platforms.iter().find(|(needle, _)| name.contains(needle)) {
        return AssetKind::Platform(*platform);
    }

    if name.ends_with(".zip") {
        AssetKind::Archive(ArchiveKind::Zip)
    } else if name.ends_with(".7z") {
        AssetKind::Archive(ArchiveKind::SevenZip)
    } else if name.ends_with(".tar") || name.ends_with(".tar.gz") {
        AssetKind::Archive(ArchiveKind::Tar)
    } else {
        AssetKind::Other
    }
}

pub fn format_size(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// Asset fields the release page embeds as `DOWNLOAD_FILES`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadFile {
    pub name: String,
    pub size: u64,
    pub browser_download_url: String,
    pub download_count: u64,
    pub content_type: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DownloadFile {
    pub fn kind(&self) -> AssetKind {
        classify(&self.name)
    }

    pub fn display_size(&self) -> String {
        format_size(self.size)
    }
}

impl From<Asset> for DownloadFile {
    fn from(asset: Asset) -> Self {
        Self {
            name: asset.name,
            size: asset.size,
            browser_download_url: asset.browser_download_url,
            download_count: asset.download_count,
            content_type: asset.content_type,
            updated_at: asset.updated_at,
        }
    }
}

/// Downloads for the release built from `version`, falling back to a
/// commit match when no release carries that tag.
pub async fn download_files(
    github: &GithubClient,
    version: &str,
    hash: &str,
    short_hash: &str,
) -> Result<Vec<DownloadFile>, GithubError> {
    let assets = github.find_release_assets(version, hash, short_hash).await?;
    log::info!("Found {} downloadable assets for {version}", assets.len());
    Ok(assets.into_iter().map(DownloadFile::from).collect())
}
