//! musical-artifacts.com catalogue client
//!
//! Searches the public catalogue for soundfonts and downloads the chosen
//! artifact into the library. Archives are opened and only the members of
//! the requested soundfont type are kept.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ArtifactsConfig;
use crate::library::install;
use crate::library::move_path;
use crate::{Error, Result};

/// One catalogue row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Download location; filled from the first mirror when missing
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub mirrors: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub formats: Vec<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Outcome of an artifact download
#[derive(Debug, Clone, Serialize)]
pub struct Download {
    /// Where the downloaded file was stored
    pub stored: PathBuf,
    /// Soundfont files left in the destination
    pub files: Vec<PathBuf>,
}

pub struct ArtifactsClient {
    http: reqwest::Client,
    search_url: String,
}

impl ArtifactsClient {
    pub fn new(config: &ArtifactsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("webconf/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            search_url: config.search_url.clone(),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Search by comma-separated formats and tags
    pub async fn search(&self, formats: Option<&str>, tags: Option<&str>) -> Result<Vec<Artifact>> {
        let mut results = Vec::new();
        for url in query_urls(&self.search_url, formats, tags)? {
            debug!("Querying {}", url);
            let rows: Vec<Artifact> = self
                .http
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            results.extend(rows.into_iter().map(normalize));
        }
        info!("Catalogue search returned {} artifacts", results.len());
        Ok(results)
    }

    /// Download `url` into `dest_dir`, keeping only `.<kind>` files from archives
    pub async fn download(&self, url: &str, dest_dir: &Path, kind: &str) -> Result<Download> {
        let stored = install::fetch(&self.http, url, dest_dir).await?;
        let files = extract_kind(&stored, dest_dir, kind)?;
        Ok(Download { stored, files })
    }
}

/// One query URL per comma-separated format
pub fn query_urls(base: &str, formats: Option<&str>, tags: Option<&str>) -> Result<Vec<reqwest::Url>> {
    let tags = tags.map(str::trim).filter(|t| !t.is_empty());
    let formats: Vec<&str> = formats
        .map(|f| f.split(',').map(str::trim).filter(|f| !f.is_empty()).collect())
        .unwrap_or_default();

    let build = |format: Option<&str>| {
        let mut params = Vec::new();
        if let Some(format) = format {
            params.push(("formats", format));
        }
        if let Some(tags) = tags {
            params.push(("tags", tags));
        }
        let url = if params.is_empty() {
            reqwest::Url::parse(base)
        } else {
            reqwest::Url::parse_with_params(base, &params)
        };
        url.map_err(|e| Error::InvalidInput(format!("Bad catalogue URL {}: {}", base, e)))
    };

    if formats.is_empty() {
        return Ok(vec![build(None)?]);
    }
    formats.into_iter().map(|f| build(Some(f))).collect()
}

/// Fill `file` from the first mirror when the row has none
pub fn normalize(mut artifact: Artifact) -> Artifact {
    if artifact.file.as_deref().map_or(true, str::is_empty) {
        artifact.file = artifact.mirrors.first().cloned();
    }
    artifact
}

/// Pull `.<kind>` members of an archive flat into `dest_dir` and drop the archive
///
/// An archive that can't be unpacked is left where it was stored.
pub fn extract_kind(stored: &Path, dest_dir: &Path, kind: &str) -> Result<Vec<PathBuf>> {
    let Some((archive, _)) = install::archive_kind(stored)? else {
        return Ok(vec![stored.to_path_buf()]);
    };

    let suffix = format!(".{}", kind.to_ascii_lowercase());
    let keep = |p: &Path| p.to_string_lossy().to_ascii_lowercase().ends_with(&suffix);
    let staging = tempfile::TempDir::new_in(dest_dir)?;

    let extracted = install::extract(archive, stored, staging.path(), keep)?;
    discard(stored);

    let mut files = Vec::new();
    for path in extracted {
        let Some(name) = path.file_name() else { continue };
        let dest = dest_dir.join(name);
        move_path(&path, &dest)?;
        files.push(dest);
    }
    info!("Installed {} {} files into {:?}", files.len(), kind, dest_dir);
    Ok(files)
}

fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!("Can't remove {:?}: {}", path, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_query_urls_split_formats() {
        let urls = query_urls(
            "https://musical-artifacts.com/artifacts.json",
            Some("sf2, sfz"),
            Some("piano"),
        )
        .unwrap();
        let urls: Vec<_> = urls.iter().map(|u| u.as_str().to_string()).collect();
        assert_eq!(
            urls,
            vec![
                "https://musical-artifacts.com/artifacts.json?formats=sf2&tags=piano",
                "https://musical-artifacts.com/artifacts.json?formats=sfz&tags=piano",
            ]
        );
    }

    #[test]
    fn test_query_urls_without_filters() {
        let urls = query_urls("https://example.org/a.json", None, Some(" ")).unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].as_str(), "https://example.org/a.json");
    }

    #[test]
    fn test_normalize_file_from_mirror() {
        let row: Artifact = serde_json::from_value(serde_json::json!({
            "id": 7,
            "name": "Piano",
            "mirrors": ["https://mirror/piano.sf2"],
            "downloads": 12
        }))
        .unwrap();
        let row = normalize(row);
        assert_eq!(row.file.as_deref(), Some("https://mirror/piano.sf2"));
        assert_eq!(row.extra["downloads"], 12);

        let bare: Artifact = serde_json::from_value(serde_json::json!({"name": "x"})).unwrap();
        assert_eq!(normalize(bare).file, None);
    }

    #[test]
    fn test_extract_kind_flattens_zip() {
        let tmp = TempDir::new().unwrap();
        let stored = tmp.path().join("pack.zip");
        let mut zip = zip::ZipWriter::new(std::fs::File::create(&stored).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in [("deep/dir/Keys.SF2", b"k"), ("deep/readme.txt", b"r")] {
            zip.start_file(name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();

        let files = extract_kind(&stored, tmp.path(), "sf2").unwrap();
        assert_eq!(files, vec![tmp.path().join("Keys.SF2")]);
        assert!(!stored.exists());
        assert!(!tmp.path().join("deep").exists());
        assert!(!tmp.path().join("readme.txt").exists());
    }

    #[test]
    fn test_extract_kind_plain_file_kept() {
        let tmp = TempDir::new().unwrap();
        let stored = tmp.path().join("Keys.sf2");
        std::fs::write(&stored, b"k").unwrap();
        assert_eq!(extract_kind(&stored, tmp.path(), "sf2").unwrap(), vec![stored.clone()]);
        assert!(stored.exists());
    }

    #[test]
    fn test_extract_kind_tar_bz2() {
        let tmp = TempDir::new().unwrap();
        let stored = tmp.path().join("Piano.tar.bz2");
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in [("p/Piano.sf2", b"p"), ("p/notes.txt", b"n")] {
            let mut header = tar::Header::new_gnu();
            header.set_size(1);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, &data[..]).unwrap();
        }
        let mut bz = bzip2::write::BzEncoder::new(
            std::fs::File::create(&stored).unwrap(),
            bzip2::Compression::default(),
        );
        bz.write_all(&builder.into_inner().unwrap()).unwrap();
        bz.finish().unwrap();

        let files = extract_kind(&stored, tmp.path(), "sf2").unwrap();
        assert_eq!(files, vec![tmp.path().join("Piano.sf2")]);
        assert!(!stored.exists());
        assert!(!tmp.path().join("notes.txt").exists());
    }

    #[test]
    fn test_extract_kind_keeps_unreadable_download() {
        let tmp = TempDir::new().unwrap();
        let stored = tmp.path().join("pack.tar.bz2");
        std::fs::write(&stored, b"not bzip2").unwrap();
        assert!(extract_kind(&stored, tmp.path(), "sf2").is_err());
        assert!(stored.exists());

        let rar = tmp.path().join("pack.rar");
        std::fs::write(&rar, b"x").unwrap();
        assert!(matches!(
            extract_kind(&rar, tmp.path(), "sf2"),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(rar.exists());
    }

    async fn serve_once(body: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await.unwrap();
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{}/artifacts.json", addr)
    }

    #[tokio::test]
    async fn test_search_against_local_server() {
        let url = serve_once(r#"[{"id":1,"name":"Bells","file":"http://x/bells.sf2"},{"id":2,"name":"Choir","mirrors":["http://m/choir.sf2"]}]"#).await;
        let client = ArtifactsClient::new(&ArtifactsConfig {
            search_url: url,
            timeout_secs: 5,
        })
        .unwrap();

        let rows = client.search(Some("sf2"), None).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].file.as_deref(), Some("http://m/choir.sf2"));
    }
}
