//! Upload and download unpacking
//!
//! Uploaded or downloaded media arrives as a single file or an archive.
//! Archives are extracted next to themselves, a redundant top-level
//! directory is unrolled and macOS resource forks are dropped before the
//! content is handed to the library. Temporary files are always removed.

use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use super::{file_name_string, move_path, sorted_entries};
use crate::{Error, Result};

/// Archive formats that can be unpacked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    TarBz2,
    TarXz,
    Zip,
}

const SUFFIXES: &[(&str, ArchiveKind)] = &[
    (".tar.gz", ArchiveKind::TarGz),
    (".tgz", ArchiveKind::TarGz),
    (".tar.bz2", ArchiveKind::TarBz2),
    (".tbz2", ArchiveKind::TarBz2),
    (".tar.xz", ArchiveKind::TarXz),
    (".txz", ArchiveKind::TarXz),
    (".zip", ArchiveKind::Zip),
];
const UNSUPPORTED_SUFFIXES: &[&str] = &[".7z", ".rar"];

/// Archive kind and the file name without its archive suffix
pub fn archive_kind(path: &Path) -> Result<Option<(ArchiveKind, String)>> {
    let name = file_name_string(path);
    let lower = name.to_ascii_lowercase();

    for (suffix, kind) in SUFFIXES {
        if lower.ends_with(suffix) {
            return Ok(Some((*kind, name[..name.len() - suffix.len()].to_string())));
        }
    }
    if let Some(suffix) = UNSUPPORTED_SUFFIXES.iter().find(|s| lower.ends_with(*s)) {
        return Err(Error::UnsupportedFormat(format!("{} archives", suffix)));
    }
    Ok(None)
}

/// Extract members of `path` accepted by `keep` below `dest`
pub fn extract<F>(kind: ArchiveKind, path: &Path, dest: &Path, keep: F) -> Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    let extracted = match kind {
        ArchiveKind::TarGz => extract_tar(flate2::read::GzDecoder::new(File::open(path)?), dest, keep)?,
        ArchiveKind::TarBz2 => extract_tar(bzip2::read::BzDecoder::new(File::open(path)?), dest, keep)?,
        ArchiveKind::TarXz => extract_tar(xz2::read::XzDecoder::new(File::open(path)?), dest, keep)?,
        ArchiveKind::Zip => extract_zip(path, dest, keep)?,
    };
    debug!("Extracted {} files from {:?}", extracted.len(), path);
    Ok(extracted)
}

/// Extract `path` if it is an archive, returning the content location
pub fn unpack(path: &Path) -> Result<PathBuf> {
    let Some((kind, stem)) = archive_kind(path)? else {
        return Ok(path.to_path_buf());
    };

    let dest = path.with_file_name(&stem);
    info!("Unpacking {:?} into {:?}", path, dest);
    std::fs::create_dir_all(&dest)?;

    if let Err(e) = extract(kind, path, &dest, |_| true) {
        if let Err(e) = std::fs::remove_dir_all(&dest) {
            warn!("Can't remove {:?}: {}", dest, e);
        }
        return Err(e);
    }

    unroll_nested(&dest, &stem)?;
    let trash = dest.join("__MACOSX");
    if trash.exists() {
        std::fs::remove_dir_all(&trash)?;
    }
    Ok(dest)
}

/// Unpack `upload`, hand the content to `install`, then clean up
pub fn install_upload<T, F>(upload: &Path, install: F) -> Result<T>
where
    F: FnOnce(&Path) -> Result<T>,
{
    let result = unpack(upload).and_then(|content| {
        let result = install(&content);
        if content != upload && content.is_dir() {
            if let Err(e) = std::fs::remove_dir_all(&content) {
                warn!("Can't remove {:?}: {}", content, e);
            }
        }
        result
    });

    if upload.exists() {
        if let Err(e) = std::fs::remove_file(upload) {
            warn!("Can't remove {:?}: {}", upload, e);
        }
    }
    result
}

/// Download `url` into `dir`, keeping the last path segment as file name
pub async fn fetch(client: &reqwest::Client, url: &str, dir: &Path) -> Result<PathBuf> {
    let parsed = reqwest::Url::parse(url).map_err(|e| Error::InvalidInput(format!("Bad URL {}: {}", url, e)))?;
    let name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("download")
        .to_string();
    super::validate_file_name(&name)?;

    info!("Downloading {}", url);
    let response = client.get(parsed).send().await?.error_for_status()?;
    let body = response.bytes().await?;

    tokio::fs::create_dir_all(dir).await?;
    let dest = dir.join(&name);
    tokio::fs::write(&dest, &body).await?;
    debug!("Stored {} bytes at {:?}", body.len(), dest);
    Ok(dest)
}

fn extract_tar<R, F>(reader: R, dest: &Path, keep: F) -> Result<Vec<PathBuf>>
where
    R: Read,
    F: Fn(&Path) -> bool,
{
    let mut archive = tar::Archive::new(reader);
    let mut extracted = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.to_path_buf();
        reject_traversal(&entry_path)?;
        if entry.header().entry_type().is_file() && !keep(&entry_path) {
            continue;
        }
        if entry.unpack_in(dest)? && entry.header().entry_type().is_file() {
            extracted.push(dest.join(&entry_path));
        }
    }
    Ok(extracted)
}

fn extract_zip<F>(path: &Path, dest: &Path, keep: F) -> Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut extracted = Vec::new();

    for i in 0..archive.len() {
        let mut member = archive.by_index(i)?;
        let rel = member
            .enclosed_name()
            .ok_or_else(|| Error::PathTraversal(member.name().to_string()))?;
        let target = dest.join(&rel);

        if member.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if !keep(&rel) {
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        std::io::copy(&mut member, &mut out)?;
        extracted.push(target);
    }
    Ok(extracted)
}

fn reject_traversal(path: &Path) -> Result<()> {
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return Err(Error::PathTraversal(path.display().to_string()));
    }
    Ok(())
}

// `foo.zip` often contains a single `foo/` directory; lift its content up
fn unroll_nested(dest: &Path, stem: &str) -> Result<()> {
    let nested = dest.join(stem);
    if !nested.is_dir() {
        return Ok(());
    }
    let tmp = dest.join(".unroll_tmp");
    std::fs::rename(&nested, &tmp)?;
    for entry in sorted_entries(&tmp)? {
        let from = entry.path();
        move_path(&from, &dest.join(entry.file_name()))?;
    }
    std::fs::remove_dir_all(&tmp)?;
    debug!("Unrolled nested directory {:?}", nested);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    fn tar_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn write_tar_gz(path: &Path, files: &[(&str, &[u8])]) {
        let mut gz = flate2::write::GzEncoder::new(File::create(path).unwrap(), flate2::Compression::default());
        gz.write_all(&tar_bytes(files)).unwrap();
        gz.finish().unwrap();
    }

    fn write_tar_bz2(path: &Path, files: &[(&str, &[u8])]) {
        let mut bz = bzip2::write::BzEncoder::new(File::create(path).unwrap(), bzip2::Compression::default());
        bz.write_all(&tar_bytes(files)).unwrap();
        bz.finish().unwrap();
    }

    fn write_tar_xz(path: &Path, files: &[(&str, &[u8])]) {
        let mut xz = xz2::write::XzEncoder::new(File::create(path).unwrap(), 6);
        xz.write_all(&tar_bytes(files)).unwrap();
        xz.finish().unwrap();
    }

    // The tar builder refuses `..` in member names, so write the name field directly
    fn write_evil_tar_gz(path: &Path) {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        let name = b"../evil.txt";
        header.as_gnu_mut().unwrap().name[..name.len()].copy_from_slice(name);
        header.set_size(4);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append(&header, &b"evil"[..]).unwrap();
        let data = builder.into_inner().unwrap();

        let mut gz = flate2::write::GzEncoder::new(File::create(path).unwrap(), flate2::Compression::default());
        gz.write_all(&data).unwrap();
        gz.finish().unwrap();
    }

    #[test]
    fn test_archive_kind() {
        assert_eq!(
            archive_kind(Path::new("/tmp/Bank.TAR.GZ")).unwrap(),
            Some((ArchiveKind::TarGz, "Bank".to_string()))
        );
        assert_eq!(
            archive_kind(Path::new("x.tgz")).unwrap(),
            Some((ArchiveKind::TarGz, "x".to_string()))
        );
        assert_eq!(
            archive_kind(Path::new("x.zip")).unwrap(),
            Some((ArchiveKind::Zip, "x".to_string()))
        );
        assert_eq!(
            archive_kind(Path::new("Piano.tar.bz2")).unwrap(),
            Some((ArchiveKind::TarBz2, "Piano".to_string()))
        );
        assert_eq!(
            archive_kind(Path::new("Piano.tar.xz")).unwrap(),
            Some((ArchiveKind::TarXz, "Piano".to_string()))
        );
        assert_eq!(archive_kind(Path::new("x.sf2")).unwrap(), None);
        assert!(matches!(
            archive_kind(Path::new("x.7z")),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_unpack_zip_unrolls_and_drops_macosx() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("Pads.zip");
        write_zip(
            &archive,
            &[
                ("Pads/Warm.xiz", b"w"),
                ("Pads/sub/Cold.xiz", b"c"),
                ("__MACOSX/._Warm.xiz", b"junk"),
            ],
        );

        let dest = unpack(&archive).unwrap();
        assert_eq!(dest, tmp.path().join("Pads"));
        assert!(dest.join("Warm.xiz").exists());
        assert!(dest.join("sub/Cold.xiz").exists());
        assert!(!dest.join("Pads").exists());
        assert!(!dest.join("__MACOSX").exists());
    }

    #[test]
    fn test_unpack_tar_gz() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("kit.tgz");
        write_tar_gz(&archive, &[("a/kit.sfz", b"k")]);

        let dest = unpack(&archive).unwrap();
        assert!(dest.join("a/kit.sfz").exists());
    }

    #[test]
    fn test_unpack_tar_bz2_and_xz() {
        let tmp = TempDir::new().unwrap();
        let bz2 = tmp.path().join("Piano.tar.bz2");
        write_tar_bz2(&bz2, &[("Piano/Piano.sf2", b"p")]);
        let xz = tmp.path().join("Organ.tar.xz");
        write_tar_xz(&xz, &[("Organ.sf2", b"o")]);

        let dest = unpack(&bz2).unwrap();
        assert_eq!(dest, tmp.path().join("Piano"));
        assert_eq!(std::fs::read(dest.join("Piano.sf2")).unwrap(), b"p");

        let dest = unpack(&xz).unwrap();
        assert_eq!(std::fs::read(dest.join("Organ.sf2")).unwrap(), b"o");
    }

    #[test]
    fn test_tar_member_outside_dest_rejected() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("kit.tar.gz");
        write_evil_tar_gz(&archive);
        let dest = tmp.path().join("out");
        std::fs::create_dir_all(&dest).unwrap();

        let result = extract(ArchiveKind::TarGz, &archive, &dest, |_| true);
        assert!(matches!(result, Err(Error::PathTraversal(_))));
        assert!(!tmp.path().join("evil.txt").exists());
        assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 0);
    }

    #[test]
    fn test_zip_member_outside_dest_rejected() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("kit.zip");
        write_zip(&archive, &[("../evil.txt", b"evil")]);
        let dest = tmp.path().join("out");
        std::fs::create_dir_all(&dest).unwrap();

        let result = extract(ArchiveKind::Zip, &archive, &dest, |_| true);
        assert!(matches!(result, Err(Error::PathTraversal(_))));
        assert!(!tmp.path().join("evil.txt").exists());
        assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 0);
    }

    #[test]
    fn test_install_upload_keeps_unpack_error() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("kit.zip");
        write_zip(&archive, &[("../evil.txt", b"evil")]);

        let result: Result<()> = install_upload(&archive, |_| Ok(()));
        assert!(matches!(result, Err(Error::PathTraversal(_))));
        assert!(!archive.exists());
        assert!(!tmp.path().join("kit").exists());

        let odd = tmp.path().join("bank.rar");
        std::fs::write(&odd, b"x").unwrap();
        let result: Result<()> = install_upload(&odd, |_| Ok(()));
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_plain_file_passes_through() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("Lead.xiz");
        std::fs::write(&file, b"x").unwrap();
        assert_eq!(unpack(&file).unwrap(), file);
    }

    #[test]
    fn test_install_upload_cleans_up() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("Pads.zip");
        write_zip(&archive, &[("Warm.xiz", b"w")]);
        let bank = tmp.path().join("bank");
        std::fs::create_dir_all(&bank).unwrap();

        let moved = install_upload(&archive, |content| {
            let target = bank.join("Warm.xiz");
            std::fs::rename(content.join("Warm.xiz"), &target)?;
            Ok(target)
        })
        .unwrap();

        assert!(moved.exists());
        assert!(!archive.exists());
        assert!(!tmp.path().join("Pads").exists());
    }

    #[test]
    fn test_install_upload_cleans_up_on_failure() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("Pads.zip");
        write_zip(&archive, &[("Warm.xiz", b"w")]);

        let result: Result<()> =
            install_upload(&archive, |_| Err(Error::InvalidInput("nope".into())));
        assert!(result.is_err());
        assert!(!archive.exists());
        assert!(!tmp.path().join("Pads").exists());
    }

    #[test]
    fn test_extract_filtered() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("mix.zip");
        write_zip(&archive, &[("a/keep.sf2", b"k"), ("a/skip.txt", b"s")]);
        let dest = tmp.path().join("out");

        let files = extract_zip(&archive, &dest, |p| {
            p.extension().is_some_and(|e| e == "sf2")
        })
        .unwrap();
        assert_eq!(files, vec![dest.join("a/keep.sf2")]);
        assert!(!dest.join("a/skip.txt").exists());
    }
}
