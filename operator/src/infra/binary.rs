//! Places the `parca` executable: copy an attached resource, or download a
//! release tarball, verify its SHA-256 and extract the binary.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::application::ports::{BinaryInstaller, CommandRunner};
use crate::domain::BinarySource;
use crate::domain::parca_config::hex_encode;
use crate::infra::host::MachineHost;

/// Name of the executable inside a release archive.
const ARCHIVE_BINARY: &str = "parca";

impl<R: CommandRunner> BinaryInstaller for MachineHost<R> {
    async fn place_binary(&self, source: &BinarySource, dest: &Path) -> Result<()> {
        let source = source.clone();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || place_binary_sync(&source, &dest))
            .await
            .context("binary install task panicked")?
    }
}

/// Synchronous body of `place_binary`.
///
/// # Errors
///
/// Returns an error if the source cannot be read, the download fails, the
/// checksum does not match, or the destination cannot be written.
pub fn place_binary_sync(source: &BinarySource, dest: &Path) -> Result<()> {
    match source {
        BinarySource::Resource(path) => {
            let mut file = File::open(path)
                .with_context(|| format!("opening binary resource {}", path.display()))?;
            install_executable(&mut file, dest)?;
        }
        BinarySource::Release { url, sha256 } => {
            let archive = tempfile::NamedTempFile::new().context("creating download file")?;
            download(url, archive.path())?;
            verify_sha256(archive.path(), sha256)?;
            extract_binary(archive.path(), dest)?;
        }
    }
    tracing::info!(dest = %dest.display(), "parca binary installed");
    Ok(())
}

fn download(url: &str, dest: &Path) -> Result<()> {
    let response = match ureq::get(url).call() {
        Ok(r) => r,
        Err(ureq::Error::Status(code, _)) => anyhow::bail!("downloading {url}: HTTP {code}"),
        Err(e) => return Err(e).with_context(|| format!("downloading {url}")),
    };
    let mut file =
        File::create(dest).with_context(|| format!("creating {}", dest.display()))?;
    let mut reader = response.into_reader();
    std::io::copy(&mut reader, &mut file).with_context(|| format!("downloading {url}"))?;
    file.flush().context("flushing download")?;
    Ok(())
}

/// Compare a file's SHA-256 against a hex digest, ignoring case.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the digest differs.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_file(path)?;
    anyhow::ensure!(
        actual.eq_ignore_ascii_case(expected.trim()),
        "checksum mismatch for {}: expected {expected}, got {actual}",
        path.display()
    );
    Ok(())
}

fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 65536];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("reading {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex_encode(&hasher.finalize()))
}

/// Extract the `parca` entry of a `.tar.gz` archive to `dest`.
///
/// # Errors
///
/// Returns an error if the archive is unreadable or has no `parca` file.
pub fn extract_binary(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).with_context(|| format!("opening {}", archive.display()))?;
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(file));
    for entry in tar.entries().context("reading release archive")? {
        let mut entry = entry.context("reading archive entry")?;
        let is_binary = entry.header().entry_type().is_file()
            && entry
                .path()
                .context("reading archive entry path")?
                .file_name()
                .is_some_and(|name| name == ARCHIVE_BINARY);
        if is_binary {
            return install_executable(&mut entry, dest);
        }
    }
    anyhow::bail!("release archive has no '{ARCHIVE_BINARY}' executable")
}

/// Write `reader` to `dest` with mode 0755 via a temp file and rename, so a
/// running daemon never sees a half-written binary.
fn install_executable(reader: &mut impl Read, dest: &Path) -> Result<()> {
    let parent = dest.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    std::fs::create_dir_all(&parent)
        .with_context(|| format!("creating directory {}", parent.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(&parent)
        .with_context(|| format!("creating temp file in {}", parent.display()))?;
    std::io::copy(reader, &mut tmp).with_context(|| format!("writing {}", dest.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o755))
            .with_context(|| format!("setting permissions on {}", dest.display()))?;
    }

    tmp.persist(dest)
        .with_context(|| format!("finalizing {}", dest.display()))?;
    Ok(())
}
