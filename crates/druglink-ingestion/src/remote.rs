//! Provisioning of large input files (node synonymizer database, DrugBank dump)
//! from a remote host over SSH, verified by SHA-256.
//!
//! The system `ssh` client is used so that agent forwarding, `~/.ssh/config`
//! and known-hosts handling behave exactly as they do in an operator's shell.
//! Files are streamed through `cat` and hashed while they are written.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{info, instrument, warn};

const CHUNK_SIZE: usize = 1024 * 1024;

/// A file on a remote host reachable over SSH.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub host: String,
    pub username: String,
    pub port: u16,
    pub key_path: Option<PathBuf>,
    /// The ssh client to run, `ssh` from `PATH` unless configured.
    pub ssh_program: PathBuf,
    /// May start with `~/`, which is expanded to the remote user's home.
    pub remote_path: String,
}

/// What [`ensure_downloaded_and_verified`] had to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    AlreadyVerified,
    Downloaded,
}

impl RemoteFile {
    fn ssh(&self, remote_command: &str) -> Command {
        let mut cmd = Command::new(&self.ssh_program);
        cmd.arg("-p")
            .arg(self.port.to_string())
            .arg("-o")
            .arg("BatchMode=yes");
        if let Some(key) = &self.key_path {
            cmd.arg("-i").arg(key);
        }
        cmd.arg(format!("{}@{}", self.username, self.host))
            .arg(remote_command)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, remote_command: &str) -> anyhow::Result<String> {
        let output = self
            .ssh(remote_command)
            .output()
            .await
            .context("Failed to spawn ssh")?;
        if !output.status.success() {
            bail!(
                "Remote command failed on {} ({}): {}",
                self.host,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// SHA-256 of the remote file, via `sha256sum` with an `openssl` fallback.
    #[instrument(skip(self), fields(host = %self.host, path = %self.remote_path))]
    pub async fn sha256(&self) -> anyhow::Result<String> {
        let path = remote_path_expr(&self.remote_path);

        match self.run(&format!("sha256sum {path}")).await {
            Ok(out) => {
                if let Some(hash) = out.split_whitespace().next() {
                    return Ok(hash.to_lowercase());
                }
            }
            Err(e) => warn!("sha256sum unavailable, trying openssl: {e}"),
        }

        let out = self
            .run(&format!("openssl dgst -sha256 {path}"))
            .await
            .with_context(|| format!("Failed to compute remote sha256 for {}", self.remote_path))?;
        // "SHA2-256(path)= <hex>"
        out.split_whitespace()
            .last()
            .map(str::to_lowercase)
            .context("Empty openssl output")
    }

    /// Size of the remote file in bytes.
    pub async fn size(&self) -> anyhow::Result<u64> {
        let out = self
            .run(&format!("wc -c < {}", remote_path_expr(&self.remote_path)))
            .await?;
        out.trim()
            .parse()
            .with_context(|| format!("Unexpected size output: {out:?}"))
    }

    /// Stream the remote file to `local_path` and check it against `expected_sha256`.
    ///
    /// Bytes go to a `.part` file next to `local_path`, which is renamed only
    /// when the transfer succeeded and the hash matches. On any failure the
    /// `.part` file is removed and `local_path` is left untouched.
    pub async fn download(&self, local_path: &Path, expected_sha256: &str) -> anyhow::Result<()> {
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(local_path);

        let hash = match self.stream_to(&partial, local_path).await {
            Ok(hash) => hash,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };

        if !hash.eq_ignore_ascii_case(expected_sha256) {
            let _ = tokio::fs::remove_file(&partial).await;
            bail!(
                "Hash verification failed after download of {}.\nLocal:  {}\nRemote: {}",
                self.remote_path,
                hash,
                expected_sha256
            );
        }

        tokio::fs::rename(&partial, local_path)
            .await
            .with_context(|| format!("Cannot move {} into place", partial.display()))?;
        Ok(())
    }

    /// Copy the remote bytes into `partial`, returning their SHA-256.
    async fn stream_to(&self, partial: &Path, local_path: &Path) -> anyhow::Result<String> {
        let total = self.size().await.unwrap_or(0);
        let progress = progress_bar(total, local_path);

        let mut child = self
            .ssh(&format!("cat {}", remote_path_expr(&self.remote_path)))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn ssh")?;

        let mut stdout = child.stdout.take().context("ssh stdout not captured")?;
        let mut stderr = child.stderr.take().context("ssh stderr not captured")?;
        let stderr_task = tokio::spawn(async move {
            let mut s = String::new();
            let _ = stderr.read_to_string(&mut s).await;
            s
        });

        let mut file = tokio::fs::File::create(partial)
            .await
            .with_context(|| format!("Cannot create {}", partial.display()))?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; CHUNK_SIZE];

        loop {
            let n = stdout.read(&mut buf).await.context("Reading from ssh failed")?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n])
                .await
                .with_context(|| format!("Writing {} failed", partial.display()))?;
            progress.inc(n as u64);
        }
        file.flush().await?;
        drop(file);

        let status = child.wait().await?;
        let stderr_text = stderr_task.await.unwrap_or_default();
        progress.finish();

        if !status.success() {
            bail!("Download of {} failed ({}): {}", self.remote_path, status, stderr_text.trim());
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

/// If `local_path` exists and matches the remote SHA-256, do nothing;
/// otherwise download it and verify the result. A stale local copy is
/// removed before downloading, so a failed run never leaves a file that
/// does not match the remote one.
#[instrument(skip(remote), fields(host = %remote.host, remote_path = %remote.remote_path))]
pub async fn ensure_downloaded_and_verified(
    remote: &RemoteFile,
    local_path: &Path,
) -> anyhow::Result<FetchOutcome> {
    info!("Computing remote SHA-256 for {}", remote.remote_path);
    let remote_hash = remote.sha256().await?;

    if local_path.is_file() {
        info!("Local file exists: {}; computing local SHA-256", local_path.display());
        let local_hash = sha256_file(local_path).await?;
        if local_hash.eq_ignore_ascii_case(&remote_hash) {
            info!("Local file already matches remote (hash verified); skipping download");
            return Ok(FetchOutcome::AlreadyVerified);
        }
        warn!("Local file hash mismatch; removing it and re-downloading");
        tokio::fs::remove_file(local_path)
            .await
            .with_context(|| format!("Cannot remove stale {}", local_path.display()))?;
    }

    info!("Downloading {}:{} -> {}", remote.host, remote.remote_path, local_path.display());
    remote.download(local_path, &remote_hash).await?;

    info!("Downloaded and verified {}", local_path.display());
    Ok(FetchOutcome::Downloaded)
}

/// SHA-256 of a local file, hex encoded.
pub async fn sha256_file(path: &Path) -> anyhow::Result<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Cannot open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Single-argument shell quoting.
pub fn sh_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r#"'"'"'"#))
}

/// Shell expression for a remote path; a leading `~` becomes `"$HOME"`
/// because quoting would otherwise suppress tilde expansion.
pub fn remote_path_expr(path: &str) -> String {
    if path == "~" {
        "\"$HOME\"".to_string()
    } else if let Some(rest) = path.strip_prefix("~/") {
        format!("\"$HOME\"/{}", sh_quote(rest))
    } else {
        sh_quote(path)
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

fn progress_bar(total: u64, local_path: &Path) -> ProgressBar {
    let bar = if total > 0 { ProgressBar::new(total) } else { ProgressBar::new_spinner() };
    if let Ok(style) = ProgressStyle::with_template(
        "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
    ) {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_message(
        local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    );
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sh_quote() {
        assert_eq!(sh_quote("plain"), "'plain'");
        assert_eq!(sh_quote("it's"), r#"'it'"'"'s'"#);
    }

    #[test]
    fn test_remote_path_expansion() {
        assert_eq!(
            remote_path_expr("~/KG2.10.2/node_synonymizer.sqlite"),
            "\"$HOME\"/'KG2.10.2/node_synonymizer.sqlite'"
        );
        assert_eq!(remote_path_expr("~"), "\"$HOME\"");
        assert_eq!(remote_path_expr("/data/x y"), "'/data/x y'");
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(partial_path(Path::new("/tmp/a.sqlite")), PathBuf::from("/tmp/a.sqlite.part"));
    }

    #[tokio::test]
    async fn test_sha256_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha256_file(&path).await.unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    /// An `ssh` stand-in that runs the remote command locally. With
    /// `corrupt_cat`, file contents are replaced by garbage while hashes
    /// are still computed on the real file.
    #[cfg(unix)]
    fn fake_ssh(dir: &Path, corrupt_cat: bool) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let cat_branch = if corrupt_cat { "  cat\\ *) printf corrupted ;;\n" } else { "" };
        let script = format!(
            "#!/bin/sh\nfor arg; do cmd=\"$arg\"; done\ncase \"$cmd\" in\n{cat_branch}  *) exec sh -c \"$cmd\" ;;\nesac\n"
        );
        let path = dir.join(if corrupt_cat { "ssh-corrupt" } else { "ssh-local" });
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn local_remote(dir: &Path, ssh_program: PathBuf) -> RemoteFile {
        let served = dir.join("served.sqlite");
        std::fs::write(&served, b"synonymizer bytes").unwrap();
        RemoteFile {
            host: "localhost".into(),
            username: "tester".into(),
            port: 22,
            key_path: None,
            ssh_program,
            remote_path: served.to_string_lossy().into_owned(),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_download_then_skip_when_hashes_match() {
        let dir = tempfile::tempdir().unwrap();
        let remote = local_remote(dir.path(), fake_ssh(dir.path(), false));
        let local = dir.path().join("data").join("local.sqlite");

        let outcome = ensure_downloaded_and_verified(&remote, &local).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Downloaded);
        assert_eq!(std::fs::read(&local).unwrap(), b"synonymizer bytes");
        assert!(!partial_path(&local).exists());

        let outcome = ensure_downloaded_and_verified(&remote, &local).await.unwrap();
        assert_eq!(outcome, FetchOutcome::AlreadyVerified);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hash_mismatch_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let remote = local_remote(dir.path(), fake_ssh(dir.path(), true));
        let local = dir.path().join("local.sqlite");
        // an outdated copy from an earlier release
        std::fs::write(&local, b"old bytes").unwrap();

        let err = ensure_downloaded_and_verified(&remote, &local).await.unwrap_err();
        assert!(err.to_string().contains("Hash verification failed"), "{err}");
        assert!(!local.exists());
        assert!(!partial_path(&local).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_transfer_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut remote = local_remote(dir.path(), fake_ssh(dir.path(), false));
        let local = dir.path().join("local.sqlite");
        remote.remote_path = dir.path().join("missing.sqlite").to_string_lossy().into_owned();

        assert!(remote.download(&local, "00").await.is_err());
        assert!(!local.exists());
        assert!(!partial_path(&local).exists());
    }

    #[tokio::test]
    #[ignore] // Requires SSH access to a provisioning host
    async fn test_remote_sha256() {
        let remote = RemoteFile {
            host: "localhost".into(),
            username: std::env::var("USER").unwrap_or_default(),
            port: 22,
            key_path: None,
            ssh_program: PathBuf::from("ssh"),
            remote_path: "/etc/hostname".into(),
        };
        let hash = remote.sha256().await.unwrap();
        assert_eq!(hash.len(), 64);
    }
}
