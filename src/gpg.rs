use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::cache::KeyCache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::packet::parse_recipients;
use crate::parse::parse_colons;
use crate::runner::{Invocation, ProcessRunner, RunOutput, Runner};
use crate::types::{KeyKind, KeyList};
use crate::validation::validate_selector;

const FILE_MODE: u32 = 0o600;
const DIR_MODE: u32 = 0o700;

/// Messages gpg prints when a secret-key listing fails only because there
/// is no secret key material: gpg 1.x says "secret key not available",
/// gpg 2.2 and later "No secret key".
const NO_SECRET_KEY_MESSAGES: &[&str] = &["secret key not available", "No secret key"];

/// Interface to the gpg command-line tool.
///
/// Key listings are parsed into [`KeyList`]s; the full public and secret
/// listings are cached on the instance until a key is imported.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> gpg_cli::Result<()> {
/// use gpg_cli::{Config, Gpg};
///
/// let gpg = Gpg::new(Config::default());
/// for key in gpg.list_public_keys().await?.iter() {
///     println!("{key}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Gpg<R = ProcessRunner> {
    binary: PathBuf,
    config: Config,
    runner: R,
    cache: KeyCache,
}

impl Default for Gpg {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Gpg {
    /// Creates a wrapper that runs gpg as a child process.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_runner(config, ProcessRunner::new())
    }
}

impl<R: Runner> Gpg<R> {
    /// Creates a wrapper that executes gpg through `runner`.
    #[must_use]
    pub fn with_runner(config: Config, runner: R) -> Self {
        let binary = config.resolve_binary();
        debug!(binary = %binary.display(), "using gpg binary");
        Self {
            binary,
            config,
            runner,
            cache: KeyCache::default(),
        }
    }

    /// The resolved gpg binary.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn invocation(
        &self,
        operation: &'static str,
        args: Vec<String>,
        stdin: Option<Vec<u8>>,
    ) -> Invocation {
        let mut full = Vec::with_capacity(args.len() + 1);
        if let Some(homedir) = &self.config.homedir {
            full.push(format!("--homedir={}", homedir.display()));
        }
        full.extend(args);

        Invocation {
            operation,
            program: self.binary.clone(),
            args: full,
            stdin,
            timeout_secs: self.config.timeout_secs,
        }
    }

    async fn run_gpg(
        &self,
        operation: &'static str,
        args: Vec<String>,
        stdin: Option<Vec<u8>>,
    ) -> Result<RunOutput> {
        let invocation = self.invocation(operation, args, stdin);
        debug!(
            operation,
            program = %invocation.program.display(),
            args = ?invocation.args,
            "running gpg"
        );

        let output = self
            .runner
            .run(&invocation)
            .await
            .map_err(|e| e.with_operation(operation))?;
        debug!(operation, status = ?output.code, "gpg finished");
        Ok(output)
    }

    async fn run_checked(
        &self,
        operation: &'static str,
        args: Vec<String>,
        stdin: Option<Vec<u8>>,
    ) -> Result<RunOutput> {
        let output = self.run_gpg(operation, args, stdin).await?;
        if !output.success() {
            return Err(check_gpg_error(operation, &output));
        }
        Ok(output)
    }

    /// Lists keys of `kind` matching `search`, or all keys if `search` is
    /// empty.
    async fn list_keys(&self, kind: KeyKind, search: &[&str]) -> Result<KeyList> {
        for term in search {
            validate_selector(term)?;
        }

        let flag = kind.listing_flag();
        let operation = flag.trim_start_matches('-');
        let mut args: Vec<String> = ["--with-colons", "--with-fingerprint", "--fixed-list-mode", flag]
            .iter()
            .map(|a| a.to_string())
            .collect();
        args.extend(search.iter().map(|s| s.to_string()));

        let output = self.run_gpg(operation, args, None).await?;
        if !output.success() {
            if kind == KeyKind::Secret && reports_no_secret_key(&output) {
                debug!("no secret keys available");
                return Ok(KeyList::default());
            }
            return Err(check_gpg_error(operation, &output));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_colons(&stdout, kind))
    }

    async fn list_cached(&self, kind: KeyKind) -> Result<Arc<KeyList>> {
        if let Some(keys) = self.cache.get(kind) {
            debug!(?kind, "key list cache hit");
            return Ok(keys);
        }
        let keys = self.list_keys(kind, &[]).await?;
        Ok(self.cache.store(kind, keys))
    }

    /// Lists all public keys. The result is cached until the next import.
    pub async fn list_public_keys(&self) -> Result<Arc<KeyList>> {
        self.list_cached(KeyKind::Public).await
    }

    /// Lists public keys matching any of `search`, bypassing the cache.
    pub async fn find_public_keys(&self, search: &[&str]) -> Result<KeyList> {
        self.list_keys(KeyKind::Public, search).await
    }

    /// Lists all secret keys. The result is cached until the next import.
    ///
    /// A keyring without secret keys gives an empty list.
    pub async fn list_secret_keys(&self) -> Result<Arc<KeyList>> {
        self.list_cached(KeyKind::Secret).await
    }

    /// Lists secret keys matching any of `search`, bypassing the cache.
    pub async fn find_secret_keys(&self, search: &[&str]) -> Result<KeyList> {
        self.list_keys(KeyKind::Secret, search).await
    }

    /// Returns the key IDs an encrypted file is addressed to, without
    /// decrypting it.
    pub async fn recipients(&self, path: impl AsRef<Path>) -> Result<Vec<String>> {
        let path = path_arg(path.as_ref())?;
        let args = [
            "--batch",
            "--list-only",
            "--list-packets",
            "--no-default-keyring",
            "--secret-keyring",
            "/dev/null",
        ]
        .iter()
        .map(|a| a.to_string())
        .chain([path])
        .collect();

        let output = self.run_checked("list-packets", args, None).await?;

        let mut dump = String::from_utf8_lossy(&output.stdout).into_owned();
        dump.push('\n');
        dump.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(parse_recipients(&dump))
    }

    /// Encrypts `content` for `recipients` into the file at `path`,
    /// creating parent directories as needed.
    pub async fn encrypt(
        &self,
        path: impl AsRef<Path>,
        content: &[u8],
        recipients: &[&str],
    ) -> Result<()> {
        if recipients.is_empty() {
            return Err(Error::NoRecipients);
        }
        for recipient in recipients {
            validate_selector(recipient)?;
        }

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            create_private_dir(parent).await?;
        }

        let mut args = self.config.effective_args();
        args.extend(["--encrypt".to_string(), "--output".to_string(), path_arg(path)?]);
        if self.config.always_trust {
            args.push("--trust-model=always".to_string());
        }
        for recipient in recipients {
            args.push("--recipient".to_string());
            args.push(recipient.to_string());
        }

        self.run_checked("encrypt", args, Some(content.to_vec()))
            .await?;
        Ok(())
    }

    /// Decrypts the file at `path` and returns the plaintext.
    pub async fn decrypt(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let mut args = self.config.effective_args();
        args.extend(["--decrypt".to_string(), path_arg(path.as_ref())?]);

        let output = self.run_checked("decrypt", args, None).await?;
        Ok(output.stdout)
    }

    /// Writes the ASCII-armored public key `id` to `filename` with
    /// owner-only permissions.
    ///
    /// Returns [`Error::KeyNotFound`] when gpg exports nothing; no file is
    /// written in that case.
    pub async fn export_public_key(&self, id: &str, filename: impl AsRef<Path>) -> Result<()> {
        validate_selector(id)?;

        let mut args = self.config.effective_args();
        args.extend(["--armor".to_string(), "--export".to_string(), id.to_string()]);

        let output = self.run_checked("export", args, None).await?;
        if output.stdout.is_empty() {
            return Err(Error::KeyNotFound(id.to_string()));
        }

        write_private_file(filename.as_ref(), &output.stdout).await
    }

    /// Imports keys from `filename` and clears both cached key lists.
    pub async fn import_public_key(&self, filename: impl AsRef<Path>) -> Result<()> {
        let filename = filename.as_ref();
        let buf = tokio::fs::read(filename).await.map_err(|source| Error::Io {
            path: filename.to_path_buf(),
            source,
        })?;

        let mut args = self.config.effective_args();
        args.push("--import".to_string());

        self.run_checked("import", args, Some(buf)).await?;
        self.cache.invalidate();
        debug!(file = %filename.display(), "imported keys, cleared key list cache");
        Ok(())
    }
}

fn check_gpg_error(operation: &'static str, output: &RunOutput) -> Error {
    let msg = String::from_utf8_lossy(&output.stderr);

    if msg.contains("Permission denied") || msg.contains("permission denied") {
        return Error::PermissionDenied { operation };
    }

    Error::Gpg {
        operation,
        status: output.code.unwrap_or(-1),
        stderr: msg.trim().to_string(),
    }
}

fn reports_no_secret_key(output: &RunOutput) -> bool {
    [&output.stdout, &output.stderr].iter().any(|stream| {
        let text = String::from_utf8_lossy(stream);
        NO_SECRET_KEY_MESSAGES.iter().any(|m| text.contains(m))
    })
}

fn path_arg(path: &Path) -> Result<String> {
    path.to_str().map(str::to_string).ok_or_else(|| Error::Io {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "path is not valid UTF-8"),
    })
}

async fn create_private_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }

    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(DIR_MODE);
    builder.create(dir).await.map_err(|source| Error::Io {
        path: dir.to_path_buf(),
        source,
    })
}

async fn write_private_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_private_dir(parent).await?;
    }

    let io_err = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(FILE_MODE);

    let mut file = options.open(path).await.map_err(io_err)?;
    file.write_all(contents).await.map_err(io_err)?;
    file.flush().await.map_err(io_err)?;
    Ok(())
}
