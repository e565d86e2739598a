use std::path::{Path, PathBuf};

/// Arguments for non-interactive use. `--batch` is left out because it
/// suppresses passphrase prompts.
pub const DEFAULT_ARGS: &[&str] = &[
    "--quiet",
    "--yes",
    "--compress-algo=none",
    "--no-encrypt-to",
    "--no-auto-check-trustdb",
];

const FALLBACK_BINARIES: &[&str] = &["gpg2", "gpg1", "gpg"];

/// Settings for a [`Gpg`](crate::Gpg) instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Preferred gpg binary, tried before the `gpg2`, `gpg1`, `gpg` fallbacks.
    pub binary: Option<PathBuf>,
    /// Arguments passed to encrypt, decrypt, import and export calls.
    /// Empty means [`DEFAULT_ARGS`].
    pub args: Vec<String>,
    /// Encrypt with `--trust-model=always`. Must be opted into explicitly.
    pub always_trust: bool,
    /// GnuPG home directory; gpg's own default when `None`.
    pub homedir: Option<PathBuf>,
    /// Per-call timeout, in seconds. If None, no timeout is applied.
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            binary: None,
            args: DEFAULT_ARGS.iter().map(|a| a.to_string()).collect(),
            always_trust: false,
            homedir: None,
            timeout_secs: None,
        }
    }
}

impl Config {
    pub(crate) fn effective_args(&self) -> Vec<String> {
        if self.args.is_empty() {
            DEFAULT_ARGS.iter().map(|a| a.to_string()).collect()
        } else {
            self.args.clone()
        }
    }

    /// Picks the first of the configured binary, `gpg2`, `gpg1` and `gpg`
    /// that resolves to an executable file, falling back to plain `gpg`.
    ///
    /// Bare names are searched on `PATH`; paths are checked as given.
    pub fn resolve_binary(&self) -> PathBuf {
        self.binary
            .iter()
            .map(PathBuf::as_path)
            .chain(FALLBACK_BINARIES.iter().map(Path::new))
            .find_map(|candidate| which::which(candidate).ok())
            .unwrap_or_else(|| PathBuf::from("gpg"))
    }
}
