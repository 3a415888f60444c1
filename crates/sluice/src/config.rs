//! CLI arguments and the immutable run configuration derived from them.

use anyhow::{bail, Context, Result};
use clap::Parser;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "sluice",
    about = "Watch-and-sync pipeline for ready-marked folders",
    version
)]
pub struct Cli {
    /// Directory to scan for marker files
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Recursively scan subdirectories
    #[arg(long)]
    pub recursive: bool,

    /// Follow directory symlinks when recursive
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Path to the persistent state file (default: <root>/.sluice_state.json)
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Disable state persistence entirely (no reading or writing)
    #[arg(long)]
    pub no_state: bool,

    /// Path to the lock file (default: per-root hash under the temp dir)
    #[arg(long)]
    pub lock_file: Option<PathBuf>,

    /// Deliver eligible folders under this destination instead of
    /// reporting JSON on stdout
    #[arg(long)]
    pub dest: Option<PathBuf>,

    /// Record a metadata document per delivered folder; requires --dest
    #[arg(long, value_name = "NAMESPACE:COLLECTION")]
    pub meta: Option<String>,

    /// Max concurrent folder deliveries (0 = auto)
    #[arg(long, default_value_t = 0)]
    pub folder_concurrency: usize,

    /// Max concurrent file deliveries within a folder (0 = auto)
    #[arg(long, default_value_t = 0)]
    pub file_concurrency: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Where delivered-folder metadata documents are recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaTarget {
    pub namespace: String,
    pub collection: String,
}

impl MetaTarget {
    /// Parse the `NAMESPACE:COLLECTION` flag value.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.split_once(':') {
            Some((namespace, collection)) if !namespace.is_empty() && !collection.is_empty() => {
                Ok(Self {
                    namespace: namespace.to_string(),
                    collection: collection.to_string(),
                })
            }
            _ => bail!("invalid --meta format, expected NAMESPACE:COLLECTION"),
        }
    }
}

/// Immutable configuration for one run, constructed once and passed
/// explicitly into every component.
#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub recursive: bool,
    pub follow_symlinks: bool,
    /// `None` disables state persistence.
    pub state_file: Option<PathBuf>,
    pub lock_file: PathBuf,
    pub dest: Option<PathBuf>,
    pub meta: Option<MetaTarget>,
    pub folder_concurrency: usize,
    pub file_concurrency: usize,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let root = absolutize(&cli.root).context("resolve root")?;

        if cli.meta.is_some() && cli.dest.is_none() {
            bail!("--meta requires --dest");
        }
        let meta = cli.meta.as_deref().map(MetaTarget::parse).transpose()?;

        let lock_file = cli.lock_file.unwrap_or_else(|| default_lock_file(&root));
        let state_file = if cli.no_state {
            None
        } else {
            Some(
                cli.state_file
                    .unwrap_or_else(|| root.join(".sluice_state.json")),
            )
        };

        Ok(Self {
            root,
            recursive: cli.recursive,
            follow_symlinks: cli.follow_symlinks,
            state_file,
            lock_file,
            dest: cli.dest,
            meta,
            folder_concurrency: cli.folder_concurrency,
            file_concurrency: cli.file_concurrency,
        })
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Deterministic per-root lock path under the temp dir, so two runs over
/// the same root contend while runs over different roots do not.
fn default_lock_file(root: &Path) -> PathBuf {
    let digest = Sha256::digest(root.to_string_lossy().as_bytes());
    let short: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    std::env::temp_dir().join(format!("sluice-{short}.lock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli::parse_from(["sluice"])
    }

    #[test]
    fn meta_parse_accepts_namespace_and_collection() {
        let meta = MetaTarget::parse("prod:folders").unwrap();
        assert_eq!(meta.namespace, "prod");
        assert_eq!(meta.collection, "folders");
    }

    #[test]
    fn meta_parse_rejects_bad_formats() {
        assert!(MetaTarget::parse("noseparator").is_err());
        assert!(MetaTarget::parse(":folders").is_err());
        assert!(MetaTarget::parse("prod:").is_err());
    }

    #[test]
    fn meta_requires_dest() {
        let mut cli = base_cli();
        cli.meta = Some("prod:folders".to_string());
        assert!(Config::from_cli(cli).is_err());
    }

    #[test]
    fn defaults_are_derived_from_root() {
        let mut cli = base_cli();
        cli.root = PathBuf::from("/data/drop");
        let cfg = Config::from_cli(cli).unwrap();

        assert_eq!(
            cfg.state_file.as_deref(),
            Some(Path::new("/data/drop/.sluice_state.json"))
        );
        let lock_name = cfg.lock_file.file_name().unwrap().to_string_lossy().into_owned();
        assert!(lock_name.starts_with("sluice-"));
        assert!(lock_name.ends_with(".lock"));
    }

    #[test]
    fn same_root_yields_same_lock_path() {
        let a = default_lock_file(Path::new("/data/drop"));
        let b = default_lock_file(Path::new("/data/drop"));
        let c = default_lock_file(Path::new("/data/other"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn no_state_disables_persistence() {
        let mut cli = base_cli();
        cli.no_state = true;
        cli.state_file = Some(PathBuf::from("/ignored.json"));
        let cfg = Config::from_cli(cli).unwrap();
        assert!(cfg.state_file.is_none());
    }
}
