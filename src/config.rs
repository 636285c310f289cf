use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use configparser::ini::Ini;

use crate::error::{Error, Result};

/// repository configuration, stored as INI in .git/config
pub struct Config {
    ini: Ini,
}

impl Config {
    /// the config written by init: format version 0, non-bare, filemode off
    pub fn default_repo() -> Self {
        let mut ini = Ini::new();
        ini.set("core", "repositoryformatversion", Some("0".to_string()));
        ini.set("core", "filemode", Some("false".to_string()));
        ini.set("core", "bare", Some("false".to_string()));
        Self { ini }
    }

    /// load config from a file
    pub fn load(path: &Path) -> Result<Self> {
        let mut ini = Ini::new();
        ini.load(path).map_err(Error::Config)?;
        Ok(Self { ini })
    }

    /// save config to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        self.ini.write(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// core.repositoryformatversion, if present
    pub fn format_version(&self) -> Option<String> {
        self.ini.get("core", "repositoryformatversion")
    }
}

/// a commit author or tagger
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// the config files consulted for the user identity, in priority order
fn identity_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    let xdg = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")));
    if let Some(xdg) = xdg {
        paths.push(xdg.join("git/config"));
    }
    if let Some(home) = env::var_os("HOME") {
        paths.push(PathBuf::from(home).join(".gitconfig"));
    }

    paths
}

/// resolve the user identity from git's global config files
///
/// reads `$XDG_CONFIG_HOME/git/config` (default `~/.config`) then
/// `~/.gitconfig`; the first file with both `user.name` and `user.email`
/// wins.
pub fn user_identity() -> Result<Identity> {
    identity_from_paths(&identity_config_paths())
}

fn identity_from_paths(paths: &[PathBuf]) -> Result<Identity> {
    for path in paths {
        if !path.is_file() {
            continue;
        }
        let mut ini = Ini::new();
        if ini.load(path).is_err() {
            continue;
        }
        if let (Some(name), Some(email)) = (ini.get("user", "name"), ini.get("user", "email")) {
            return Ok(Identity { name, email });
        }
    }
    Err(Error::IdentityMissing)
}
