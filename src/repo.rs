use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, IoResultExt, Result};

/// a repository: a worktree with a .git directory inside it
pub struct Repository {
    worktree: PathBuf,
    gitdir: PathBuf,
    config: Config,
}

impl Repository {
    /// create a new repository at the given path
    pub fn create(path: &Path) -> Result<Self> {
        let worktree = path.to_path_buf();
        let gitdir = worktree.join(".git");

        if worktree.exists() {
            if !worktree.is_dir() {
                return Err(Error::NotADirectory(worktree));
            }
        } else {
            fs::create_dir_all(&worktree).with_path(&worktree)?;
        }

        if gitdir.exists() && gitdir.read_dir().with_path(&gitdir)?.next().is_some() {
            return Err(Error::GitdirNotEmpty(gitdir));
        }

        for dir in ["objects", "refs/heads", "refs/tags", "branches"] {
            let p = gitdir.join(dir);
            fs::create_dir_all(&p).with_path(&p)?;
        }

        let description = gitdir.join("description");
        fs::write(
            &description,
            "Unnamed repository; edit this file 'description' to name the repository.\n",
        )
        .with_path(&description)?;

        let head = gitdir.join("HEAD");
        fs::write(&head, "ref: refs/heads/master\n").with_path(&head)?;

        let config = Config::default_repo();
        config.save(&gitdir.join("config"))?;

        log::debug!("created repository at {}", gitdir.display());

        Ok(Self {
            worktree,
            gitdir,
            config,
        })
    }

    /// open the repository whose worktree is at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let worktree = path.to_path_buf();
        let gitdir = worktree.join(".git");

        if !gitdir.is_dir() {
            return Err(Error::NoRepo(worktree));
        }

        let config = Config::load(&gitdir.join("config"))?;
        match config.format_version() {
            Some(v) if v == "0" => {}
            other => return Err(Error::UnsupportedFormatVersion(other.unwrap_or_default())),
        }

        Ok(Self {
            worktree,
            gitdir,
            config,
        })
    }

    /// find a repository by walking the ancestors of start
    pub fn find(start: &Path) -> Result<Self> {
        let mut dir = start.canonicalize().with_path(start)?;
        loop {
            if dir.join(".git").is_dir() {
                return Self::open(&dir);
            }
            if !dir.pop() {
                return Err(Error::NoRepo(start.to_path_buf()));
            }
        }
    }

    /// working directory root
    pub fn worktree(&self) -> &Path {
        &self.worktree
    }

    /// the .git directory
    pub fn gitdir(&self) -> &Path {
        &self.gitdir
    }

    /// repository configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// resolve a path under the gitdir
    pub fn git_path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.gitdir.join(rel)
    }

    /// resolve a directory under the gitdir, creating missing intermediates
    pub fn git_dir(&self, rel: impl AsRef<Path>) -> Result<PathBuf> {
        let path = self.gitdir.join(rel);
        fs::create_dir_all(&path).with_path(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("repo");

        let repo = Repository::create(&path).unwrap();

        assert!(path.join(".git/objects").is_dir());
        assert!(path.join(".git/refs/heads").is_dir());
        assert!(path.join(".git/refs/tags").is_dir());
        assert!(path.join(".git/config").is_file());
        assert_eq!(
            fs::read_to_string(path.join(".git/HEAD")).unwrap(),
            "ref: refs/heads/master\n"
        );
        assert_eq!(repo.worktree(), path);
    }

    #[test]
    fn test_create_gitdir_not_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("repo");

        Repository::create(&path).unwrap();
        let result = Repository::create(&path);

        assert!(matches!(result, Err(Error::GitdirNotEmpty(_))));
    }

    #[test]
    fn test_create_target_is_a_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("occupied");
        fs::write(&path, "not a directory").unwrap();

        let result = Repository::create(&path);
        assert!(matches!(result, Err(Error::NotADirectory(_))));
    }

    #[test]
    fn test_find_from_subdirectory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("repo");
        Repository::create(&path).unwrap();

        let sub = path.join("a/b/c");
        fs::create_dir_all(&sub).unwrap();

        let repo = Repository::find(&sub).unwrap();
        assert_eq!(repo.worktree(), path.canonicalize().unwrap());
    }

    #[test]
    fn test_find_no_repo() {
        let dir = tempdir().unwrap();
        let result = Repository::find(dir.path());
        assert!(matches!(result, Err(Error::NoRepo(_))));
    }

    #[test]
    fn test_git_dir_creates_intermediates() {
        let dir = tempdir().unwrap();
        let repo = Repository::create(&dir.path().join("repo")).unwrap();

        let path = repo.git_dir("refs/remotes/origin").unwrap();
        assert!(path.is_dir());
    }
}
