use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;

use crate::error::{Error, Result};
use crate::index::read_index;
use crate::object::{read_object, Object};
use crate::repo::Repository;

/// one parsed rule: pattern plus whether a match ignores (true) or
/// reinstates (false, from a `!` prefix)
pub type IgnoreRule = (Pattern, bool);

/// ignore rules partitioned the way they are consulted
#[derive(Default)]
pub struct IgnoreRules {
    /// rules from .gitignore files inside the worktree, keyed by the
    /// directory that holds them ("" for the root)
    pub scoped: HashMap<String, Vec<IgnoreRule>>,
    /// rule lists living outside the worktree (info/exclude, then the
    /// global file), consulted in order
    pub absolute: Vec<Vec<IgnoreRule>>,
}

/// parse one .gitignore line; None for blanks and comments
fn parse_rule(line: &str) -> Option<(String, bool)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    if let Some(rest) = line.strip_prefix('!') {
        return Some((rest.to_string(), false));
    }
    if let Some(rest) = line.strip_prefix('\\') {
        return Some((rest.to_string(), true));
    }
    Some((line.to_string(), true))
}

/// parse the lines of one ignore file
pub fn parse_rules(content: &str) -> Vec<IgnoreRule> {
    content
        .lines()
        .filter_map(parse_rule)
        .filter_map(|(raw, value)| match Pattern::new(&raw) {
            Ok(pattern) => Some((pattern, value)),
            Err(e) => {
                log::warn!("skipping unparsable ignore pattern {:?}: {}", raw, e);
                None
            }
        })
        .collect()
}

fn global_ignore_path() -> Option<PathBuf> {
    env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .map(|base| base.join("git/ignore"))
}

/// load all ignore rules for a repository
///
/// scoped rules come from the staged .gitignore blobs recorded in the
/// index, so they match what the next commit will enforce; absolute rules
/// come from .git/info/exclude and the global git/ignore file.
pub fn read_ignore_rules(repo: &Repository) -> Result<IgnoreRules> {
    let mut rules = IgnoreRules::default();

    for path in [Some(repo.git_path("info/exclude")), global_ignore_path()]
        .into_iter()
        .flatten()
    {
        if let Ok(content) = fs::read_to_string(&path) {
            rules.absolute.push(parse_rules(&content));
        }
    }

    for entry in &read_index(repo)?.entries {
        if entry.name == ".gitignore" || entry.name.ends_with("/.gitignore") {
            let dir = dirname(&entry.name).to_string();
            let blob = match read_object(repo, &entry.sha)? {
                Object::Blob(data) => data,
                _ => continue,
            };
            let content = String::from_utf8_lossy(&blob).into_owned();
            rules.scoped.insert(dir, parse_rules(&content));
        }
    }

    Ok(rules)
}

fn dirname(name: &str) -> &str {
    name.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// within one rule list, the last matching rule wins
fn check_rules(rules: &[IgnoreRule], path: &str) -> Option<bool> {
    let mut result = None;
    for (pattern, value) in rules {
        if pattern.matches(path) {
            result = Some(*value);
        }
    }
    result
}

fn check_scoped(scoped: &HashMap<String, Vec<IgnoreRule>>, path: &str) -> Option<bool> {
    // nearest .gitignore that has an opinion decides
    let mut dir = dirname(path);
    loop {
        if let Some(rules) = scoped.get(dir) {
            if let Some(result) = check_rules(rules, path) {
                return Some(result);
            }
        }
        if dir.is_empty() {
            return None;
        }
        dir = dirname(dir);
    }
}

fn check_absolute(absolute: &[Vec<IgnoreRule>], path: &str) -> bool {
    for rules in absolute {
        if let Some(result) = check_rules(rules, path) {
            return result;
        }
    }
    false
}

/// is a worktree-relative path ignored?
pub fn check_ignore(rules: &IgnoreRules, path: &str) -> Result<bool> {
    if Path::new(path).is_absolute() {
        return Err(Error::AbsoluteIgnorePath(PathBuf::from(path)));
    }
    if let Some(result) = check_scoped(&rules.scoped, path) {
        return Ok(result);
    }
    Ok(check_absolute(&rules.absolute, path))
}
