//! Service `.env` file handling.
//!
//! The launcher never overwrites a `.env` file wholesale. Keys it manages
//! are updated in place, every other line (comments, blanks, keys written
//! by the service itself) is kept, and new keys are appended.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::LazyLock;

static ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\w.-]+)\s*=\s*(.*)$").unwrap());

/// True if `key` can appear on the left of a `.env` assignment.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '-')
}

/// Parses .env files into a map of environment variables.
///
/// ```
/// use basecamp::config::EnvFileParser;
///
/// let vars = EnvFileParser::parse("# comment\nPORT=3015\nNAME=\"local\"\n");
/// assert_eq!(vars.get("PORT"), Some(&"3015".to_string()));
/// assert_eq!(vars.get("NAME"), Some(&"local".to_string()));
/// ```
pub struct EnvFileParser;

impl EnvFileParser {
    /// Parse env file content into a map of variables.
    pub fn parse(content: &str) -> HashMap<String, String> {
        content
            .lines()
            .filter_map(|line| {
                let caps = ASSIGNMENT.captures(line.trim())?;
                Some((caps[1].to_string(), unquote(caps[2].trim())))
            })
            .collect()
    }

    /// Load an env file, returning an empty map if it doesn't exist.
    pub fn load_optional(path: &Path) -> Result<HashMap<String, String>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Self::parse(&content))
    }
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        unescape(&value[1..value.len() - 1])
    } else if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}

/// Undo the escapes written by [`env_line`] inside double quotes.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// `KEY=value`, double-quoted with escapes when the value spans lines.
fn env_line(key: &str, value: &str) -> String {
    if !value.contains(['\n', '\r']) {
        return format!("{}={}", key, value);
    }
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r");
    format!("{}=\"{}\"", key, escaped)
}

/// Merge `updates` into env file `content`.
///
/// Every assignment of an updated key is rewritten, so duplicates agree.
pub fn merge_env_content(content: &str, updates: &BTreeMap<String, String>) -> String {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut lines: Vec<String> = Vec::new();
    if !content.is_empty() {
        for line in content.split('\n') {
            let updated = ASSIGNMENT
                .captures(line)
                .and_then(|caps| updates.get_key_value(&caps[1]));
            match updated {
                Some((key, value)) => {
                    seen.insert(key.as_str());
                    lines.push(env_line(key, value));
                }
                None => lines.push(line.to_string()),
            }
        }
    }

    let appended: Vec<String> = updates
        .iter()
        .filter(|(k, _)| !seen.contains(k.as_str()))
        .map(|(k, v)| env_line(k, v))
        .collect();

    // Keep appended keys off a dangling trailing newline.
    if lines.last().is_some_and(|l| l.is_empty()) && !appended.is_empty() {
        lines.pop();
        lines.extend(appended);
        lines.push(String::new());
    } else {
        lines.extend(appended);
    }
    lines.join("\n")
}

/// Merge `updates` into the env file at `path`, creating it if needed.
pub fn merge_env_file(path: &Path, updates: &BTreeMap<String, String>) -> Result<()> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };

    let merged = merge_env_content(&content, updates);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, merged).with_context(|| format!("writing {}", path.display()))?;
    tracing::debug!("merged {} keys into {}", updates.len(), path.display());
    Ok(())
}
