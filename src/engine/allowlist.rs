//! Liquidity-pool allowlist: one asset unit per line.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

/// Read the allowlist at `path` once.
///
/// Trailing whitespace (including `\r`) is stripped from each line;
/// blank lines are ignored.
pub fn load(path: &Path) -> io::Result<HashSet<String>> {
    let contents = fs::read_to_string(path)?;
    let set = parse(&contents);
    debug!(path = %path.display(), entries = set.len(), "Allowlist loaded");
    Ok(set)
}

pub fn parse(contents: &str) -> HashSet<String> {
    contents
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}
