//! Request path remapping derived from the `path_map` key.
//!
//! `path_map = debian ftp.debian.org/debian mirror.example/debian; ubuntu archive.ubuntu.com/ubuntu`
//! maps the first path segment `debian` onto two upstream targets and
//! `ubuntu` onto one. Entries without at least one target are ignored.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMap {
    entries: BTreeMap<String, Vec<String>>,
}

impl PathMap {
    /// Build a map from the raw `path_map` value.
    ///
    /// Always rebuilds from scratch; a later entry for the same key replaces
    /// an earlier one.
    pub fn parse(raw: &str) -> Self {
        let mut entries = BTreeMap::new();
        for entry in raw.split([',', ';']) {
            let mut tokens = entry.split_whitespace();
            let Some(key) = tokens.next() else { continue };
            let targets: Vec<String> = tokens.map(str::to_string).collect();
            if targets.is_empty() {
                continue;
            }
            entries.insert(key.to_string(), targets);
        }
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Split `path` into a mapped prefix and the remainder.
    ///
    /// `/debian/pool/main/x.deb` with a `debian` entry yields that entry's
    /// targets and `pool/main/x.deb`.
    pub fn resolve<'a>(&self, path: &'a str) -> Option<(&[String], &'a str)> {
        let trimmed = path.trim_start_matches('/');
        let (head, rest) = trimmed.split_once('/').unwrap_or((trimmed, ""));
        self.get(head).map(|targets| (targets, rest))
    }
}
