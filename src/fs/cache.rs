//! Per-tenant directory listing cache.

use std::collections::{BTreeMap, HashMap};

use super::node::EntryMetadata;
use super::operations::split_parent;

/// Outcome of a point lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The parent listing is not cached; ask the remote.
    NotCached,
    /// The parent listing is cached and has no such name.
    Missing,
    Found(EntryMetadata),
}

/// Directory path to complete child listing, keyed by child name.
#[derive(Debug, Default)]
pub struct MetadataCache {
    dirs: HashMap<String, BTreeMap<String, EntryMetadata>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole listing of `dir`.
    pub fn put(&mut self, dir: &str, entries: Vec<EntryMetadata>) {
        let listing = entries
            .into_iter()
            .map(|e| (e.name.clone(), e))
            .collect();
        self.dirs.insert(dir.to_string(), listing);
    }

    /// Cached listing of `dir`, if any.
    pub fn dir(&self, dir: &str) -> Option<&BTreeMap<String, EntryMetadata>> {
        self.dirs.get(dir)
    }

    pub fn get(&self, path: &str) -> Lookup {
        let Some((parent, name)) = split_parent(path) else {
            return Lookup::NotCached;
        };
        match self.dirs.get(parent) {
            None => Lookup::NotCached,
            Some(listing) => match listing.get(name) {
                Some(entry) => Lookup::Found(entry.clone()),
                None => Lookup::Missing,
            },
        }
    }

    /// Drop the listing of `path`, every listing below it, and the parent
    /// listing.
    pub fn remove(&mut self, path: &str) {
        self.dirs.retain(|dir, _| !is_within(dir, path));
        if let Some((parent, _)) = split_parent(path) {
            self.dirs.remove(parent);
        }
    }

    pub fn clear(&mut self) {
        self.dirs.clear();
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}

fn is_within(dir: &str, path: &str) -> bool {
    path == "/"
        || dir
            .strip_prefix(path)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}
