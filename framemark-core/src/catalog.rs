//! Catalog store and its sorted view
//!
//! The store is the only owner of [`VideoCatalogEntry`] values. Every mutation
//! bumps a version counter; [`CatalogView`] caches its sorted projection
//! against that counter and the active [`SortState`].

use std::str::FromStr;

use crate::sort::{SortDirection, SortState};
use crate::types::{suffix_match, VideoCatalogEntry};

/// Videos of the opened folder plus the active selection.
#[derive(Debug, Default)]
pub struct CatalogStore {
    entries: Vec<VideoCatalogEntry>,
    selected: Option<String>,
    version: u64,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry and the selection.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.selected = None;
        self.version += 1;
    }

    /// Append a discovered entry; arrival order is preserved.
    pub fn append(&mut self, entry: VideoCatalogEntry) {
        self.entries.push(entry);
        self.version += 1;
    }

    /// Entries in arrival order.
    pub fn entries(&self) -> &[VideoCatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mutation counter, bumped on every change.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, path: &str) -> Option<&VideoCatalogEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Mark `path` as the active selection.
    pub fn select(&mut self, path: &str) {
        self.selected = Some(path.to_string());
        self.version += 1;
    }

    pub fn selected(&self) -> Option<&VideoCatalogEntry> {
        self.selected.as_deref().and_then(|p| self.get(p))
    }

    pub fn selected_path(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Shift the event count of `path` by `delta`, flooring at zero.
    ///
    /// Returns the new count, or `None` when the path is not in the catalog.
    pub fn adjust_event_count(&mut self, path: &str, delta: i64) -> Option<usize> {
        let entry = self.entries.iter_mut().find(|e| e.path == path)?;
        let next = (entry.event_count as i64).saturating_add(delta).max(0);
        entry.event_count = next as usize;
        self.version += 1;
        Some(entry.event_count)
    }

    /// Resolve a summary row's video name to a catalog entry.
    ///
    /// A suffix that starts on a path separator wins over a bare suffix.
    pub fn find_by_name(&self, name: &str) -> Option<&VideoCatalogEntry> {
        let mut loose = None;
        for entry in &self.entries {
            match suffix_match(&entry.path, name) {
                Some(true) => return Some(entry),
                Some(false) if loose.is_none() => loose = Some(entry),
                _ => {}
            }
        }
        loose
    }
}

/// Catalog sort keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogSortKey {
    /// Lexicographic on path
    #[default]
    Name,
    /// Numeric on duration
    Duration,
    /// Numeric on modification time
    Date,
}

impl FromStr for CatalogSortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(CatalogSortKey::Name),
            "duration" => Ok(CatalogSortKey::Duration),
            "date" => Ok(CatalogSortKey::Date),
            _ => Err(format!("unknown catalog sort key: {}", s)),
        }
    }
}

/// Sort entries by key and direction. Stable: ties keep input order.
pub fn sort_catalog(
    entries: &[VideoCatalogEntry],
    sort: SortState<CatalogSortKey>,
) -> Vec<VideoCatalogEntry> {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| {
        let ord = match sort.key {
            CatalogSortKey::Name => a.path.cmp(&b.path),
            CatalogSortKey::Duration => a.duration_sec.total_cmp(&b.duration_sec),
            CatalogSortKey::Date => a.last_modified.cmp(&b.last_modified),
        };
        sort.direction.apply(ord)
    });
    sorted
}

/// Sorted projection of a [`CatalogStore`].
#[derive(Debug)]
pub struct CatalogView {
    sort: SortState<CatalogSortKey>,
    cache: Vec<VideoCatalogEntry>,
    /// (catalog version, sort) the cache was built from
    built_from: Option<(u64, SortState<CatalogSortKey>)>,
}

impl Default for CatalogView {
    fn default() -> Self {
        Self {
            sort: SortState::new(CatalogSortKey::Name),
            cache: Vec::new(),
            built_from: None,
        }
    }
}

impl CatalogView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort(&self) -> SortState<CatalogSortKey> {
        self.sort
    }

    /// Click on a sort key.
    pub fn select_key(&mut self, key: CatalogSortKey) {
        self.sort.select(key);
    }

    /// Force a direction, e.g. from a command line flag.
    pub fn set_direction(&mut self, direction: SortDirection) {
        self.sort.direction = direction;
    }

    /// Sorted entries, rebuilt only when the catalog or sort changed.
    pub fn entries(&mut self, catalog: &CatalogStore) -> &[VideoCatalogEntry] {
        let stamp = (catalog.version(), self.sort);
        if self.built_from != Some(stamp) {
            self.cache = sort_catalog(catalog.entries(), self.sort);
            self.built_from = Some(stamp);
        }
        &self.cache
    }
}
