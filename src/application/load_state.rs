// Explicit load-state tracking for the session
use std::collections::HashSet;

/// One place for the flags that would otherwise scatter across call sites:
/// whether the initial structure fetch is running, which request keys are
/// pending, and which tabs already have their widget outputs loaded.
///
/// Loaded markers gate refetching only; they do not cancel in-flight work. A
/// late response for a deselected tab still lands in the output map
/// (last write wins) and the marker decides whether the next selection
/// refetches.
#[derive(Debug, Default)]
pub struct LoadTracker {
    initializing: bool,
    pending_keys: HashSet<String>,
    loaded_tabs: HashSet<String>,
}

impl LoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_initializing(&mut self) {
        self.initializing = true;
    }

    pub fn finish_initializing(&mut self) {
        self.initializing = false;
    }

    pub fn is_initializing(&self) -> bool {
        self.initializing
    }

    /// Mark a request key pending. Returns false when it already was, so the
    /// caller can skip issuing a duplicate.
    pub fn begin_pending(&mut self, key: &str) -> bool {
        self.pending_keys.insert(key.to_string())
    }

    pub fn finish_pending(&mut self, key: &str) {
        self.pending_keys.remove(key);
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending_keys.contains(key)
    }

    pub fn mark_tab_loaded(&mut self, tab_id: &str) {
        self.loaded_tabs.insert(tab_id.to_string());
    }

    pub fn unmark_tab_loaded(&mut self, tab_id: &str) {
        self.loaded_tabs.remove(tab_id);
    }

    pub fn is_tab_loaded(&self, tab_id: &str) -> bool {
        self.loaded_tabs.contains(tab_id)
    }

    /// Drop every loaded marker. Called when the current version switches so
    /// tab contents are refetched under the new version.
    pub fn clear_loaded_tabs(&mut self) {
        self.loaded_tabs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_keys_deduplicate() {
        let mut tracker = LoadTracker::new();
        assert!(tracker.begin_pending("structure:d1"));
        assert!(!tracker.begin_pending("structure:d1"));
        tracker.finish_pending("structure:d1");
        assert!(!tracker.is_pending("structure:d1"));
    }

    #[test]
    fn initializing_flag_follows_transitions() {
        let mut tracker = LoadTracker::new();
        assert!(!tracker.is_initializing());
        tracker.begin_initializing();
        assert!(tracker.is_initializing());
        tracker.finish_initializing();
        assert!(!tracker.is_initializing());
    }

    #[test]
    fn version_switch_clears_loaded_markers() {
        let mut tracker = LoadTracker::new();
        tracker.mark_tab_loaded("t1");
        tracker.mark_tab_loaded("t2");
        assert!(tracker.is_tab_loaded("t1"));
        tracker.clear_loaded_tabs();
        assert!(!tracker.is_tab_loaded("t1"));
        assert!(!tracker.is_tab_loaded("t2"));
    }
}
