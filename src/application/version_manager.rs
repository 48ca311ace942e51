// Version manager - the draft/published state machine
//
// Every transition either succeeds atomically or returns an error with the
// in-memory structure untouched. Rejections surface as user-facing Notify
// events; the caller's structure is never half-mutated.
use crate::application::events::{DashboardEvent, EventBus, NotifyLevel};
use crate::application::load_state::LoadTracker;
use crate::application::placement::{self, DEFAULT_GRID_COLS};
use crate::application::structure_repository::DraftSave;
use crate::domain::{
    Dashboard, DashboardError, DashboardItem, Position, Tab, Version, VersionKind, Widget,
};
use crate::infrastructure::gateway::DataGateway;
use chrono::NaiveDate;
use std::sync::{Arc, Mutex};

const MAX_TITLE_LEN: usize = 120;

pub struct VersionManager {
    dashboard_id: String,
    title: String,
    draft: Option<Version>,
    published: Option<Version>,
    current: VersionKind,
    editable: bool,
    can_edit: bool,
    can_publish: bool,
    dirty: bool,
    grid_cols: u32,
    next_local_id: u32,
    gateway: DataGateway,
    events: EventBus,
    tracker: Arc<Mutex<LoadTracker>>,
}

impl VersionManager {
    /// Initialize from a fetched structure. A published version wins as the
    /// starting point; with only a draft the editor opens editable; with
    /// neither slot it defaults to an editable draft view with `can_edit`
    /// off until a structure exists.
    pub fn from_structure(
        structure: Dashboard,
        gateway: DataGateway,
        events: EventBus,
        tracker: Arc<Mutex<LoadTracker>>,
    ) -> Self {
        let has_draft = structure.draft.is_some();
        let has_published = structure.published.is_some();

        let (current, editable, can_edit, can_publish) = if has_published {
            (VersionKind::Published, false, has_draft, false)
        } else if has_draft {
            (VersionKind::Draft, true, true, true)
        } else {
            (VersionKind::Draft, true, false, false)
        };

        Self {
            dashboard_id: structure.id,
            title: structure.title,
            draft: structure.draft,
            published: structure.published,
            current,
            editable,
            can_edit,
            can_publish,
            dirty: false,
            grid_cols: DEFAULT_GRID_COLS,
            next_local_id: 1,
            gateway,
            events,
            tracker,
        }
    }

    pub fn dashboard_id(&self) -> &str {
        &self.dashboard_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn current(&self) -> VersionKind {
        self.current
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn can_edit(&self) -> bool {
        self.can_edit
    }

    pub fn can_publish(&self) -> bool {
        self.can_publish
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn has_draft(&self) -> bool {
        self.draft.is_some()
    }

    pub fn has_published(&self) -> bool {
        self.published.is_some()
    }

    /// Snapshot of the draft as a whole-set save payload, when a draft
    /// exists.
    pub fn draft_save(&self) -> Option<DraftSave> {
        self.draft.as_ref().map(|draft| DraftSave {
            version_id: draft.id.clone(),
            dashboard_id: self.dashboard_id.clone(),
            tabs: draft.tabs.clone(),
        })
    }

    pub fn current_version(&self) -> Option<&Version> {
        match self.current {
            VersionKind::Draft => self.draft.as_ref(),
            VersionKind::Published => self.published.as_ref(),
        }
    }

    /// Tabs of the current version, in display order.
    pub fn tabs(&self) -> &[Tab] {
        self.current_version().map(|v| v.tabs.as_slice()).unwrap_or(&[])
    }

    pub fn find_tab(&self, tab_id: &str) -> Option<&Tab> {
        self.tabs().iter().find(|t| t.id == tab_id)
    }

    // ---- version transitions ----

    pub fn switch_to_draft(&mut self) -> Result<(), DashboardError> {
        if self.draft.is_none() {
            return Err(self.reject(DashboardError::Permission(
                "no draft version to switch to".to_string(),
            )));
        }
        self.current = VersionKind::Draft;
        self.editable = true;
        self.can_edit = true;
        self.can_publish = self.published.is_some();
        self.clear_loaded_tabs();
        self.events.emit(DashboardEvent::VersionSwitched {
            current: VersionKind::Draft,
        });
        Ok(())
    }

    pub fn switch_to_published(&mut self) -> Result<(), DashboardError> {
        if self.published.is_none() {
            return Err(self.reject(DashboardError::Permission(
                "no published version to switch to".to_string(),
            )));
        }
        self.current = VersionKind::Published;
        self.editable = false;
        self.can_edit = self.draft.is_some();
        self.can_publish = false;
        self.clear_loaded_tabs();
        self.events.emit(DashboardEvent::VersionSwitched {
            current: VersionKind::Published,
        });
        Ok(())
    }

    /// Persist the draft's entire tab set. The server response becomes the
    /// new draft record, taking over any locally generated ids.
    pub async fn save_draft(&mut self) -> Result<(), DashboardError> {
        self.require_draft("saving")?;
        let draft = self.draft.as_ref().expect("checked by require_draft");
        let payload = DraftSave {
            version_id: draft.id.clone(),
            dashboard_id: self.dashboard_id.clone(),
            tabs: draft.tabs.clone(),
        };

        match self.gateway.save_draft(&payload).await {
            Ok(version) => {
                self.adopt_saved_draft(version);
                Ok(())
            }
            Err(err) => {
                self.events.notify(NotifyLevel::Error, err.to_string());
                Err(err)
            }
        }
    }

    /// Install the server's saved draft record, adopting any ids it assigned
    /// to locally created tabs and items, and clear the dirty flag.
    pub fn adopt_saved_draft(&mut self, version: Version) {
        self.draft = Some(version);
        self.dirty = false;
        self.events.emit(DashboardEvent::DraftSaved);
    }

    /// Publish the draft: persist it if dirty, replace the published slot
    /// with the backend's new record, then switch to the published view.
    pub async fn publish_draft(&mut self) -> Result<(), DashboardError> {
        self.require_draft("publishing")?;
        if self.dirty {
            self.save_draft().await?;
        }

        match self.gateway.publish_draft(&self.dashboard_id).await {
            Ok(version) => {
                self.published = Some(version);
                self.events.emit(DashboardEvent::Published);
                self.switch_to_published()
            }
            Err(err) => {
                self.events.notify(NotifyLevel::Error, err.to_string());
                Err(err)
            }
        }
    }

    // ---- structural edits (draft only) ----

    pub fn add_tab(
        &mut self,
        title: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<String, DashboardError> {
        self.require_draft("adding a tab")?;
        self.validate_title(title)?;
        self.validate_dates(start_date, end_date)?;

        let id = self.next_local_id("tab");
        let draft = self.draft.as_mut().expect("checked by require_draft");
        // Server-delivered positions may be sparse; append past the highest.
        let position = draft
            .tabs
            .iter()
            .map(|t| t.position)
            .max()
            .map_or(0, |p| p + 1);
        draft.tabs.push(Tab {
            id: id.clone(),
            title: title.trim().to_string(),
            position,
            start_date,
            end_date,
            items: Vec::new(),
        });
        self.mark_changed();
        Ok(id)
    }

    pub fn rename_tab(&mut self, tab_id: &str, title: &str) -> Result<(), DashboardError> {
        self.require_draft("renaming a tab")?;
        self.validate_title(title)?;
        let tab = self.draft_tab_mut(tab_id)?;
        tab.title = title.trim().to_string();
        self.mark_changed();
        Ok(())
    }

    pub fn delete_tab(&mut self, tab_id: &str) -> Result<(), DashboardError> {
        self.require_draft("deleting a tab")?;
        let draft = self.draft.as_mut().expect("checked by require_draft");
        let before = draft.tabs.len();
        draft.tabs.retain(|t| t.id != tab_id);
        if draft.tabs.len() == before {
            return Err(self.reject(DashboardError::NotFound(format!("tab {}", tab_id))));
        }
        // Keep display positions dense after removal.
        for (index, tab) in draft.tabs.iter_mut().enumerate() {
            tab.position = index as i32;
        }
        self.mark_changed();
        Ok(())
    }

    /// Change a tab's date range. Outputs computed for the old range are
    /// stale, so the tab's loaded marker is dropped.
    pub fn set_tab_dates(
        &mut self,
        tab_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<(), DashboardError> {
        self.require_draft("changing tab dates")?;
        self.validate_dates(start_date, end_date)?;
        let tab = self.draft_tab_mut(tab_id)?;
        tab.start_date = start_date;
        tab.end_date = end_date;
        if let Ok(mut tracker) = self.tracker.lock() {
            tracker.unmark_tab_loaded(tab_id);
        }
        self.mark_changed();
        Ok(())
    }

    /// Place a widget on a tab, resolving collisions against the existing
    /// arrangement. Returns the new item's id.
    pub fn add_item(
        &mut self,
        tab_id: &str,
        widget: Widget,
        candidate: Position,
    ) -> Result<String, DashboardError> {
        self.require_draft("adding a widget")?;
        if candidate.w == 0 || candidate.h == 0 {
            return Err(self.reject(DashboardError::Validation(
                "malformed drop target".to_string(),
            )));
        }

        let clamped = placement::clamp_to_minimums(widget.output_type, candidate);
        let grid_cols = self.grid_cols;
        let id = self.next_local_id("item");
        let tab = self.draft_tab_mut(tab_id)?;
        let existing: Vec<Position> = tab.items.iter().map(|i| i.position).collect();
        let placed = placement::place_new_item(clamped, &existing, grid_cols);
        tab.items.push(DashboardItem::new(id.clone(), widget, placed));
        self.mark_changed();
        Ok(id)
    }

    /// Commit a batch of moved/resized positions. Identical positions are a
    /// complete no-op: no mutation, no dirty flag, no event.
    pub fn apply_layout(
        &mut self,
        tab_id: &str,
        changes: &[(String, Position)],
    ) -> Result<(), DashboardError> {
        self.require_draft("moving widgets")?;
        let tab = self.draft_tab_mut(tab_id)?;
        match placement::normalize_layout(&tab.items, changes) {
            Some(items) => {
                tab.items = items;
                self.mark_changed();
            }
            None => {}
        }
        Ok(())
    }

    /// Remove a placement. The widget's backing component is untouched.
    pub fn delete_item(&mut self, tab_id: &str, item_id: &str) -> Result<(), DashboardError> {
        self.require_draft("deleting a widget")?;
        let tab = self.draft_tab_mut(tab_id)?;
        let before = tab.items.len();
        tab.items.retain(|i| i.id != item_id);
        if tab.items.len() == before {
            return Err(self.reject(DashboardError::NotFound(format!("widget {}", item_id))));
        }
        self.mark_changed();
        Ok(())
    }

    // ---- internals ----

    fn require_draft(&self, action: &str) -> Result<(), DashboardError> {
        if self.current == VersionKind::Draft && self.draft.is_some() {
            Ok(())
        } else {
            Err(self.reject(DashboardError::Permission(format!(
                "{} requires the draft version",
                action
            ))))
        }
    }

    fn draft_tab_mut(&mut self, tab_id: &str) -> Result<&mut Tab, DashboardError> {
        let missing = {
            let draft = self.draft.as_ref().expect("checked by require_draft");
            !draft.tabs.iter().any(|t| t.id == tab_id)
        };
        if missing {
            return Err(self.reject(DashboardError::NotFound(format!("tab {}", tab_id))));
        }
        let draft = self.draft.as_mut().expect("checked by require_draft");
        Ok(draft
            .tabs
            .iter_mut()
            .find(|t| t.id == tab_id)
            .expect("presence checked above"))
    }

    fn validate_title(&self, title: &str) -> Result<(), DashboardError> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(self.reject(DashboardError::Validation(
                "title must not be empty".to_string(),
            )));
        }
        if trimmed.chars().count() > MAX_TITLE_LEN {
            return Err(self.reject(DashboardError::Validation(format!(
                "title longer than {} characters",
                MAX_TITLE_LEN
            ))));
        }
        Ok(())
    }

    fn validate_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<(), DashboardError> {
        if start > end {
            return Err(self.reject(DashboardError::Validation(format!(
                "start date {} is after end date {}",
                start, end
            ))));
        }
        Ok(())
    }

    fn next_local_id(&mut self, kind: &str) -> String {
        let id = format!("local-{}-{}", kind, self.next_local_id);
        self.next_local_id += 1;
        id
    }

    fn mark_changed(&mut self) {
        self.dirty = true;
        self.events.emit(DashboardEvent::StructureChanged);
    }

    fn clear_loaded_tabs(&self) {
        if let Ok(mut tracker) = self.tracker.lock() {
            tracker.clear_loaded_tabs();
        }
    }

    fn reject(&self, err: DashboardError) -> DashboardError {
        self.events.notify(NotifyLevel::Warning, err.to_string());
        err
    }
}
