// Dashboard session - the one service object wired up at application start
//
// Owns the gateway handle, the keyed scheduler, the load tracker, the widget
// template catalog, and the shared widget-output map. The external rendering
// layer holds this by reference and subscribes to its event bus.
use crate::application::events::{DashboardEvent, EventBus, NotifyLevel};
use crate::application::load_state::LoadTracker;
use crate::application::placement;
use crate::application::scheduler::TaskScheduler;
use crate::application::structure_repository::{ExecutionOutcome, ExecutionRequest};
use crate::application::version_manager::VersionManager;
use crate::domain::{DashboardError, DashboardItem, Position, VersionKind, Widget};
use crate::infrastructure::config::EditorSettings;
use crate::infrastructure::gateway::DataGateway;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Latest known output for one widget. Late responses for a deselected tab
/// still land here; last write wins.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetOutputState {
    Ready(Arc<ExecutionOutcome>),
    Failed(String),
}

type OutputMap = Arc<Mutex<HashMap<String, WidgetOutputState>>>;

pub struct DashboardSession {
    gateway: DataGateway,
    scheduler: TaskScheduler,
    events: EventBus,
    tracker: Arc<Mutex<LoadTracker>>,
    outputs: OutputMap,
    templates: HashMap<String, Widget>,
    manager: Option<Arc<Mutex<VersionManager>>>,
    last_error: Option<DashboardError>,
    company_id: String,
    settings: EditorSettings,
}

impl DashboardSession {
    pub fn new(gateway: DataGateway, company_id: String, settings: EditorSettings) -> Self {
        Self {
            gateway,
            scheduler: TaskScheduler::new(),
            events: EventBus::new(),
            tracker: Arc::new(Mutex::new(LoadTracker::new())),
            outputs: Arc::new(Mutex::new(HashMap::new())),
            templates: HashMap::new(),
            manager: None,
            last_error: None,
            company_id,
            settings,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The recoverable error from the last failed structure fetch, if any.
    /// While set, the editor blocks rendering and shows a retry affordance.
    pub fn last_error(&self) -> Option<&DashboardError> {
        self.last_error.as_ref()
    }

    /// Lock the version manager for reads and edits. `None` until a
    /// structure has been loaded. The manager is shared with the autosave
    /// task, which takes its save snapshot when its timer fires.
    pub fn manager(&self) -> Option<MutexGuard<'_, VersionManager>> {
        self.manager.as_ref().map(|m| m.lock().unwrap())
    }

    /// Widget templates available for dropping onto the grid. The catalog
    /// itself comes from an external flow.
    pub fn register_templates(&mut self, templates: Vec<Widget>) {
        for template in templates {
            self.templates.insert(template.id.clone(), template);
        }
    }

    pub fn widget_output(&self, widget_id: &str) -> Option<WidgetOutputState> {
        self.outputs
            .lock()
            .ok()
            .and_then(|outputs| outputs.get(widget_id).cloned())
    }

    /// Fetch the dashboard structure and build the version manager. A
    /// failure leaves everything else (outputs, templates, a previous
    /// manager) intact so a manual retry picks up where it left off; on a
    /// successful retry the previously selected version kind is restored.
    pub async fn initialize(&mut self, dashboard_id: &str) -> Result<(), DashboardError> {
        if let Ok(mut tracker) = self.tracker.lock() {
            tracker.begin_initializing();
        }

        let fetched = self.gateway.fetch_structure(dashboard_id).await;
        if let Ok(mut tracker) = self.tracker.lock() {
            tracker.finish_initializing();
        }

        let structure = match fetched {
            Ok(structure) => structure,
            Err(err) => {
                self.last_error = Some(err.clone());
                self.events.notify(NotifyLevel::Error, err.to_string());
                return Err(err);
            }
        };

        let prior = self.manager.as_ref().map(|m| m.lock().unwrap().current());
        let mut manager = VersionManager::from_structure(
            (*structure).clone(),
            self.gateway.clone(),
            self.events.clone(),
            Arc::clone(&self.tracker),
        );
        match prior {
            Some(VersionKind::Draft)
                if manager.current() != VersionKind::Draft && manager.has_draft() =>
            {
                let _ = manager.switch_to_draft();
            }
            Some(VersionKind::Published)
                if manager.current() != VersionKind::Published && manager.has_published() =>
            {
                let _ = manager.switch_to_published();
            }
            _ => {}
        }

        self.manager = Some(Arc::new(Mutex::new(manager)));
        self.last_error = None;
        Ok(())
    }

    /// Place a widget template on a tab. An unknown template is rejected
    /// with a notification and no partial state. A zero-sized drop rectangle
    /// falls back to the type's default size.
    pub fn drop_widget(
        &self,
        tab_id: &str,
        template_id: &str,
        candidate: Position,
    ) -> Result<String, DashboardError> {
        let Some(template) = self.templates.get(template_id).cloned() else {
            let err = DashboardError::NotFound(format!("widget template {}", template_id));
            self.events.notify(NotifyLevel::Warning, err.to_string());
            return Err(err);
        };
        let Some(mut manager) = self.manager() else {
            return Err(DashboardError::NotFound(
                "dashboard structure not loaded".to_string(),
            ));
        };

        let mut candidate = candidate;
        if candidate.w == 0 || candidate.h == 0 {
            let (w, h) = placement::default_size_for(template.output_type);
            candidate.w = w;
            candidate.h = h;
        }

        let item_id = manager.add_item(tab_id, template, candidate)?;
        drop(manager);
        self.schedule_autosave();
        Ok(item_id)
    }

    /// Select a tab: schedule a debounced load of its widget outputs unless
    /// the tab is already loaded. Rapid switching replaces the pending load.
    pub fn select_tab(&self, tab_id: &str) -> Result<(), DashboardError> {
        let Some(manager) = self.manager() else {
            return Err(DashboardError::NotFound(
                "dashboard structure not loaded".to_string(),
            ));
        };
        let Some(tab) = manager.find_tab(tab_id) else {
            let err = DashboardError::NotFound(format!("tab {}", tab_id));
            self.events.notify(NotifyLevel::Warning, err.to_string());
            return Err(err);
        };

        if self
            .tracker
            .lock()
            .map(|t| t.is_tab_loaded(tab_id))
            .unwrap_or(false)
        {
            return Ok(());
        }

        let job = TabLoadJob {
            gateway: self.gateway.clone(),
            outputs: Arc::clone(&self.outputs),
            tracker: Arc::clone(&self.tracker),
            events: self.events.clone(),
            dashboard_id: manager.dashboard_id().to_string(),
            tab_id: tab_id.to_string(),
            items: tab.items.clone(),
            start_date: tab.start_date,
            end_date: tab.end_date,
            company_id: self.company_id.clone(),
        };
        self.scheduler
            .schedule("tab-load", self.settings.tab_switch_debounce(), job.run());
        Ok(())
    }

    /// Drop the tab's loaded marker and fetch its outputs again. Used for
    /// the manual retry affordance after a failed load.
    pub fn retry_tab(&self, tab_id: &str) -> Result<(), DashboardError> {
        if let Ok(mut tracker) = self.tracker.lock() {
            tracker.unmark_tab_loaded(tab_id);
        }
        self.select_tab(tab_id)
    }

    /// Debounced whole-draft save. Re-scheduling while a save is pending
    /// pushes it back. The snapshot is taken when the timer fires, so edits
    /// made during the debounce window are included, and the server's
    /// response is fed back into the manager so it adopts assigned ids and
    /// clears its dirty flag.
    pub fn schedule_autosave(&self) {
        let Some(manager) = self.manager.as_ref() else {
            return;
        };

        let manager = Arc::clone(manager);
        let gateway = self.gateway.clone();
        let events = self.events.clone();
        self.scheduler.schedule(
            "autosave",
            self.settings.autosave_delay(),
            async move {
                let Some(draft) = manager.lock().unwrap().draft_save() else {
                    return;
                };
                match gateway.save_draft(&draft).await {
                    Ok(version) => manager.lock().unwrap().adopt_saved_draft(version),
                    Err(err) => events.notify(NotifyLevel::Error, err.to_string()),
                }
            },
        );
    }

    /// Cancel pending scheduled work. Called at session teardown.
    pub fn shutdown(&self) {
        self.scheduler.cancel_all();
    }
}

/// Everything a debounced tab load needs, detached from the session borrow.
struct TabLoadJob {
    gateway: DataGateway,
    outputs: OutputMap,
    tracker: Arc<Mutex<LoadTracker>>,
    events: EventBus,
    dashboard_id: String,
    tab_id: String,
    items: Vec<DashboardItem>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    company_id: String,
}

impl TabLoadJob {
    async fn run(self) {
        let pending_key = format!("tabWidgets:{}:{}", self.dashboard_id, self.tab_id);
        let fresh = self
            .tracker
            .lock()
            .map(|mut t| t.begin_pending(&pending_key))
            .unwrap_or(true);
        if !fresh {
            return;
        }

        let calls = self.items.iter().map(|item| {
            let request = ExecutionRequest {
                ref_id: item.widget.ref_id.clone(),
                ref_version: item.widget.ref_version.clone(),
                ref_type: item.widget.ref_type.clone(),
                start_date: self.start_date,
                end_date: self.end_date,
                company_id: self.company_id.clone(),
            };
            let gateway = self.gateway.clone();
            let dashboard_id = self.dashboard_id.clone();
            let widget_id = item.widget.id.clone();
            async move {
                (
                    widget_id,
                    gateway.execute_component(&dashboard_id, &request).await,
                )
            }
        });

        // No cancellation on tab switch: results for a deselected tab still
        // arrive here and overwrite, last write wins.
        for (widget_id, result) in futures::future::join_all(calls).await {
            let state = match result {
                Ok(outcome) => WidgetOutputState::Ready(outcome),
                Err(err) => {
                    tracing::warn!(widget_id = %widget_id, %err, "widget output failed");
                    WidgetOutputState::Failed(err.to_string())
                }
            };
            if let Ok(mut outputs) = self.outputs.lock() {
                outputs.insert(widget_id, state);
            }
        }

        if let Ok(mut tracker) = self.tracker.lock() {
            tracker.mark_tab_loaded(&self.tab_id);
            tracker.finish_pending(&pending_key);
        }
        self.events.emit(DashboardEvent::TabLoaded {
            tab_id: self.tab_id,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::structure_repository::{DraftSave, StructureRepository};
    use crate::domain::{Dashboard, OutputType, Tab, Version};
    use crate::infrastructure::config::GatewaySettings;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeRepository {
        fail_next_fetch: AtomicBool,
        execution_calls: AtomicUsize,
        saved: Mutex<Option<DraftSave>>,
    }

    impl FakeRepository {
        fn new() -> Self {
            Self {
                fail_next_fetch: AtomicBool::new(false),
                execution_calls: AtomicUsize::new(0),
                saved: Mutex::new(None),
            }
        }

        fn structure() -> Dashboard {
            let widget = Widget {
                id: "w1".to_string(),
                title: "Revenue".to_string(),
                ref_id: "comp-7".to_string(),
                ref_version: "latest".to_string(),
                ref_type: "metric".to_string(),
                output_type: OutputType::Graph,
                output: None,
            };
            let tab = Tab {
                id: "t1".to_string(),
                title: "Overview".to_string(),
                position: 0,
                start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
                items: vec![DashboardItem::new(
                    "w1".to_string(),
                    widget,
                    Position::new(0, 0, 16, 8, 8, 6),
                )],
            };
            Dashboard::new(
                "d1".to_string(),
                "Finance".to_string(),
                None,
                Some(Version::new("v-d".to_string(), vec![tab])),
            )
        }
    }

    #[async_trait]
    impl StructureRepository for FakeRepository {
        async fn fetch_structure(&self, _dashboard_id: &str) -> anyhow::Result<Dashboard> {
            if self.fail_next_fetch.swap(false, Ordering::SeqCst) {
                anyhow::bail!("backend unavailable");
            }
            Ok(Self::structure())
        }

        async fn save_draft(&self, draft: &DraftSave) -> anyhow::Result<Version> {
            *self.saved.lock().unwrap() = Some(draft.clone());
            // The backend assigns ids to locally created tabs and items.
            let mut tabs = draft.tabs.clone();
            for (t, tab) in tabs.iter_mut().enumerate() {
                if tab.id.starts_with("local-") {
                    tab.id = format!("srv-t{}", t);
                }
                for (i, item) in tab.items.iter_mut().enumerate() {
                    if item.id.starts_with("local-") {
                        item.id = format!("srv-t{}-i{}", t, i);
                    }
                }
            }
            Ok(Version::new(draft.version_id.clone(), tabs))
        }

        async fn publish_draft(&self, _dashboard_id: &str) -> anyhow::Result<Version> {
            Ok(Version::new("v-pub".to_string(), Vec::new()))
        }

        async fn execute_component(
            &self,
            _request: &ExecutionRequest,
        ) -> anyhow::Result<ExecutionOutcome> {
            self.execution_calls.fetch_add(1, Ordering::SeqCst);
            Ok(ExecutionOutcome {
                output: json!({"series": []}),
                output_type: OutputType::Graph,
            })
        }
    }

    fn session(repo: Arc<FakeRepository>) -> DashboardSession {
        let gateway = DataGateway::new(
            repo,
            &GatewaySettings {
                cache_ttl_secs: 300,
                min_call_spacing_ms: 0,
                call_log_capacity: 32,
                latest_version_fallback: "1.0".to_string(),
            },
        );
        DashboardSession::new(
            gateway,
            "acme".to_string(),
            EditorSettings {
                autosave_delay_ms: 2000,
                tab_switch_debounce_ms: 250,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn tab_selection_loads_outputs_after_the_debounce() {
        let repo = Arc::new(FakeRepository::new());
        let mut s = session(Arc::clone(&repo));
        s.initialize("d1").await.unwrap();

        s.select_tab("t1").unwrap();
        assert!(s.widget_output("w1").is_none());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(matches!(
            s.widget_output("w1"),
            Some(WidgetOutputState::Ready(_))
        ));
        assert_eq!(repo.execution_calls.load(Ordering::SeqCst), 1);

        // Already loaded: selecting again schedules nothing.
        s.select_tab("t1").unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(repo.execution_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_initialize_blocks_until_a_retry_succeeds() {
        let repo = Arc::new(FakeRepository::new());
        repo.fail_next_fetch.store(true, Ordering::SeqCst);
        let mut s = session(Arc::clone(&repo));

        let err = s.initialize("d1").await.unwrap_err();
        assert!(err.is_recoverable());
        assert!(s.last_error().is_some());
        assert!(s.manager().is_none());

        s.initialize("d1").await.unwrap();
        assert!(s.last_error().is_none());
        assert!(s.manager().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_template_drop_is_rejected_without_state_change() {
        let repo = Arc::new(FakeRepository::new());
        let mut s = session(repo);
        s.initialize("d1").await.unwrap();

        let err = s
            .drop_widget("t1", "nope", Position::new(0, 0, 0, 0, 0, 0))
            .unwrap_err();
        assert!(matches!(err, DashboardError::NotFound(_)));
        assert_eq!(s.manager().unwrap().tabs()[0].items.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_sized_drop_takes_the_type_default_size() {
        let repo = Arc::new(FakeRepository::new());
        let mut s = session(repo);
        s.initialize("d1").await.unwrap();
        s.register_templates(vec![Widget {
            id: "tmpl-kpi".to_string(),
            title: "Cash".to_string(),
            ref_id: "comp-9".to_string(),
            ref_version: "1.0".to_string(),
            ref_type: "metric".to_string(),
            output_type: OutputType::Kpi,
            output: None,
        }]);

        let item_id = s
            .drop_widget("t1", "tmpl-kpi", Position::new(0, 9, 0, 0, 0, 0))
            .unwrap();
        let manager = s.manager().unwrap();
        let item = manager.tabs()[0]
            .items
            .iter()
            .find(|i| i.id == item_id)
            .unwrap();
        assert_eq!((item.position.w, item.position.h), (8, 4));
    }

    #[tokio::test(start_paused = true)]
    async fn autosave_persists_the_draft_after_the_delay() {
        let repo = Arc::new(FakeRepository::new());
        let mut s = session(Arc::clone(&repo));
        s.initialize("d1").await.unwrap();
        let mut rx = s.events().subscribe();

        s.schedule_autosave();
        assert!(repo.saved.lock().unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(repo.saved.lock().unwrap().is_some());
        loop {
            match rx.try_recv() {
                Ok(DashboardEvent::DraftSaved) => break,
                Ok(_) => continue,
                Err(other) => panic!("expected DraftSaved event, got {:?}", other),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn autosave_snapshots_at_fire_time_and_adopts_server_ids() {
        let repo = Arc::new(FakeRepository::new());
        let mut s = session(Arc::clone(&repo));
        s.initialize("d1").await.unwrap();

        let q2_start = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let q2_end = NaiveDate::from_ymd_opt(2026, 6, 30).unwrap();
        s.manager().unwrap().add_tab("Q2", q2_start, q2_end).unwrap();
        s.schedule_autosave();

        // An edit inside the debounce window is part of the eventual save.
        s.manager().unwrap().add_tab("Q3", q2_start, q2_end).unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;

        let saved = repo.saved.lock().unwrap().clone().unwrap();
        assert_eq!(saved.tabs.len(), 3);

        // The manager adopted the server record: no local ids remain and the
        // dirty flag is clear.
        let manager = s.manager().unwrap();
        assert!(!manager.is_dirty());
        assert!(manager.tabs().iter().all(|t| !t.id.starts_with("local-")));
    }
}
