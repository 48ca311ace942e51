// Data gateway - TTL caching, in-flight deduplication, and rate limiting
// between the editor and the backend.
//
// Ordering guarantee: at most one underlying call is outstanding per resource
// key; every concurrent caller for that key awaits the same shared future and
// observes the same settled outcome.
use crate::application::structure_repository::{
    DraftSave, ExecutionOutcome, ExecutionRequest, StructureRepository,
};
use crate::domain::{Dashboard, DashboardError, Version};
use crate::infrastructure::config::GatewaySettings;
use crate::infrastructure::diagnostics::CallLog;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Sentinel component version the execution service resolves unreliably.
const LATEST_SENTINEL: &str = "latest";

type FetchResult<T> = Result<T, DashboardError>;
type SharedFetch<T> = Shared<BoxFuture<'static, FetchResult<T>>>;

struct CacheEntry<T> {
    value: T,
    expires_at: Instant,
}

/// TTL cache plus in-flight table for one resource type. Locks are never
/// held across an await.
struct FetchPool<T: Clone> {
    cache: Mutex<HashMap<String, CacheEntry<T>>>,
    inflight: Mutex<HashMap<String, SharedFetch<T>>>,
}

impl<T: Clone + Send + Sync + 'static> FetchPool<T> {
    fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Cache hit only while the entry is fresh; expired entries are evicted
    /// lazily here.
    fn cached(&self, key: &str) -> Option<T> {
        let mut cache = self.cache.lock().unwrap();
        match cache.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    fn insert(&self, key: &str, value: T, ttl: Duration) {
        self.cache.lock().unwrap().insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Drop every entry whose key carries this dashboard id.
    fn invalidate_dashboard(&self, dashboard_id: &str) {
        self.cache
            .lock()
            .unwrap()
            .retain(|key, _| key.split(':').nth(1) != Some(dashboard_id));
    }

    /// Return a fresh cached value, join an outstanding call for the same
    /// key, or become the single caller issuing `underlying`.
    async fn get_or_join(
        self: &Arc<Self>,
        key: &str,
        ttl: Duration,
        underlying: BoxFuture<'static, FetchResult<T>>,
    ) -> FetchResult<T> {
        if let Some(hit) = self.cached(key) {
            return Ok(hit);
        }

        let shared = {
            let mut inflight = self.inflight.lock().unwrap();
            match inflight.get(key) {
                Some(existing) => existing.clone(),
                None => {
                    let pool = Arc::clone(self);
                    let owned_key = key.to_string();
                    let fut = async move {
                        let result = underlying.await;
                        if let Ok(value) = &result {
                            pool.insert(&owned_key, value.clone(), ttl);
                        }
                        pool.inflight.lock().unwrap().remove(&owned_key);
                        result
                    }
                    .boxed()
                    .shared();
                    inflight.insert(key.to_string(), fut.clone());
                    fut
                }
            }
        };

        shared.await
    }
}

struct Inner {
    repository: Arc<dyn StructureRepository>,
    ttl: Duration,
    min_spacing: Duration,
    latest_version_fallback: String,
    structures: Arc<FetchPool<Arc<Dashboard>>>,
    executions: Arc<FetchPool<Arc<ExecutionOutcome>>>,
    last_call: Mutex<HashMap<String, Instant>>,
    call_log: Arc<CallLog>,
}

impl Inner {
    /// Delay until the spacing interval since the prior call for this key
    /// has elapsed, then stamp the key.
    async fn pace(&self, key: &str) {
        let wait = {
            let last = self.last_call.lock().unwrap();
            last.get(key)
                .and_then(|at| self.min_spacing.checked_sub(at.elapsed()))
        };
        if let Some(wait) = wait
            && !wait.is_zero()
        {
            tracing::debug!(key, wait_ms = wait.as_millis() as u64, "rate limit delay");
            tokio::time::sleep(wait).await;
        }
        self.last_call
            .lock()
            .unwrap()
            .insert(key.to_string(), Instant::now());
    }

    fn fetch_error(err: anyhow::Error) -> DashboardError {
        DashboardError::TransientFetch(format!("{err:#}"))
    }
}

fn structure_key(dashboard_id: &str) -> String {
    format!("structure:{}", dashboard_id)
}

fn execution_key(dashboard_id: &str, request: &ExecutionRequest) -> String {
    format!(
        "execution:{}:{}:{}:{}:{}",
        dashboard_id, request.ref_id, request.ref_version, request.start_date, request.end_date
    )
}

/// The single data-access service handed to consumers by reference at
/// session start. Clones share one state.
#[derive(Clone)]
pub struct DataGateway {
    inner: Arc<Inner>,
}

impl DataGateway {
    pub fn new(repository: Arc<dyn StructureRepository>, settings: &GatewaySettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                repository,
                ttl: settings.cache_ttl(),
                min_spacing: settings.min_call_spacing(),
                latest_version_fallback: settings.latest_version_fallback.clone(),
                structures: Arc::new(FetchPool::new()),
                executions: Arc::new(FetchPool::new()),
                last_call: Mutex::new(HashMap::new()),
                call_log: Arc::new(CallLog::new(settings.call_log_capacity)),
            }),
        }
    }

    /// Fetch a dashboard's structure, served from cache while fresh and
    /// deduplicated while in flight.
    pub async fn fetch_structure(&self, dashboard_id: &str) -> FetchResult<Arc<Dashboard>> {
        let key = structure_key(dashboard_id);
        let inner = Arc::clone(&self.inner);
        let owned_key = key.clone();
        let id = dashboard_id.to_string();
        let underlying = async move {
            inner.pace(&owned_key).await;
            let started = Instant::now();
            let result = inner.repository.fetch_structure(&id).await;
            inner
                .call_log
                .record(&owned_key, started.elapsed(), result.is_ok());
            result.map(Arc::new).map_err(Inner::fetch_error)
        }
        .boxed();

        self.inner
            .structures
            .get_or_join(&key, self.inner.ttl, underlying)
            .await
    }

    /// Execute one component, with the "latest" sentinel replaced by the
    /// configured literal version before the call goes out.
    pub async fn execute_component(
        &self,
        dashboard_id: &str,
        request: &ExecutionRequest,
    ) -> FetchResult<Arc<ExecutionOutcome>> {
        let mut request = request.clone();
        if request.ref_version == LATEST_SENTINEL {
            request.ref_version = self.inner.latest_version_fallback.clone();
        }

        let key = execution_key(dashboard_id, &request);
        let inner = Arc::clone(&self.inner);
        let owned_key = key.clone();
        let underlying = async move {
            inner.pace(&owned_key).await;
            let started = Instant::now();
            let result = inner.repository.execute_component(&request).await;
            inner
                .call_log
                .record(&owned_key, started.elapsed(), result.is_ok());
            result.map(Arc::new).map_err(Inner::fetch_error)
        }
        .boxed();

        self.inner
            .executions
            .get_or_join(&key, self.inner.ttl, underlying)
            .await
    }

    /// Persist the draft's whole tab set; invalidates every cache entry for
    /// the dashboard on success.
    pub async fn save_draft(&self, draft: &DraftSave) -> FetchResult<Version> {
        let key = format!("saveDraft:{}", draft.dashboard_id);
        self.inner.pace(&key).await;
        let started = Instant::now();
        let result = self.inner.repository.save_draft(draft).await;
        self.inner
            .call_log
            .record(&key, started.elapsed(), result.is_ok());

        let version = result.map_err(Inner::fetch_error)?;
        self.invalidate_dashboard(&draft.dashboard_id);
        Ok(version)
    }

    /// Replace the published slot with the persisted draft; invalidates the
    /// dashboard's cache entries on success.
    pub async fn publish_draft(&self, dashboard_id: &str) -> FetchResult<Version> {
        let key = format!("publishDraft:{}", dashboard_id);
        self.inner.pace(&key).await;
        let started = Instant::now();
        let result = self.inner.repository.publish_draft(dashboard_id).await;
        self.inner
            .call_log
            .record(&key, started.elapsed(), result.is_ok());

        let version = result.map_err(Inner::fetch_error)?;
        self.invalidate_dashboard(dashboard_id);
        Ok(version)
    }

    /// Force the next reads for this dashboard to hit the backend.
    pub fn invalidate_dashboard(&self, dashboard_id: &str) {
        self.inner.structures.invalidate_dashboard(dashboard_id);
        self.inner.executions.invalidate_dashboard(dashboard_id);
    }

    pub fn call_log(&self) -> &CallLog {
        &self.inner.call_log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OutputType;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeRepository {
        structure_calls: AtomicUsize,
        execution_calls: AtomicUsize,
        delay: Duration,
        last_executed_version: Mutex<Option<String>>,
    }

    impl FakeRepository {
        fn new(delay: Duration) -> Self {
            Self {
                structure_calls: AtomicUsize::new(0),
                execution_calls: AtomicUsize::new(0),
                delay,
                last_executed_version: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl StructureRepository for FakeRepository {
        async fn fetch_structure(&self, dashboard_id: &str) -> anyhow::Result<Dashboard> {
            self.structure_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(Dashboard::new(
                dashboard_id.to_string(),
                "Finance".to_string(),
                None,
                Some(Version::new("v-draft".to_string(), Vec::new())),
            ))
        }

        async fn save_draft(&self, draft: &DraftSave) -> anyhow::Result<Version> {
            Ok(Version::new(draft.version_id.clone(), draft.tabs.clone()))
        }

        async fn publish_draft(&self, _dashboard_id: &str) -> anyhow::Result<Version> {
            Ok(Version::new("v-pub".to_string(), Vec::new()))
        }

        async fn execute_component(
            &self,
            request: &ExecutionRequest,
        ) -> anyhow::Result<ExecutionOutcome> {
            self.execution_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_executed_version.lock().unwrap() = Some(request.ref_version.clone());
            Ok(ExecutionOutcome {
                output: json!({"value": 42}),
                output_type: OutputType::Kpi,
            })
        }
    }

    fn settings() -> GatewaySettings {
        GatewaySettings {
            cache_ttl_secs: 300,
            min_call_spacing_ms: 500,
            call_log_capacity: 32,
            latest_version_fallback: "1.0".to_string(),
        }
    }

    fn request(version: &str) -> ExecutionRequest {
        ExecutionRequest {
            ref_id: "comp-7".to_string(),
            ref_version: version.to_string(),
            ref_type: "metric".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            company_id: "acme".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_fetches_share_one_underlying_call() {
        let repo = Arc::new(FakeRepository::new(Duration::from_millis(50)));
        let gateway = DataGateway::new(repo.clone(), &settings());

        let (a, b) = tokio::join!(
            gateway.fetch_structure("d1"),
            gateway.fetch_structure("d1")
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(repo.structure_calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_trigger_a_fresh_call() {
        let repo = Arc::new(FakeRepository::new(Duration::ZERO));
        let gateway = DataGateway::new(repo.clone(), &settings());

        gateway.fetch_structure("d1").await.unwrap();
        gateway.fetch_structure("d1").await.unwrap();
        assert_eq!(repo.structure_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(301)).await;
        gateway.fetch_structure("d1").await.unwrap();
        assert_eq!(repo.structure_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn close_calls_for_one_key_are_spaced_apart() {
        let repo = Arc::new(FakeRepository::new(Duration::ZERO));
        let gateway = DataGateway::new(repo.clone(), &settings());

        gateway.fetch_structure("d1").await.unwrap();
        gateway.invalidate_dashboard("d1");

        let before = Instant::now();
        gateway.fetch_structure("d1").await.unwrap();
        assert_eq!(repo.structure_calls.load(Ordering::SeqCst), 2);
        assert!(before.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn saving_a_draft_invalidates_the_dashboard_cache() {
        let repo = Arc::new(FakeRepository::new(Duration::ZERO));
        let gateway = DataGateway::new(repo.clone(), &settings());

        gateway.fetch_structure("d1").await.unwrap();
        gateway
            .save_draft(&DraftSave {
                version_id: "v-draft".to_string(),
                dashboard_id: "d1".to_string(),
                tabs: Vec::new(),
            })
            .await
            .unwrap();

        gateway.fetch_structure("d1").await.unwrap();
        assert_eq!(repo.structure_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn latest_sentinel_is_replaced_before_the_call() {
        let repo = Arc::new(FakeRepository::new(Duration::ZERO));
        let gateway = DataGateway::new(repo.clone(), &settings());

        gateway
            .execute_component("d1", &request("latest"))
            .await
            .unwrap();
        assert_eq!(
            repo.last_executed_version.lock().unwrap().as_deref(),
            Some("1.0")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn execution_results_are_cached_per_key() {
        let repo = Arc::new(FakeRepository::new(Duration::ZERO));
        let gateway = DataGateway::new(repo.clone(), &settings());

        gateway.execute_component("d1", &request("2.0")).await.unwrap();
        gateway.execute_component("d1", &request("2.0")).await.unwrap();
        assert_eq!(repo.execution_calls.load(Ordering::SeqCst), 1);

        gateway.execute_component("d1", &request("3.0")).await.unwrap();
        assert_eq!(repo.execution_calls.load(Ordering::SeqCst), 2);
    }
}
