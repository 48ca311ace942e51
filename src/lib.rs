// Dashboard editor core: collision-free grid placement, the draft/published
// version state machine, and a caching/deduplicating/rate-limiting data
// gateway. Rendering, auth, and widget execution stay external; consumers
// subscribe to the session's event bus and redraw on receipt.
pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::events::{DashboardEvent, EventBus, NotifyLevel};
pub use application::session::{DashboardSession, WidgetOutputState};
pub use application::version_manager::VersionManager;
pub use domain::{Dashboard, DashboardError, VersionKind};
pub use infrastructure::config::{Settings, load_settings};
pub use infrastructure::gateway::DataGateway;
pub use infrastructure::http_repository::HttpRepository;

/// Install the default tracing subscriber, honoring `RUST_LOG`. For binaries
/// embedding the core; host applications with their own subscriber skip this.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
