// Domain layer - Dashboard structure and error taxonomy
pub mod dashboard;
pub mod error;
pub mod widget;

pub use dashboard::{Dashboard, Tab, Version, VersionKind};
pub use error::DashboardError;
pub use widget::{DashboardItem, OutputType, Position, Widget};
