// Dashboard, version, and tab domain models
use super::widget::DashboardItem;
use chrono::NaiveDate;

/// Which snapshot the editor currently points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionKind {
    Draft,
    Published,
}

/// One snapshot of a dashboard: an ordered sequence of tabs.
#[derive(Debug, Clone, PartialEq)]
pub struct Version {
    pub id: String,
    pub tabs: Vec<Tab>,
}

impl Version {
    pub fn new(id: String, tabs: Vec<Tab>) -> Self {
        Self { id, tabs }
    }
}

/// A named, date-range-scoped collection of placed widgets.
#[derive(Debug, Clone, PartialEq)]
pub struct Tab {
    pub id: String,
    pub title: String,
    pub position: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub items: Vec<DashboardItem>,
}

/// A dashboard with its two coexisting snapshots. `published`, when present,
/// is immutable until replaced by a publish; `draft` is the editable copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub id: String,
    pub title: String,
    pub published: Option<Version>,
    pub draft: Option<Version>,
}

impl Dashboard {
    pub fn new(
        id: String,
        title: String,
        published: Option<Version>,
        draft: Option<Version>,
    ) -> Self {
        Self {
            id,
            title,
            published,
            draft,
        }
    }
}
