// Wire DTOs for the dashboard backend and their domain mapping
use crate::application::structure_repository::{DraftSave, ExecutionRequest};
use crate::domain::{Dashboard, DashboardItem, OutputType, Position, Tab, Version, Widget};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputTypePayload {
    Graph,
    Table,
    Kpi,
}

impl From<OutputTypePayload> for OutputType {
    fn from(payload: OutputTypePayload) -> Self {
        match payload {
            OutputTypePayload::Graph => OutputType::Graph,
            OutputTypePayload::Table => OutputType::Table,
            OutputTypePayload::Kpi => OutputType::Kpi,
        }
    }
}

impl From<OutputType> for OutputTypePayload {
    fn from(kind: OutputType) -> Self {
        match kind {
            OutputType::Graph => OutputTypePayload::Graph,
            OutputType::Table => OutputTypePayload::Table,
            OutputType::Kpi => OutputTypePayload::Kpi,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PositionPayload {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub min_w: u32,
    pub min_h: u32,
}

impl From<PositionPayload> for Position {
    fn from(p: PositionPayload) -> Self {
        Position::new(p.x, p.y, p.w, p.h, p.min_w, p.min_h)
    }
}

impl From<Position> for PositionPayload {
    fn from(p: Position) -> Self {
        Self {
            x: p.x,
            y: p.y,
            w: p.w,
            h: p.h,
            min_w: p.min_w,
            min_h: p.min_h,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WidgetPayload {
    pub id: String,
    pub title: String,
    pub position: PositionPayload,
    #[serde(rename = "refId")]
    pub ref_id: String,
    #[serde(rename = "refVersion")]
    pub ref_version: String,
    #[serde(rename = "refType")]
    pub ref_type: String,
    #[serde(rename = "outputType")]
    pub output_type: OutputTypePayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

impl From<WidgetPayload> for DashboardItem {
    fn from(w: WidgetPayload) -> Self {
        DashboardItem::new(
            w.id.clone(),
            Widget {
                id: w.id,
                title: w.title,
                ref_id: w.ref_id,
                ref_version: w.ref_version,
                ref_type: w.ref_type,
                output_type: w.output_type.into(),
                output: w.output,
            },
            w.position.into(),
        )
    }
}

impl From<&DashboardItem> for WidgetPayload {
    fn from(item: &DashboardItem) -> Self {
        Self {
            id: item.id.clone(),
            title: item.widget.title.clone(),
            position: item.position.into(),
            ref_id: item.widget.ref_id.clone(),
            ref_version: item.widget.ref_version.clone(),
            ref_type: item.widget.ref_type.clone(),
            output_type: item.widget.output_type.into(),
            output: item.widget.output.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TabPayload {
    pub id: String,
    pub title: String,
    pub position: i32,
    #[serde(rename = "startDate")]
    pub start_date: NaiveDate,
    #[serde(rename = "endDate")]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub widgets: Vec<WidgetPayload>,
}

impl From<TabPayload> for Tab {
    fn from(t: TabPayload) -> Self {
        Tab {
            id: t.id,
            title: t.title,
            position: t.position,
            start_date: t.start_date,
            end_date: t.end_date,
            items: t.widgets.into_iter().map(DashboardItem::from).collect(),
        }
    }
}

impl From<&Tab> for TabPayload {
    fn from(tab: &Tab) -> Self {
        Self {
            id: tab.id.clone(),
            title: tab.title.clone(),
            position: tab.position,
            start_date: tab.start_date,
            end_date: tab.end_date,
            widgets: tab.items.iter().map(WidgetPayload::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VersionPayload {
    pub id: String,
    #[serde(default)]
    pub tabs: Vec<TabPayload>,
}

impl From<VersionPayload> for Version {
    fn from(v: VersionPayload) -> Self {
        Version::new(v.id, v.tabs.into_iter().map(Tab::from).collect())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StructurePayload {
    pub id: String,
    pub title: String,
    #[serde(rename = "publishedVersion", default, skip_serializing_if = "Option::is_none")]
    pub published_version: Option<VersionPayload>,
    #[serde(rename = "draftVersion", default, skip_serializing_if = "Option::is_none")]
    pub draft_version: Option<VersionPayload>,
}

impl From<StructurePayload> for Dashboard {
    fn from(s: StructurePayload) -> Self {
        Dashboard::new(
            s.id,
            s.title,
            s.published_version.map(Version::from),
            s.draft_version.map(Version::from),
        )
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SaveDraftPayload {
    pub id: String,
    #[serde(rename = "dashboardId")]
    pub dashboard_id: String,
    pub tabs: Vec<TabPayload>,
}

impl From<&DraftSave> for SaveDraftPayload {
    fn from(draft: &DraftSave) -> Self {
        Self {
            id: draft.version_id.clone(),
            dashboard_id: draft.dashboard_id.clone(),
            tabs: draft.tabs.iter().map(TabPayload::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PublishPayload {
    #[serde(rename = "dashboardId")]
    pub dashboard_id: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ExecutionRequestPayload {
    #[serde(rename = "refId")]
    pub ref_id: String,
    #[serde(rename = "refVersion")]
    pub ref_version: String,
    #[serde(rename = "refType")]
    pub ref_type: String,
    #[serde(rename = "startDate")]
    pub start_date: NaiveDate,
    #[serde(rename = "endDate")]
    pub end_date: NaiveDate,
    #[serde(rename = "companyId")]
    pub company_id: String,
}

impl From<&ExecutionRequest> for ExecutionRequestPayload {
    fn from(request: &ExecutionRequest) -> Self {
        Self {
            ref_id: request.ref_id.clone(),
            ref_version: request.ref_version.clone(),
            ref_type: request.ref_type.clone(),
            start_date: request.start_date,
            end_date: request.end_date,
            company_id: request.company_id.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ExecutionResponsePayload {
    pub output: Value,
    #[serde(rename = "outputType")]
    pub output_type: OutputTypePayload,
    #[serde(default)]
    pub error: Option<String>,
}
