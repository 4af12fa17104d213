// Dashboard domain model - layout skeleton and progressive panel messages
use super::series::{EmptyReason, NO_DATA_MESSAGE, SeriesBundle, SeriesOutcome};
use super::window::TimeWindow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    /// Per-channel readings with min/max/avg envelope
    Channels,
    /// Per-module categorical status, no envelope
    Status,
    /// Several scalar rate series on one axis
    Rates,
}

/// Grid position of a panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct LayoutSlot {
    pub row: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PanelSkeleton {
    pub id: String,
    pub title: String,
    pub kind: PanelKind,
    pub slot: LayoutSlot,
    pub group: String,
    pub y_label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSkeleton {
    /// Pass back as `session` to supersede this request or read its snapshots
    pub session: String,
    pub generation: u64,
    pub date: NaiveDate,
    pub panels: Vec<PanelSkeleton>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PanelContent {
    Ready {
        window: TimeWindow,
        days_back: u32,
        group: String,
        bundle: SeriesBundle,
    },
    Empty {
        #[serde(flatten)]
        reason: EmptyReason,
        message: String,
    },
    Error {
        message: String,
    },
}

impl From<SeriesOutcome> for PanelContent {
    fn from(outcome: SeriesOutcome) -> Self {
        match outcome {
            SeriesOutcome::Bundle {
                window,
                days_back,
                group,
                bundle,
            } => PanelContent::Ready {
                window,
                days_back,
                group,
                bundle,
            },
            SeriesOutcome::Empty(reason) => PanelContent::Empty {
                reason,
                message: NO_DATA_MESSAGE.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PanelUpdate {
    pub panel_id: String,
    pub generation: u64,
    #[serde(flatten)]
    pub content: PanelContent,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionEvent {
    pub generation: u64,
    pub panels_delivered: usize,
    pub duration_ms: i64,
    pub superseded: bool,
}

/// One line of the progressive dashboard stream
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    Skeleton(DashboardSkeleton),
    Panel(PanelUpdate),
    Complete(CompletionEvent),
}
