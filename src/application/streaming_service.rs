// Streaming dashboard service - Progressive loading of every panel for a date
use crate::application::series_service::SeriesService;
use crate::domain::dashboard::{
    CompletionEvent, DashboardSkeleton, PanelContent, PanelUpdate, StreamMessage,
};
use crate::infrastructure::config::PanelsConfig;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{RwLock, mpsc};

/// Sessions remembered at once; the least recently active one is evicted first
pub const MAX_SESSIONS: usize = 256;

/// Last result applied to a panel
#[derive(Debug, Clone, Serialize)]
pub struct PanelSnapshot {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub update: PanelUpdate,
}

#[derive(Debug, Default)]
struct SessionState {
    /// Generation of the session's latest request
    generation: u64,
    panels: HashMap<String, PanelSnapshot>,
}

/// Live panel state per session.
///
/// Generations come from one increasing sequence shared by all sessions, but
/// only a newer request of the same session supersedes an older one.
#[derive(Debug, Default)]
pub struct DashboardState {
    sessions: HashMap<String, SessionState>,
    sequence: u64,
}

impl DashboardState {
    /// Register a new request and return its session id and generation.
    /// Requests without a session get a fresh anonymous one.
    fn begin(&mut self, session: Option<&str>) -> (String, u64) {
        self.sequence += 1;
        let generation = self.sequence;
        let session = match session {
            Some(id) => id.to_string(),
            None => format!("anonymous-{}", generation),
        };

        if !self.sessions.contains_key(&session) && self.sessions.len() >= MAX_SESSIONS {
            self.evict_idlest();
        }
        self.sessions.entry(session.clone()).or_default().generation = generation;
        (session, generation)
    }

    fn evict_idlest(&mut self) {
        let idlest = self
            .sessions
            .iter()
            .min_by_key(|(_, state)| state.generation)
            .map(|(id, _)| id.clone());
        if let Some(id) = idlest {
            tracing::debug!("Evicting idle dashboard session {}", id);
            self.sessions.remove(&id);
        }
    }

    /// Store a finished panel unless its session has moved on to a newer request
    fn apply_if_current(&mut self, session: &str, snapshot: PanelSnapshot) -> bool {
        match self.sessions.get_mut(session) {
            Some(state) if state.generation == snapshot.update.generation => {
                state
                    .panels
                    .insert(snapshot.update.panel_id.clone(), snapshot);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, session: &str, panel_id: &str) -> Option<&PanelSnapshot> {
        self.sessions.get(session)?.panels.get(panel_id)
    }
}

/// What became of one panel task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Streamed,
    /// A newer request of the same session started first
    Discarded,
    /// The receiving side hung up
    Dropped,
}

#[derive(Clone)]
pub struct StreamingDashboardService {
    series_service: SeriesService,
    panels_config: Arc<PanelsConfig>,
    state: Arc<RwLock<DashboardState>>,
}

impl StreamingDashboardService {
    pub fn new(series_service: SeriesService, panels_config: PanelsConfig) -> Self {
        Self {
            series_service,
            panels_config: Arc::new(panels_config),
            state: Arc::new(RwLock::new(DashboardState::default())),
        }
    }

    pub fn panels_config(&self) -> &PanelsConfig {
        &self.panels_config
    }

    pub async fn panel_snapshot(&self, session: &str, panel_id: &str) -> Option<PanelSnapshot> {
        self.state.read().await.get(session, panel_id).cloned()
    }

    /// Start loading every panel for `date` on behalf of `session`.
    ///
    /// Each call supersedes the same session's previous one: results of its
    /// older generations that finish afterwards are dropped instead of applied
    /// or streamed. Other sessions are unaffected.
    pub async fn stream_dashboard(
        &self,
        session: Option<&str>,
        date: NaiveDate,
        search_previous: bool,
    ) -> mpsc::Receiver<StreamMessage> {
        let (tx, rx) = mpsc::channel(100);
        let start_time = Instant::now();
        let (session, generation) = self.state.write().await.begin(session);

        tracing::info!(
            "Loading dashboard for {} (session {}, generation {}, search_previous={})",
            date,
            session,
            generation,
            search_previous
        );

        // 1. Send the layout immediately
        let skeleton = DashboardSkeleton {
            session: session.clone(),
            generation,
            date,
            panels: self
                .panels_config
                .panels
                .iter()
                .map(|p| p.skeleton())
                .collect(),
        };
        let _ = tx.send(StreamMessage::Skeleton(skeleton)).await;

        // 2. One task per panel; panels never wait on each other
        let mut handles = Vec::with_capacity(self.panels_config.panels.len());
        for panel in &self.panels_config.panels {
            let tx = tx.clone();
            let service = self.clone();
            let panel = panel.clone();
            let session = session.clone();

            handles.push(tokio::spawn(async move {
                let content = match service
                    .series_service
                    .get_panel(&panel, date, search_previous)
                    .await
                {
                    Ok(outcome) => PanelContent::from(outcome),
                    Err(e) => {
                        tracing::error!("Error building panel {}: {}", panel.id, e);
                        let message = if e.is_connectivity() {
                            format!("{} - check if the database is running", e)
                        } else {
                            e.to_string()
                        };
                        PanelContent::Error { message }
                    }
                };

                let update = PanelUpdate {
                    panel_id: panel.id.clone(),
                    generation,
                    content,
                };
                let snapshot = PanelSnapshot {
                    date,
                    update: update.clone(),
                };
                if !service.state.write().await.apply_if_current(&session, snapshot) {
                    tracing::warn!(
                        "Discarding panel {} from superseded generation {} of session {}",
                        panel.id,
                        generation,
                        session
                    );
                    return Delivery::Discarded;
                }
                match tx.send(StreamMessage::Panel(update)).await {
                    Ok(()) => Delivery::Streamed,
                    Err(_) => Delivery::Dropped,
                }
            }));
        }

        // 3. Completion once every panel task is done
        tokio::spawn(async move {
            let deliveries: Vec<Delivery> = futures::future::join_all(handles)
                .await
                .into_iter()
                .filter_map(Result::ok)
                .collect();
            let delivered = deliveries
                .iter()
                .filter(|d| **d == Delivery::Streamed)
                .count();

            let complete = CompletionEvent {
                generation,
                panels_delivered: delivered,
                duration_ms: start_time.elapsed().as_millis() as i64,
                superseded: deliveries.contains(&Delivery::Discarded),
            };
            tracing::info!(
                "Dashboard generation {} of session {} finished: {} panels in {} ms",
                generation,
                session,
                delivered,
                complete.duration_ms
            );
            let _ = tx.send(StreamMessage::Complete(complete)).await;
        });

        rx
    }
}
