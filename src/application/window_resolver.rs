// Window resolver - Turns a requested date into a concrete query window
use crate::application::error::PipelineError;
use crate::application::telemetry_store::TelemetryStore;
use crate::domain::window::{TimeWindow, WindowResolution};
use chrono::{Days, NaiveDate};
use std::sync::Arc;

/// Number of days probed, the requested one included
pub const LOOKBACK_DAYS: u32 = 120;

#[derive(Clone)]
pub struct TimeWindowResolver {
    store: Arc<dyn TelemetryStore>,
    max_attempts: u32,
}

impl TimeWindowResolver {
    pub fn new(store: Arc<dyn TelemetryStore>) -> Self {
        Self {
            store,
            max_attempts: LOOKBACK_DAYS,
        }
    }

    /// Resolve `requested` for `metric`.
    ///
    /// Without `search_previous` the noon window of `requested` is returned as-is.
    /// Otherwise each day is probed walking backwards until one has data or
    /// `LOOKBACK_DAYS` windows came back empty.
    pub async fn resolve(
        &self,
        requested: NaiveDate,
        search_previous: bool,
        metric: &str,
        value_field: &str,
    ) -> Result<WindowResolution, PipelineError> {
        if !search_previous {
            return Ok(WindowResolution::Unprobed(TimeWindow::for_date(requested)));
        }

        let mut attempts = 0;
        while attempts < self.max_attempts {
            let Some(date) = requested.checked_sub_days(Days::new(u64::from(attempts))) else {
                break;
            };
            let window = TimeWindow::for_date(date);
            attempts += 1;

            tracing::debug!("Probing {} for data on {}", metric, date);
            if self.store.has_data(metric, &window, value_field).await? {
                let days_back = attempts - 1;
                if days_back > 0 {
                    tracing::info!(
                        "No {} data on {}, using {} ({} days back)",
                        metric,
                        requested,
                        date,
                        days_back
                    );
                }
                return Ok(WindowResolution::Found { window, days_back });
            }
        }

        tracing::warn!(
            "No {} data within {} days before {}",
            metric,
            attempts,
            requested
        );
        Ok(WindowResolution::LookbackExhausted {
            requested,
            attempts,
        })
    }
}
