use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::api::{FetchStatus, OutageSource};
use crate::outage::OutageNotice;
use crate::planning::{ReminderPlan, plan_reminders};
use crate::scheduling::{NotificationScheduler, ScheduledReminder};
use crate::storage::{SessionStore, StorageError};

const NO_RESULTS_MESSAGE: &str = "No se encontraron resultados.";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Por favor, ingrese un número válido.")]
    MissingIdentification,

    #[error("Ya hay una consulta en curso.")]
    AlreadyRunning,

    #[error("No se pudo conectar con la API.")]
    Unreachable(#[source] anyhow::Error),

    #[error("No se pudieron reemplazar los recordatorios programados.")]
    Scheduling(#[source] anyhow::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug)]
pub struct QueryReport {
    pub identification: String,
    pub notices: Vec<OutageNotice>,
    pub plan: ReminderPlan,
    pub scheduled: Vec<ScheduledReminder>,
    pub notifications_enabled: bool,
}

#[derive(Debug)]
pub enum QueryOutcome {
    Found(QueryReport),
    /// The API answered but refused the identification.
    Rejected { message: String },
}

#[derive(Debug, Default)]
pub struct RestoredSession {
    pub identification: Option<String>,
    pub notices: Vec<OutageNotice>,
    pub notifications_enabled: bool,
}

#[derive(Debug)]
pub struct Startup {
    pub restored: RestoredSession,
    pub refreshed: Option<QueryOutcome>,
}

#[derive(Debug, Clone)]
pub struct QuerySettings {
    pub lead_time: TimeDelta,
    pub auto_query_on_start: bool,
}

/// Runs the lookup flow for one identification at a time: fetch, cache,
/// then replace every scheduled reminder with the freshly planned ones.
pub struct OutageQueryService {
    source: Arc<dyn OutageSource>,
    session: SessionStore,
    scheduler: Arc<dyn NotificationScheduler>,
    settings: QuerySettings,
    in_flight: Mutex<()>,
}

impl OutageQueryService {
    pub fn new(
        source: Arc<dyn OutageSource>,
        session: SessionStore,
        scheduler: Arc<dyn NotificationScheduler>,
        settings: QuerySettings,
    ) -> Self {
        Self {
            source,
            session,
            scheduler,
            settings,
            in_flight: Mutex::new(()),
        }
    }

    /// Queries `identification`, or the last saved one when `None`.
    pub async fn query(
        &self,
        identification: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<QueryOutcome, QueryError> {
        let _in_flight = self
            .in_flight
            .try_lock()
            .map_err(|_| QueryError::AlreadyRunning)?;

        let identification = match identification {
            Some(identification) => Some(identification.to_owned()),
            None => self.session.identification().await?,
        };
        let identification = identification
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty())
            .ok_or(QueryError::MissingIdentification)?;

        self.session.save_identification(&identification).await?;

        let fetched = self
            .source
            .fetch(&identification)
            .await
            .map_err(|error| {
                log::error!("Error querying the outage API: {error:#}");
                QueryError::Unreachable(error)
            })?;

        if fetched.status == FetchStatus::Error {
            let message = fetched
                .error_message
                .unwrap_or_else(|| NO_RESULTS_MESSAGE.to_owned());
            log::warn!("Outage API rejected the query. [message = {message}]");
            self.session.clear_notices().await?;
            return Ok(QueryOutcome::Rejected { message });
        }

        let notices = fetched.notices;
        self.session.save_notices(&notices).await?;

        let notifications_enabled = self.session.notifications_enabled().await?;
        let plan = plan_reminders(&notices, now, self.settings.lead_time);
        let scheduled = self.replace_reminders(&plan, notifications_enabled).await?;

        Ok(QueryOutcome::Found(QueryReport {
            identification,
            notices,
            plan,
            scheduled,
            notifications_enabled,
        }))
    }

    pub async fn restore(&self) -> Result<RestoredSession, QueryError> {
        Ok(RestoredSession {
            identification: self.session.identification().await?,
            notices: self.session.notices().await?.unwrap_or_default(),
            notifications_enabled: self.session.notifications_enabled().await?,
        })
    }

    /// Restores the saved session and, when enabled, refreshes it right away.
    /// A refresh that cannot reach the API leaves the restored data in place.
    pub async fn startup(&self, now: DateTime<Utc>) -> Result<Startup, QueryError> {
        let restored = self.restore().await?;

        let refreshed = match (&restored.identification, self.settings.auto_query_on_start) {
            (Some(identification), true) => {
                match self.query(Some(identification.as_str()), now).await {
                    Ok(outcome) => Some(outcome),
                    Err(QueryError::Unreachable(_)) => None,
                    Err(error) => return Err(error),
                }
            }
            _ => None,
        };

        Ok(Startup {
            restored,
            refreshed,
        })
    }

    /// Persists the reminder toggle. Turning reminders off cancels everything
    /// pending; turning them on plans from the cached notices.
    ///
    /// Waits for a running query to finish so its reminders are replaced too.
    pub async fn set_notifications(
        &self,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledReminder>, QueryError> {
        let _in_flight = self.in_flight.lock().await;

        self.session.save_notifications_enabled(enabled).await?;
        log::info!("Reminders toggled. [enabled = {enabled}]");

        self.apply_notifications(enabled, now).await
    }

    /// Picks up a toggle saved by another process. `applied` is the state this
    /// service last acted on; returns the new state when it differs.
    pub async fn sync_notifications(
        &self,
        applied: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<bool>, QueryError> {
        let _in_flight = self.in_flight.lock().await;

        let saved = self.session.notifications_enabled().await?;
        if saved == applied {
            return Ok(None);
        }

        log::info!("Saved reminder toggle changed. [enabled = {saved}]");
        self.apply_notifications(saved, now).await?;
        Ok(Some(saved))
    }

    pub async fn notifications_enabled(&self) -> Result<bool, QueryError> {
        Ok(self.session.notifications_enabled().await?)
    }

    pub async fn pending_reminders(&self) -> Vec<ScheduledReminder> {
        self.scheduler.pending().await
    }

    async fn apply_notifications(
        &self,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledReminder>, QueryError> {
        let notices = if enabled {
            self.session.notices().await?.unwrap_or_default()
        } else {
            Vec::new()
        };
        let plan = plan_reminders(&notices, now, self.settings.lead_time);

        self.replace_reminders(&plan, enabled).await
    }

    async fn replace_reminders(
        &self,
        plan: &ReminderPlan,
        enabled: bool,
    ) -> Result<Vec<ScheduledReminder>, QueryError> {
        self.scheduler
            .cancel_all()
            .await
            .map_err(QueryError::Scheduling)?;

        for skipped in &plan.skipped {
            log::warn!(
                "Skipping outage window with invalid start. [account = {}, window = {}, error = {}]",
                skipped.account_id,
                skipped.position,
                skipped.error
            );
        }
        if !plan.dropped.is_empty() {
            log::debug!(
                "{} outage windows are too close or past for a reminder",
                plan.dropped.len()
            );
        }

        if !enabled {
            return Ok(Vec::new());
        }

        let mut scheduled = Vec::with_capacity(plan.triggers.len());
        for trigger in &plan.triggers {
            let position = trigger.position;
            match self.scheduler.schedule(trigger.clone()).await {
                Ok(reminder) => scheduled.push(reminder),
                Err(error) => log::warn!(
                    "Could not schedule reminder. [window = {position}, error = {error:#}]"
                ),
            }
        }

        log::info!("Scheduled {} reminders", scheduled.len());
        Ok(scheduled)
    }
}

#[cfg(test)]
mod tests;
