use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Notify;

use crate::api::{FetchResponse, FetchStatus, OutageSource};
use crate::outage::{ClockTime, OutageNotice, OutageWindow, WindowStart};
use crate::planning::{LEAD_TIME, ReminderTrigger};
use crate::scheduling::{NotificationScheduler, ScheduledReminder};
use crate::storage::{InMemoryKeyValueStore, SessionStore};

use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
enum SchedulerEvent {
    CancelAll,
    Schedule(DateTime<Utc>),
}

#[derive(Default)]
struct RecordingScheduler {
    events: StdMutex<Vec<SchedulerEvent>>,
}

impl RecordingScheduler {
    fn events(&self) -> Vec<SchedulerEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationScheduler for RecordingScheduler {
    async fn schedule(&self, trigger: ReminderTrigger) -> anyhow::Result<ScheduledReminder> {
        let mut events = self.events.lock().unwrap();
        events.push(SchedulerEvent::Schedule(trigger.fire_at));
        Ok(ScheduledReminder {
            id: events.len() as u64,
            fire_at: trigger.fire_at,
        })
    }

    async fn cancel_all(&self) -> anyhow::Result<usize> {
        self.events.lock().unwrap().push(SchedulerEvent::CancelAll);
        Ok(0)
    }

    async fn pending(&self) -> Vec<ScheduledReminder> {
        Vec::new()
    }
}

enum Answer {
    Found(Vec<OutageNotice>),
    Rejected(Option<&'static str>),
    Unreachable,
}

struct FakeSource {
    answer: Answer,
    requested: StdMutex<Vec<String>>,
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl FakeSource {
    fn new(answer: Answer) -> Self {
        Self {
            answer,
            requested: StdMutex::new(Vec::new()),
            gate: None,
        }
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutageSource for FakeSource {
    async fn fetch(&self, identification: &str) -> anyhow::Result<FetchResponse> {
        self.requested
            .lock()
            .unwrap()
            .push(identification.to_owned());

        if let Some((started, release)) = &self.gate {
            started.notify_one();
            release.notified().await;
        }

        match &self.answer {
            Answer::Found(notices) => Ok(FetchResponse {
                status: FetchStatus::Ok,
                notices: notices.clone(),
                error_message: None,
            }),
            Answer::Rejected(message) => Ok(FetchResponse {
                status: FetchStatus::Error,
                notices: Vec::new(),
                error_message: message.map(str::to_owned),
            }),
            Answer::Unreachable => anyhow::bail!("connection refused"),
        }
    }
}

struct TestContext {
    source: Arc<FakeSource>,
    scheduler: Arc<RecordingScheduler>,
    session: SessionStore,
    service: Arc<OutageQueryService>,
}

impl TestContext {
    fn new(source: FakeSource) -> Self {
        let source = Arc::new(source);
        let scheduler = Arc::new(RecordingScheduler::default());
        let session = SessionStore::new(Arc::new(InMemoryKeyValueStore::new()));
        let service = Arc::new(OutageQueryService::new(
            source.clone(),
            session.clone(),
            scheduler.clone(),
            QuerySettings {
                lead_time: LEAD_TIME,
                auto_query_on_start: true,
            },
        ));

        Self {
            source,
            scheduler,
            session,
            service,
        }
    }
}

fn at(h: u32, m: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2024, 1, 10)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
        .and_utc()
}

fn window(starts_at: WindowStart) -> OutageWindow {
    OutageWindow {
        date_label: "Miércoles".to_owned(),
        starts_at,
        hour_from: ClockTime::new("10:10"),
        hour_to: ClockTime::new("14:00"),
    }
}

fn notices() -> Vec<OutageNotice> {
    vec![OutageNotice {
        account_id: "100".to_owned(),
        address: "Calle 1".to_owned(),
        feeder_id: "F-1".to_owned(),
        cue: "C".to_owned(),
        registration_date: "2024-01-02".to_owned(),
        windows: vec![
            window(at(10, 10).into()),
            window(at(8, 0).into()),
            window(WindowStart::Unparseable("x".to_owned())),
            window(at(15, 0).into()),
        ],
    }]
}

fn found(outcome: QueryOutcome) -> QueryReport {
    match outcome {
        QueryOutcome::Found(report) => report,
        QueryOutcome::Rejected { message } => panic!("unexpected rejection: {message}"),
    }
}

#[tokio::test]
async fn successful_query_cancels_then_schedules_future_reminders() {
    let ctx = TestContext::new(FakeSource::new(Answer::Found(notices())));
    ctx.session.save_notifications_enabled(true).await.unwrap();

    let report = found(ctx.service.query(Some(" 0912345678 "), at(9, 0)).await.unwrap());

    assert_eq!(ctx.source.requested(), vec!["0912345678"]);
    assert_eq!(report.identification, "0912345678");
    assert_eq!(report.scheduled.len(), 2);
    assert_eq!(report.plan.skipped.len(), 1);
    assert_eq!(
        ctx.scheduler.events(),
        vec![
            SchedulerEvent::CancelAll,
            SchedulerEvent::Schedule(at(9, 55)),
            SchedulerEvent::Schedule(at(14, 45)),
        ]
    );
    assert_eq!(
        ctx.session.identification().await.unwrap().as_deref(),
        Some("0912345678")
    );
    assert_eq!(ctx.session.notices().await.unwrap(), Some(notices()));
}

#[tokio::test]
async fn disabled_reminders_still_clear_the_previous_plan() {
    let ctx = TestContext::new(FakeSource::new(Answer::Found(notices())));

    let report = found(ctx.service.query(Some("0912345678"), at(9, 0)).await.unwrap());

    assert!(!report.notifications_enabled);
    assert!(report.scheduled.is_empty());
    assert_eq!(report.plan.triggers.len(), 2);
    assert_eq!(ctx.scheduler.events(), vec![SchedulerEvent::CancelAll]);
}

#[tokio::test]
async fn saved_identification_is_used_when_none_is_given() {
    let ctx = TestContext::new(FakeSource::new(Answer::Found(Vec::new())));
    ctx.session.save_identification("1311111111").await.unwrap();

    found(ctx.service.query(None, at(9, 0)).await.unwrap());

    assert_eq!(ctx.source.requested(), vec!["1311111111"]);
}

#[tokio::test]
async fn blank_identification_is_refused_before_fetching() {
    let ctx = TestContext::new(FakeSource::new(Answer::Found(notices())));

    let error = ctx.service.query(Some("   "), at(9, 0)).await.unwrap_err();

    assert!(matches!(error, QueryError::MissingIdentification));
    assert_eq!(error.to_string(), "Por favor, ingrese un número válido.");
    assert!(ctx.source.requested().is_empty());
    assert!(ctx.scheduler.events().is_empty());
}

#[tokio::test]
async fn rejected_query_clears_cached_notices() {
    let ctx = TestContext::new(FakeSource::new(Answer::Rejected(None)));
    ctx.session.save_notices(&notices()).await.unwrap();

    let outcome = ctx.service.query(Some("0912345678"), at(9, 0)).await.unwrap();

    match outcome {
        QueryOutcome::Rejected { message } => {
            assert_eq!(message, "No se encontraron resultados.")
        }
        QueryOutcome::Found(_) => panic!("expected a rejection"),
    }
    assert_eq!(ctx.session.notices().await.unwrap(), None);
    assert!(ctx.scheduler.events().is_empty());
}

#[tokio::test]
async fn rejection_message_from_the_api_is_kept() {
    let ctx = TestContext::new(FakeSource::new(Answer::Rejected(Some(
        "Identificación no registrada",
    ))));

    let outcome = ctx.service.query(Some("0912345678"), at(9, 0)).await.unwrap();

    assert!(matches!(
        outcome,
        QueryOutcome::Rejected { message } if message == "Identificación no registrada"
    ));
}

#[tokio::test]
async fn unreachable_api_keeps_cached_notices() {
    let ctx = TestContext::new(FakeSource::new(Answer::Unreachable));
    ctx.session.save_notices(&notices()).await.unwrap();

    let error = ctx.service.query(Some("0912345678"), at(9, 0)).await.unwrap_err();

    assert!(matches!(error, QueryError::Unreachable(_)));
    assert_eq!(ctx.session.notices().await.unwrap(), Some(notices()));
    assert!(ctx.scheduler.events().is_empty());
}

#[tokio::test]
async fn second_query_while_one_is_running_is_rejected() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let mut source = FakeSource::new(Answer::Found(notices()));
    source.gate = Some((started.clone(), release.clone()));
    let ctx = TestContext::new(source);

    let service = ctx.service.clone();
    let first = tokio::spawn(async move { service.query(Some("0912345678"), at(9, 0)).await });
    started.notified().await;

    let second = ctx.service.query(Some("0912345678"), at(9, 0)).await;
    release.notify_one();

    assert!(matches!(second, Err(QueryError::AlreadyRunning)));
    assert!(matches!(first.await.unwrap(), Ok(QueryOutcome::Found(_))));
    assert_eq!(ctx.source.requested().len(), 1);
}

#[tokio::test]
async fn startup_restores_and_refreshes_saved_identification() {
    let ctx = TestContext::new(FakeSource::new(Answer::Found(notices())));
    ctx.session.save_identification("0912345678").await.unwrap();
    ctx.session.save_notifications_enabled(true).await.unwrap();

    let startup = ctx.service.startup(at(9, 0)).await.unwrap();

    assert_eq!(startup.restored.identification.as_deref(), Some("0912345678"));
    assert!(startup.restored.notices.is_empty());
    assert!(startup.restored.notifications_enabled);
    assert_eq!(found(startup.refreshed.unwrap()).scheduled.len(), 2);
}

#[tokio::test]
async fn startup_without_network_keeps_restored_notices() {
    let ctx = TestContext::new(FakeSource::new(Answer::Unreachable));
    ctx.session.save_identification("0912345678").await.unwrap();
    ctx.session.save_notices(&notices()).await.unwrap();

    let startup = ctx.service.startup(at(9, 0)).await.unwrap();

    assert!(startup.refreshed.is_none());
    assert_eq!(startup.restored.notices, notices());
}

#[tokio::test]
async fn startup_without_saved_identification_does_not_query() {
    let ctx = TestContext::new(FakeSource::new(Answer::Found(notices())));

    let startup = ctx.service.startup(at(9, 0)).await.unwrap();

    assert!(startup.refreshed.is_none());
    assert!(ctx.source.requested().is_empty());
}

#[tokio::test]
async fn enabling_reminders_plans_from_cached_notices() {
    let ctx = TestContext::new(FakeSource::new(Answer::Unreachable));
    ctx.session.save_notices(&notices()).await.unwrap();

    let scheduled = ctx.service.set_notifications(true, at(9, 0)).await.unwrap();

    assert_eq!(scheduled.len(), 2);
    assert!(ctx.service.notifications_enabled().await.unwrap());
    assert_eq!(ctx.scheduler.events()[0], SchedulerEvent::CancelAll);
}

#[tokio::test]
async fn disabling_reminders_cancels_everything() {
    let ctx = TestContext::new(FakeSource::new(Answer::Unreachable));
    ctx.session.save_notices(&notices()).await.unwrap();
    ctx.session.save_notifications_enabled(true).await.unwrap();

    let scheduled = ctx.service.set_notifications(false, at(9, 0)).await.unwrap();

    assert!(scheduled.is_empty());
    assert!(!ctx.session.notifications_enabled().await.unwrap());
    assert_eq!(ctx.scheduler.events(), vec![SchedulerEvent::CancelAll]);
}

#[tokio::test]
async fn disabling_during_a_running_query_cancels_its_reminders() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let mut source = FakeSource::new(Answer::Found(notices()));
    source.gate = Some((started.clone(), release.clone()));
    let ctx = TestContext::new(source);
    ctx.session.save_notifications_enabled(true).await.unwrap();

    let service = ctx.service.clone();
    let query = tokio::spawn(async move { service.query(Some("0912345678"), at(9, 0)).await });
    started.notified().await;

    let service = ctx.service.clone();
    let toggle = tokio::spawn(async move { service.set_notifications(false, at(9, 0)).await });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(ctx.session.notifications_enabled().await.unwrap());

    release.notify_one();
    let report = found(query.await.unwrap().unwrap());
    let scheduled = toggle.await.unwrap().unwrap();

    assert_eq!(report.scheduled.len(), 2);
    assert!(scheduled.is_empty());
    assert!(!ctx.session.notifications_enabled().await.unwrap());
    assert_eq!(
        ctx.scheduler.events(),
        vec![
            SchedulerEvent::CancelAll,
            SchedulerEvent::Schedule(at(9, 55)),
            SchedulerEvent::Schedule(at(14, 45)),
            SchedulerEvent::CancelAll,
        ]
    );
}

#[tokio::test]
async fn toggle_saved_elsewhere_is_applied_once() {
    let ctx = TestContext::new(FakeSource::new(Answer::Unreachable));
    ctx.session.save_notices(&notices()).await.unwrap();
    ctx.session.save_notifications_enabled(true).await.unwrap();

    assert_eq!(ctx.service.sync_notifications(false, at(9, 0)).await.unwrap(), Some(true));
    assert_eq!(ctx.service.sync_notifications(true, at(9, 0)).await.unwrap(), None);

    ctx.session.save_notifications_enabled(false).await.unwrap();
    assert_eq!(ctx.service.sync_notifications(true, at(9, 0)).await.unwrap(), Some(false));

    assert_eq!(
        ctx.scheduler.events(),
        vec![
            SchedulerEvent::CancelAll,
            SchedulerEvent::Schedule(at(9, 55)),
            SchedulerEvent::Schedule(at(14, 45)),
            SchedulerEvent::CancelAll,
        ]
    );
}
