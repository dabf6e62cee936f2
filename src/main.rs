use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use chrono::Utc;
use chrono_tz::Tz;
use clap::{Parser, Subcommand, ValueEnum};

use cortes::{
    api::CnelOutageSource,
    appsettings::AppSettings,
    display::{render_notices, render_reminder_time},
    query::{OutageQueryService, QueryError, QueryOutcome, QueryReport, QuerySettings},
    scheduling::{
        ConsoleDeliveryChannel, DeliveryReminderScheduler, NotificationScheduler,
        PlannedReminderScheduler, ReminderDeliveryChannel, ScheduledReminder,
    },
    storage::{FileKeyValueStore, SessionStore},
    telegram::TelegramDeliveryChannel,
};

const TOGGLE_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "cortes")]
#[command(about = "Consulta de cortes de luz planificados y recordatorios")]
#[command(version)]
struct Args {
    /// Settings file to use instead of ./appsettings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Query planned outages for a cédula (defaults to the last one used)
    Query { identification: Option<String> },
    /// Show the outages saved by the last successful query
    Show,
    /// Turn outage reminders on or off
    Notifications { state: ToggleState },
    /// Query, then stay running to deliver reminders and refresh periodically
    Watch { identification: Option<String> },
}

#[derive(Clone, Copy, ValueEnum)]
enum ToggleState {
    On,
    Off,
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let args = Args::parse();
    let settings =
        AppSettings::new(args.config.as_deref()).context("Failed to load application settings")?;
    log::debug!("Loaded settings {settings:?}");

    let delivering = matches!(args.command, Command::Watch { .. });
    let service = build_service(&settings, delivering)?;
    let tz = settings.reminders.timezone;

    match args.command {
        Command::Query { identification } => {
            let outcome = service.query(identification.as_deref(), Utc::now()).await?;
            print_outcome(&outcome, tz, delivering);
        }
        Command::Show => {
            let restored = service.restore().await?;
            match &restored.identification {
                Some(identification) => println!("Cédula: {identification}\n"),
                None => println!("Todavía no se ha realizado ninguna consulta.\n"),
            }
            print!("{}", render_notices(&restored.notices, Utc::now()));
        }
        Command::Notifications { state } => match state {
            ToggleState::On => {
                let planned = service.set_notifications(true, Utc::now()).await?;
                println!("Recordatorios activados.");
                print_reminders(&planned, tz, delivering);
            }
            ToggleState::Off => {
                service.set_notifications(false, Utc::now()).await?;
                println!("Recordatorios desactivados.");
            }
            ToggleState::Status => {
                let enabled = service.notifications_enabled().await?;
                println!(
                    "Recordatorios {}.",
                    if enabled { "activados" } else { "desactivados" }
                );
            }
        },
        Command::Watch { identification } => {
            watch(&service, identification, &settings).await?;
        }
    }

    Ok(())
}

/// Only a delivering service keeps reminder tasks alive; the others just plan.
fn build_service(settings: &AppSettings, delivering: bool) -> anyhow::Result<OutageQueryService> {
    let source = CnelOutageSource::new(&settings.api, settings.reminders.timezone)?;
    let session = SessionStore::new(Arc::new(FileKeyValueStore::new(&settings.storage.path)));

    let scheduler: Arc<dyn NotificationScheduler> = if delivering {
        let delivery_channel: Arc<dyn ReminderDeliveryChannel> = match &settings.telegram {
            Some(telegram) => {
                log::info!("Delivering reminders to Telegram chat {}", telegram.chat_id);
                Arc::new(TelegramDeliveryChannel::create(telegram)?)
            }
            None => Arc::new(ConsoleDeliveryChannel),
        };
        Arc::new(DeliveryReminderScheduler::new(delivery_channel))
    } else {
        Arc::new(PlannedReminderScheduler::new())
    };

    Ok(OutageQueryService::new(
        Arc::new(source),
        session,
        scheduler,
        QuerySettings {
            lead_time: settings.reminders.lead_time(),
            auto_query_on_start: settings.app.auto_query_on_start,
        },
    ))
}

async fn watch(
    service: &OutageQueryService,
    identification: Option<String>,
    settings: &AppSettings,
) -> anyhow::Result<()> {
    let tz = settings.reminders.timezone;
    match identification {
        Some(identification) => {
            report_query(service.query(Some(&identification), Utc::now()).await, tz)?;
        }
        None => {
            let startup = service.startup(Utc::now()).await?;
            match startup.refreshed {
                Some(outcome) => print_outcome(&outcome, tz, true),
                None => print!("{}", render_notices(&startup.restored.notices, Utc::now())),
            }
        }
    }

    let mut applied = service.notifications_enabled().await?;
    let mut toggle_poll = tokio::time::interval(TOGGLE_POLL_INTERVAL);
    toggle_poll.tick().await;

    let refresh_every = settings.app.refresh_interval_minutes;
    let mut refresh = (refresh_every > 0)
        .then(|| tokio::time::interval(Duration::from_secs(refresh_every * 60)));
    if let Some(refresh) = refresh.as_mut() {
        refresh.tick().await;
    }

    println!("Esperando recordatorios. Ctrl-C para salir.");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down");
                return Ok(());
            }
            _ = toggle_poll.tick() => {
                if let Some(enabled) = service.sync_notifications(applied, Utc::now()).await? {
                    applied = enabled;
                    println!(
                        "Recordatorios {}.",
                        if enabled { "activados" } else { "desactivados" }
                    );
                }
            }
            _ = async {
                match refresh.as_mut() {
                    Some(refresh) => refresh.tick().await,
                    None => std::future::pending().await,
                }
            } => {
                log::info!("Refreshing planned outages");
                report_query(service.query(None, Utc::now()).await, tz)?;
            }
        }
    }
}

/// Prints the outcome; only errors the user cannot retry past are fatal.
fn report_query(result: Result<QueryOutcome, QueryError>, tz: Tz) -> anyhow::Result<()> {
    match result {
        Ok(outcome) => print_outcome(&outcome, tz, true),
        Err(error @ (QueryError::Unreachable(_) | QueryError::AlreadyRunning)) => {
            eprintln!("Error: {error}");
        }
        Err(error) => return Err(error.into()),
    }
    Ok(())
}

fn print_outcome(outcome: &QueryOutcome, tz: Tz, delivering: bool) {
    match outcome {
        QueryOutcome::Found(report) => print_report(report, tz, delivering),
        QueryOutcome::Rejected { message } => eprintln!("Error: {message}"),
    }
}

fn print_report(report: &QueryReport, tz: Tz, delivering: bool) {
    println!("Cédula: {}\n", report.identification);
    print!("{}", render_notices(&report.notices, Utc::now()));

    for skipped in &report.plan.skipped {
        println!(
            "Aviso: el corte {} de la cuenta {} tiene una fecha inválida ({}).",
            skipped.position, skipped.account_id, skipped.error.raw
        );
    }

    if report.notifications_enabled {
        print_reminders(&report.scheduled, tz, delivering);
    }
}

fn print_reminders(reminders: &[ScheduledReminder], tz: Tz, delivering: bool) {
    if reminders.is_empty() {
        println!("No hay recordatorios pendientes.");
        return;
    }

    if delivering {
        println!("Recordatorios programados:");
    } else {
        println!("Recordatorios planificados (se entregan mientras `cortes watch` esté en ejecución):");
    }
    for reminder in reminders {
        println!("  {}", render_reminder_time(reminder.fire_at, tz));
    }
}
