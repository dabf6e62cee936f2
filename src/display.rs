use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::outage::{OutageNotice, OutageWindow};
use crate::schedule::{WindowStatus, classify};

const PAST_MARK: &str = "·";
const UPCOMING_MARK: &str = "▶";
const INVALID_MARK: &str = "?";

/// Renders notices the way the lookup screen lists them: account details
/// first, then every planned cut with past ones muted.
pub fn render_notices(notices: &[OutageNotice], now: DateTime<Utc>) -> String {
    if notices.is_empty() {
        return "No hay cortes planificados.\n".to_owned();
    }

    let mut out = String::new();
    for notice in notices {
        render_notice(&mut out, notice, now);
    }
    out
}

fn render_notice(out: &mut String, notice: &OutageNotice, now: DateTime<Utc>) {
    out.push_str(&format!(
        "Cuenta: {}\n  Dirección: {}\n  Alimentador: {}\n  CUE: {}\n  Fecha de Registro: {}\n",
        notice.account_id, notice.address, notice.feeder_id, notice.cue, notice.registration_date
    ));
    out.push_str("Cortes Planificados:\n");

    if notice.windows.is_empty() {
        out.push_str("  (ninguno)\n");
    }
    for window in &notice.windows {
        out.push_str(&render_window(window, now));
    }
    out.push('\n');
}

fn render_window(window: &OutageWindow, now: DateTime<Utc>) -> String {
    let (mark, suffix) = match classify(window, now) {
        Ok(WindowStatus::Upcoming) => (UPCOMING_MARK, ""),
        Ok(WindowStatus::Past) => (PAST_MARK, " (pasado)"),
        Err(_) => (INVALID_MARK, " (fecha inválida)"),
    };

    format!(
        "  {mark} {}  Desde: {} → Hasta: {}{suffix}\n",
        window.date_label, window.hour_from, window.hour_to
    )
}

/// Wall-clock time of a reminder in the zone the outage times are given in.
pub fn render_reminder_time(fire_at: DateTime<Utc>, tz: Tz) -> String {
    fire_at.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outage::{ClockTime, WindowStart};
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2024, 1, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
            .and_utc()
    }

    fn window(label: &str, starts_at: WindowStart) -> OutageWindow {
        OutageWindow {
            date_label: label.to_owned(),
            starts_at,
            hour_from: ClockTime::new("8:00"),
            hour_to: ClockTime::new("12:00"),
        }
    }

    #[test]
    fn every_window_is_listed_with_its_status() {
        let notices = vec![OutageNotice {
            account_id: "100".to_owned(),
            address: "Calle 1".to_owned(),
            feeder_id: "F-1".to_owned(),
            cue: "C-9".to_owned(),
            registration_date: "2024-01-02".to_owned(),
            windows: vec![
                window("Martes", at(8, 0).into()),
                window("Miércoles", at(10, 0).into()),
                window("Jueves", WindowStart::Unparseable("?".to_owned())),
            ],
        }];

        let rendered = render_notices(&notices, at(10, 0));

        assert!(rendered.starts_with("Cuenta: 100\n"));
        assert!(rendered.contains("  Alimentador: F-1\n"));
        assert!(rendered.contains("  · Martes  Desde: 08:00 → Hasta: 12:00 (pasado)\n"));
        assert!(rendered.contains("  ▶ Miércoles  Desde: 08:00 → Hasta: 12:00\n"));
        assert!(rendered.contains("  ? Jueves  Desde: 08:00 → Hasta: 12:00 (fecha inválida)\n"));
    }

    #[test]
    fn empty_list_has_a_message() {
        assert_eq!(render_notices(&[], at(10, 0)), "No hay cortes planificados.\n");
    }

    #[test]
    fn reminder_time_is_shown_in_outage_zone() {
        assert_eq!(
            render_reminder_time(at(14, 55), chrono_tz::America::Guayaquil),
            "2024-01-10 09:55"
        );
    }
}
