use chrono_tz::Tz;

use crate::outage::{ClockTime, OutageNotice, OutageWindow, WindowStart};

use super::dto::{ConsultaResponseDto, DetallePlanificacionDto, NotificacionDto, OK_STATUS};
use super::{FetchResponse, FetchStatus};

pub(super) fn into_fetch_response(dto: ConsultaResponseDto, timezone: &Tz) -> FetchResponse {
    let status = if dto.resp == OK_STATUS {
        FetchStatus::Ok
    } else {
        FetchStatus::Error
    };

    let notices = dto
        .notificaciones
        .into_iter()
        .map(|notice| into_notice(notice, timezone))
        .collect();

    FetchResponse {
        status,
        notices,
        error_message: dto.mensaje_error.filter(|message| !message.trim().is_empty()),
    }
}

fn into_notice(dto: NotificacionDto, timezone: &Tz) -> OutageNotice {
    OutageNotice {
        account_id: dto.cuenta_contrato,
        address: dto.direccion,
        feeder_id: dto.alimentador,
        cue: dto.cuen,
        registration_date: dto.fecha_registro,
        windows: dto
            .detalle_planificacion
            .into_iter()
            .map(|window| into_window(window, timezone))
            .collect(),
    }
}

fn into_window(dto: DetallePlanificacionDto, timezone: &Tz) -> OutageWindow {
    OutageWindow {
        starts_at: WindowStart::parse(&dto.fecha_hora_corte, timezone),
        date_label: dto.fecha_corte,
        hour_from: ClockTime::new(&dto.hora_desde),
        hour_to: ClockTime::new(&dto.hora_hasta),
    }
}
