use serde::{Deserialize, Deserializer};

pub const OK_STATUS: &str = "OK";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultaResponseDto {
    #[serde(default)]
    pub resp: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notificaciones: Vec<NotificacionDto>,
    #[serde(default)]
    pub mensaje_error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificacionDto {
    #[serde(default, deserialize_with = "lenient_string")]
    pub cuenta_contrato: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub direccion: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub alimentador: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cuen: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub fecha_registro: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub detalle_planificacion: Vec<DetallePlanificacionDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetallePlanificacionDto {
    #[serde(default, deserialize_with = "lenient_string")]
    pub fecha_corte: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub fecha_hora_corte: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub hora_desde: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub hora_hasta: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Account numbers sometimes come back as JSON numbers.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(text)) => text,
        Some(other) => other.to_string(),
    })
}
