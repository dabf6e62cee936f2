mod conversion;
mod dto;

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono_tz::Tz;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use url::Url;

use crate::appsettings::ApiSettings;
use crate::outage::OutageNotice;

const CONSULTA_PATH: [&str; 4] = ["servicios-linea", "v1", "notificaciones", "consultar"];
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: FetchStatus,
    pub notices: Vec<OutageNotice>,
    pub error_message: Option<String>,
}

#[async_trait]
pub trait OutageSource: Send + Sync + 'static {
    async fn fetch(&self, identification: &str) -> anyhow::Result<FetchResponse>;
}

pub struct CnelOutageSource {
    client: ClientWithMiddleware,
    base_url: Url,
    criterion: String,
    timezone: Tz,
}

impl CnelOutageSource {
    pub fn new(settings: &ApiSettings, timezone: Tz) -> anyhow::Result<Self> {
        let base_url = Url::parse(&settings.base_url)
            .with_context(|| format!("Invalid outage API base url {}", settings.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Outage API base url {base_url} cannot hold a path");
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .context("Failed to build the HTTP client")?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(MAX_RETRIES);
        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url,
            criterion: settings.criterion.clone(),
            timezone,
        })
    }

    fn consulta_url(&self, identification: &str) -> Url {
        build_consulta_url(&self.base_url, identification, &self.criterion)
    }
}

fn build_consulta_url(base_url: &Url, identification: &str, criterion: &str) -> Url {
    let mut url = base_url.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .extend(CONSULTA_PATH)
            .push(identification)
            .push(criterion);
    }
    url
}

#[async_trait]
impl OutageSource for CnelOutageSource {
    async fn fetch(&self, identification: &str) -> anyhow::Result<FetchResponse> {
        let url = self.consulta_url(identification);
        log::debug!("Querying planned outages. [url = {url}]");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to fetch request from {url}"))?;
        let http_status = response.status();

        let dto = response
            .json::<dto::ConsultaResponseDto>()
            .await
            .with_context(|| format!("Failed to deserialize response, status {http_status}"))?;

        let fetched = conversion::into_fetch_response(dto, &self.timezone);
        log::info!(
            "Outage API answered. [status = {:?}, notices = {}]",
            fetched.status,
            fetched.notices.len()
        );
        Ok(fetched)
    }
}
