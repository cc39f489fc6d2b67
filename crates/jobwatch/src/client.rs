use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::model::BuildSnapshot;
use crate::poller::JobSource;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Job API over HTTP:
/// `GET {base}/jobs/{id}` returns the JSON snapshot and
/// `GET {base}/jobs/{id}/log` the full console log as text.
pub struct HttpJobSource {
    base: String,
    token: Option<String>,
    client: Client,
}

impl HttpJobSource {
    pub fn new(cfg: &ServerConfig) -> Result<Self> {
        let base = cfg.resolve_base_url()?;
        let timeout = cfg
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
            .max(1);
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(|e| Error::msg(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            token: cfg.resolve_token(),
            client,
        })
    }

    fn job_url(&self, id: &str, suffix: &str) -> String {
        format!("{}/jobs/{}{suffix}", self.base, id.trim())
    }

    fn get(&self, url: String) -> RequestBuilder {
        let req = self.client.get(url);
        match self.token.as_deref() {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    fn send_checked(&self, id: &str, req: RequestBuilder) -> Result<Response> {
        let res = req.send()?;
        if res.status().is_success() {
            return Ok(res);
        }
        if res.status() == StatusCode::NOT_FOUND {
            return Err(Error::msg(format!("job {id} not found")));
        }
        Err(Error::msg(format!(
            "job API request failed with status {}",
            res.status()
        )))
    }
}

impl JobSource for HttpJobSource {
    fn fetch_status(&self, id: &str) -> Result<BuildSnapshot> {
        let req = self.get(self.job_url(id, ""));
        let res = self.send_checked(id, req)?;
        let snapshot = res.json::<BuildSnapshot>()?;
        Ok(snapshot)
    }

    fn fetch_log(&self, id: &str) -> Result<String> {
        let req = self.get(self.job_url(id, "/log"));
        let res = self.send_checked(id, req)?;
        Ok(res.text()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_job_urls_without_double_slashes() {
        let cfg = ServerConfig {
            base_url: Some("https://ci.example.com/api/".into()),
            ..ServerConfig::default()
        };
        let src = HttpJobSource::new(&cfg).unwrap();
        assert_eq!(src.job_url("42", ""), "https://ci.example.com/api/jobs/42");
        assert_eq!(
            src.job_url(" 42 ", "/log"),
            "https://ci.example.com/api/jobs/42/log"
        );
    }
}
