//! Blocking HTTP registry client.
//!
//! Authentication is a static bearer token taken from configuration. There
//! is no device-authorization flow here.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{
    CreatePipeRequest, PipeMetadata, PushResponse, Registry, RegistryError, RegistryResult,
    TagDetail,
};
use crate::hub::{PipeId, TagName};

const API_PREFIX: &str = "/api/v1/pipes";

/// HTTP client for the pipe registry API.
pub struct HttpRegistry {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRegistry {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> RegistryResult<Self> {
        let client = Client::builder()
            .user_agent(format!("pipehub/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, endpoint)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn get(&self, endpoint: &str) -> RegistryResult<Response> {
        let url = self.url(endpoint);
        debug!(%url, "GET");
        let response = self.authorize(self.client.get(&url)).send()?;
        check_status(response, &url)
    }

    fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> RegistryResult<T> {
        parse_json(self.get(endpoint)?)
    }
}

fn pipe_path(pipe: &PipeId) -> String {
    format!("/{}/{}", pipe.owner(), pipe.name())
}

fn check_status(response: Response, url: &str) -> RegistryResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::NOT_FOUND => Err(RegistryError::NotFound(url.to_string())),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RegistryError::Unauthorized),
        _ => {
            let message = response.text().unwrap_or_default();
            Err(RegistryError::Status {
                status: status.as_u16(),
                message,
            })
        }
    }
}

fn parse_json<T: DeserializeOwned>(response: Response) -> RegistryResult<T> {
    let body = response.text()?;
    serde_json::from_str(&body).map_err(|e| RegistryError::InvalidResponse(e.to_string()))
}

impl Registry for HttpRegistry {
    fn get_tag(&self, pipe: &PipeId, tag: &TagName) -> RegistryResult<TagDetail> {
        self.get_json(&format!("{}/tags/{}", pipe_path(pipe), tag))
    }

    fn download_tag(&self, pipe: &PipeId, tag: &TagName) -> RegistryResult<Vec<u8>> {
        let response = self.get(&format!("{}/tags/{}/content", pipe_path(pipe), tag))?;
        Ok(response.bytes()?.to_vec())
    }

    fn get_pipe(&self, pipe: &PipeId) -> RegistryResult<Option<PipeMetadata>> {
        match self.get_json(&pipe_path(pipe)) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create_pipe(
        &self,
        owner: &str,
        request: &CreatePipeRequest,
    ) -> RegistryResult<PipeMetadata> {
        let url = self.url(&format!("/{}", owner));
        debug!(%url, name = %request.name, "POST create pipe");
        let response = self
            .authorize(self.client.post(&url).json(request))
            .send()?;
        parse_json(check_status(response, &url)?)
    }

    fn push(
        &self,
        pipe: &PipeId,
        content: &[u8],
        tags: &[TagName],
    ) -> RegistryResult<PushResponse> {
        let url = self.url(&format!("{}/push", pipe_path(pipe)));
        let query: Vec<(&str, &str)> = tags.iter().map(|t| ("tag", t.as_str())).collect();
        debug!(%url, size = content.len(), "POST push");
        let response = self
            .authorize(
                self.client
                    .post(&url)
                    .query(&query)
                    .header(reqwest::header::CONTENT_TYPE, "application/x-yaml")
                    .body(content.to_vec()),
            )
            .send()?;
        parse_json(check_status(response, &url)?)
    }
}
