use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{header::ACCEPT, request, response, HeaderValue};
use url::Url;

use crate::{error::Error, UPBIT_API_URL};

#[async_trait]
pub trait Client {
    fn url(&self, endpoint: &str) -> Result<Url, Error>;

    async fn exec(
        &self,
        request: request::Builder,
        body: Vec<u8>,
    ) -> Result<response::Response<Bytes>, Error>;
}

pub struct RestClient {
    client: reqwest::Client,
    base_url: Url,
}

impl RestClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let base_url = Url::parse(base_url)?;

        return Ok(Self { client, base_url });
    }

    pub fn public() -> anyhow::Result<Self, Error> {
        return Self::new(UPBIT_API_URL);
    }

    async fn send(
        &self,
        request: request::Builder,
        body: Vec<u8>,
    ) -> anyhow::Result<response::Response<Bytes>, Error> {
        let mut http_request = request.body(body)?;
        http_request
            .headers_mut()
            .insert(ACCEPT, HeaderValue::from_static("application/json"));
        let request: reqwest::Request = http_request.try_into()?;
        let resp = self.client.execute(request).await?;
        let mut http_resp = http::response::Response::builder()
            .status(resp.status())
            .version(resp.version());

        if let Some(remaining) = resp.headers().get("remaining-req") {
            tracing::trace!("Upbit remaining-req={remaining:?}");
        }
        if let Some(http_headers) = http_resp.headers_mut() {
            for (key, value) in resp.headers() {
                http_headers.insert(key, value.to_owned());
            }
        }
        return Ok(http_resp.body(resp.bytes().await?)?);
    }
}

#[async_trait]
impl Client for RestClient {
    fn url(&self, endpoint: &str) -> anyhow::Result<Url, Error> {
        let url = self.base_url.join(endpoint)?.to_owned();

        return Ok(url);
    }

    async fn exec(
        &self,
        request: request::Builder,
        body: Vec<u8>,
    ) -> anyhow::Result<response::Response<Bytes>, Error> {
        return self.send(request, body).await;
    }
}
