use async_trait::async_trait;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::Error;

use super::{client::Client, endpoint::Endpoint};

#[async_trait]
pub trait Query<T, C>
where
    C: Client,
{
    async fn query(&self, client: &C) -> Result<T, Error>;
}

/// Full request url of `endpoint`, query string included.
pub fn request_url<E, C>(endpoint: &E, client: &C) -> Result<Url, Error>
where
    E: Endpoint + ?Sized,
    C: Client + ?Sized,
{
    let mut url = client.url(&endpoint.endpoint())?;

    endpoint.params().add_to_url(&mut url);
    return Ok(url);
}

#[async_trait]
impl<E, T, C> Query<T, C> for E
where
    E: Endpoint + Sync,
    T: DeserializeOwned + 'static,
    C: Client + Sync,
{
    async fn query(&self, client: &C) -> Result<T, Error> {
        let url = request_url(self, client)?;
        let request = http::Request::builder()
            .method(self.method())
            .uri(url.as_str());
        let response = client.exec(request, Vec::new()).await?;
        let status = response.status();

        if !status.is_success() {
            return Err(Error::StatusError {
                status,
                body: String::from_utf8_lossy(response.body()).into_owned(),
            });
        }
        return Ok(serde_json::from_slice(response.body())?);
    }
}
