use crate::error::PoolError;
use crate::pool::Instance;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Directory "find instances" response body.
#[derive(Debug, Deserialize)]
struct InstancesResponse {
    #[serde(default, deserialize_with = "deserialize_null_default")]
    instances: Vec<Instance>,
}

/// Decode a `{"instances": [...]}` body. A null or missing list is empty.
pub fn parse_instances(body: &str) -> Result<Vec<Instance>, PoolError> {
    let resp: InstancesResponse = serde_json::from_str(body)
        .map_err(|e| PoolError::Directory(format!("decode instances: {}", e)))?;
    Ok(resp.instances)
}

/// Fetches the instance list that feeds `AddressPool::apply_resync`.
#[derive(Clone)]
pub struct DirectoryClient {
    url: String,
    client: reqwest::Client,
}

impl DirectoryClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, PoolError> {
        let url = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("http://{}", url)
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()?;

        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch_instances(&self) -> Result<Vec<Instance>, PoolError> {
        let resp = self.client.get(&self.url).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PoolError::Directory(format!(
                "non-200 response: status={}, body={}",
                status, body
            )));
        }

        let body = resp.text().await?;
        parse_instances(&body)
    }
}
