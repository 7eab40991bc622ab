//! HTTP implementation of [`RemoteDatasetService`] for the V7 Darwin API.
//!
//! Endpoints are scoped by team slug and dataset slug:
//! - `POST   /teams/{team}/datasets/{dataset}/exports`
//! - `GET    /teams/{team}/datasets/{dataset}/exports`
//! - `DELETE /teams/{team}/datasets/{dataset}/exports/{name}`
//! - `GET    /teams/{team}/datasets/{dataset}/items[?statuses=...]`

use serde::de::DeserializeOwned;
use tracing::debug;

use super::{
    transfer, DatasetIdentifier, ExportRecord, ExportRequestOptions, ItemRecord,
    RemoteDatasetService,
};
use crate::config::RemoteConfig;
use crate::error::RemoteError;

/// Client for the annotation platform's JSON-over-HTTP API.
pub struct DarwinClient {
    config: RemoteConfig,
}

impl DarwinClient {
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }

    fn dataset_url(&self, dataset: &DatasetIdentifier, suffix: &str) -> String {
        format!(
            "{}/teams/{}/datasets/{}{}",
            self.config.base_url, self.config.team_slug, dataset, suffix
        )
    }

    fn auth_header(&self) -> String {
        format!("ApiKey {}", self.config.api_key)
    }

    fn request(&self, method: &'static str, url: &str) -> ureq::Request {
        transfer::agent()
            .request(method, url)
            .set("Authorization", &self.auth_header())
    }

    fn map_err(method: &'static str, endpoint: &str, err: ureq::Error) -> RemoteError {
        match err {
            ureq::Error::Status(status, _) => RemoteError::Status {
                method,
                endpoint: endpoint.to_string(),
                status,
            },
            ureq::Error::Transport(transport) => RemoteError::Transport {
                method,
                endpoint: endpoint.to_string(),
                message: transport.to_string(),
            },
        }
    }

    fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, RemoteError> {
        let response = self
            .request("GET", endpoint)
            .call()
            .map_err(|err| Self::map_err("GET", endpoint, err))?;
        response.into_json::<T>().map_err(|err| RemoteError::Decode {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        })
    }
}

impl RemoteDatasetService for DarwinClient {
    fn create_export(
        &self,
        dataset: &DatasetIdentifier,
        name: &str,
        item_ids: &[String],
        options: &ExportRequestOptions,
    ) -> Result<(), RemoteError> {
        let endpoint = self.dataset_url(dataset, "/exports");
        let payload = serde_json::json!({
            "format": options.format,
            "name": name,
            "include_authorship": options.include_authorship,
            "include_export_token": options.include_export_token,
            "dataset_item_ids": item_ids,
        });
        debug!(dataset = %dataset, name, items = item_ids.len(), "creating export");
        self.request("POST", &endpoint)
            .send_json(payload)
            .map_err(|err| Self::map_err("POST", &endpoint, err))?;
        Ok(())
    }

    fn list_exports(&self, dataset: &DatasetIdentifier) -> Result<Vec<ExportRecord>, RemoteError> {
        let endpoint = self.dataset_url(dataset, "/exports");
        self.get_json(&endpoint)
    }

    fn delete_export(&self, dataset: &DatasetIdentifier, name: &str) -> Result<(), RemoteError> {
        let endpoint = self.dataset_url(dataset, &format!("/exports/{name}"));
        debug!(dataset = %dataset, name, "deleting export");
        self.request("DELETE", &endpoint)
            .call()
            .map_err(|err| Self::map_err("DELETE", &endpoint, err))?;
        Ok(())
    }

    fn list_items(
        &self,
        dataset: &DatasetIdentifier,
        statuses: Option<&str>,
    ) -> Result<Vec<ItemRecord>, RemoteError> {
        let endpoint = self.dataset_url(dataset, "/items");
        match statuses {
            Some(statuses) => {
                let response = self
                    .request("GET", &endpoint)
                    .query("statuses", statuses)
                    .call()
                    .map_err(|err| Self::map_err("GET", &endpoint, err))?;
                response.into_json().map_err(|err| RemoteError::Decode {
                    endpoint: endpoint.clone(),
                    message: err.to_string(),
                })
            }
            None => self.get_json(&endpoint),
        }
    }
}
