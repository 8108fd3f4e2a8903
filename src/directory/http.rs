//! HTTP client for the visitor directory service

use super::{DirectoryError, Visitor, VisitorDirectory, VisitorUpdate};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

/// Talks to `{base_url}/visitors/`
pub struct HttpVisitorDirectory {
    client: Client,
    base_url: String,
}

impl HttpVisitorDirectory {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DirectoryError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/visitors/", self.base_url)
    }

    fn visitor_url(&self, cnic: &str) -> String {
        format!("{}/visitors/{cnic}", self.base_url)
    }

    async fn check(response: Response, cnic: Option<&str>) -> Result<Response, DirectoryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if let (StatusCode::NOT_FOUND, Some(cnic)) = (status, cnic) {
            return Err(DirectoryError::NotFound(cnic.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        Err(DirectoryError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl VisitorDirectory for HttpVisitorDirectory {
    async fn create(&self, visitor: &Visitor) -> Result<Visitor, DirectoryError> {
        let response = self
            .client
            .post(self.collection_url())
            .json(visitor)
            .send()
            .await?;
        let created = Self::check(response, None).await?.json().await?;
        tracing::info!(full_name = %visitor.full_name, "Visitor created");
        Ok(created)
    }

    async fn list(&self) -> Result<Vec<Visitor>, DirectoryError> {
        let response = self.client.get(self.collection_url()).send().await?;
        Ok(Self::check(response, None).await?.json().await?)
    }

    async fn get(&self, cnic: &str) -> Result<Visitor, DirectoryError> {
        let response = self.client.get(self.visitor_url(cnic)).send().await?;
        Ok(Self::check(response, Some(cnic)).await?.json().await?)
    }

    async fn update(&self, cnic: &str, update: &VisitorUpdate) -> Result<Visitor, DirectoryError> {
        let response = self
            .client
            .put(self.visitor_url(cnic))
            .json(update)
            .send()
            .await?;
        Ok(Self::check(response, Some(cnic)).await?.json().await?)
    }

    async fn delete(&self, cnic: &str) -> Result<(), DirectoryError> {
        let response = self.client.delete(self.visitor_url(cnic)).send().await?;
        Self::check(response, Some(cnic)).await?;
        tracing::info!(cnic = %cnic, "Visitor deleted");
        Ok(())
    }
}
