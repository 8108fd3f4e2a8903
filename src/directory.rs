//! Visitor directory
//!
//! CRUD façade over the external visitor records service. The conversation
//! flow never calls it; the HTTP API proxies it for staff tooling.

mod error;
mod http;
mod types;

pub use error::DirectoryError;
pub use http::HttpVisitorDirectory;
pub use types::{GroupMember, ScheduledMeeting, Visitor, VisitorType, VisitorUpdate};

use async_trait::async_trait;
use std::sync::Arc;

/// Visitor records keyed by national id (CNIC)
#[async_trait]
pub trait VisitorDirectory: Send + Sync {
    async fn create(&self, visitor: &Visitor) -> Result<Visitor, DirectoryError>;

    async fn list(&self) -> Result<Vec<Visitor>, DirectoryError>;

    async fn get(&self, cnic: &str) -> Result<Visitor, DirectoryError>;

    async fn update(&self, cnic: &str, update: &VisitorUpdate) -> Result<Visitor, DirectoryError>;

    async fn delete(&self, cnic: &str) -> Result<(), DirectoryError>;
}

#[async_trait]
impl<T: VisitorDirectory + ?Sized> VisitorDirectory for Arc<T> {
    async fn create(&self, visitor: &Visitor) -> Result<Visitor, DirectoryError> {
        (**self).create(visitor).await
    }

    async fn list(&self) -> Result<Vec<Visitor>, DirectoryError> {
        (**self).list().await
    }

    async fn get(&self, cnic: &str) -> Result<Visitor, DirectoryError> {
        (**self).get(cnic).await
    }

    async fn update(&self, cnic: &str, update: &VisitorUpdate) -> Result<Visitor, DirectoryError> {
        (**self).update(cnic, update).await
    }

    async fn delete(&self, cnic: &str) -> Result<(), DirectoryError> {
        (**self).delete(cnic).await
    }
}
