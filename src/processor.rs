//! Message processor boundary
//!
//! The processor owns the registration flow: it interprets each visitor
//! message, picks the next step and returns field updates. The controller
//! only sees it through [`MessageProcessor`].

mod error;
mod http;
mod types;

pub use error::{ProcessorError, ProcessorErrorKind};
pub use http::HttpMessageProcessor;
pub use types::{ProcessorReply, ProcessorRequest};

use async_trait::async_trait;
use std::sync::Arc;

/// Interprets one visitor message
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    async fn process(&self, request: &ProcessorRequest) -> Result<ProcessorReply, ProcessorError>;
}

#[async_trait]
impl<T: MessageProcessor + ?Sized> MessageProcessor for Arc<T> {
    async fn process(&self, request: &ProcessorRequest) -> Result<ProcessorReply, ProcessorError> {
        (**self).process(request).await
    }
}

/// Logging wrapper for message processors
pub struct LoggingProcessor {
    inner: Arc<dyn MessageProcessor>,
}

impl LoggingProcessor {
    pub fn new(inner: Arc<dyn MessageProcessor>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl MessageProcessor for LoggingProcessor {
    async fn process(&self, request: &ProcessorRequest) -> Result<ProcessorReply, ProcessorError> {
        let start = std::time::Instant::now();
        let result = self.inner.process(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    current_step = %request.current_step,
                    next_step = reply.next_step.as_ref().map_or("-", |s| s.as_str()),
                    duration_ms = %duration.as_millis(),
                    "Processor request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    current_step = %request.current_step,
                    duration_ms = %duration.as_millis(),
                    kind = ?e.kind,
                    error = %e.message,
                    "Processor request failed"
                );
            }
        }

        result
    }
}
