//! # Task Persistence Transport
//!
//! Delivery of one batch to the task backend. The queue only cares whether
//! a submission succeeded; everything else about the remote is behind
//! [`TaskTransport`].

use crate::shared::error::SyncError;
use crate::shared::task::Task;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

/// Submits batches of tasks to the backend
#[async_trait]
pub trait TaskTransport: Send + Sync {
    async fn submit_batch(&self, tasks: &[Task]) -> Result<(), SyncError>;
}

/// Request body of `POST /tasks`
#[derive(Debug, Serialize)]
struct SubmitTasksRequest<'a> {
    tasks: &'a [Task],
}

/// `POST {api_url}/tasks` with `{"tasks": [...]}`
#[derive(Debug, Clone)]
pub struct HttpTaskTransport {
    client: Client,
    url: String,
}

impl HttpTaskTransport {
    /// `url` is the full endpoint, e.g. `AppConfig::tasks_url()`
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), url)
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl TaskTransport for HttpTaskTransport {
    async fn submit_batch(&self, tasks: &[Task]) -> Result<(), SyncError> {
        let response = self
            .client
            .post(&self.url)
            .json(&SubmitTasksRequest { tasks })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            return Err(SyncError::http_status(
                status.as_u16(),
                format!("POST /tasks failed: {} - {}", status, error_text),
            ));
        }

        Ok(())
    }
}
