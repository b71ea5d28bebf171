//! The job trigger: enumerates the input bucket and fans one Split message
//! per input object out to the Splitter topic.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use observability_deps::tracing::info;
use serde::{Deserialize, Serialize};

use bucket_store::BucketStore;
use data_types::{SplitRequest, ATTR_OUTPUT_BUCKET};
use message_bus::{topics, BusMessage, MessageBus};

/// Body of the trigger endpoint's JSON response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartResponse {
    /// Mirror of the HTTP status code.
    #[serde(rename = "responseCode")]
    pub response_code: u16,
    /// Human-readable outcome.
    pub message: String,
}

impl StartResponse {
    fn new(response_code: u16, message: impl Into<String>) -> Self {
        Self {
            response_code,
            message: message.into(),
        }
    }
}

/// Accepts a job request naming an input and an output bucket, and starts
/// the pipeline by publishing one Split message per `.txt` object found in
/// the input bucket.
#[derive(Debug)]
pub struct Starter {
    store: Arc<dyn BucketStore>,
    bus: Arc<dyn MessageBus>,
}

impl Starter {
    /// Create a starter over the given storage and bus clients.
    pub fn new(store: Arc<dyn BucketStore>, bus: Arc<dyn MessageBus>) -> Self {
        Self { store, bus }
    }

    /// Handle one job request. All outcomes, including failures, are
    /// reported through the returned response; the HTTP layer maps
    /// `response_code` onto the status line.
    pub async fn start(
        &self,
        input_bucket: Option<&str>,
        output_bucket: Option<&str>,
    ) -> StartResponse {
        let input_bucket = match input_bucket.filter(|b| !b.is_empty()) {
            Some(b) => b,
            None => {
                return StartResponse::new(
                    400,
                    "No input bucket name provided, please provide one using the query \
                     parameter 'input-bucket'",
                )
            }
        };
        let output_bucket = match output_bucket.filter(|b| !b.is_empty()) {
            Some(b) => b,
            None => {
                return StartResponse::new(
                    400,
                    "No output bucket name provided, please provide one using the query \
                     parameter 'output-bucket'",
                )
            }
        };

        let files = match self.store.list_objects(input_bucket).await {
            Ok(files) => files,
            Err(bucket_store::Error::BucketNotFound { .. }) => {
                return StartResponse::new(400, "Storage bucket doesn't exist or isn't accessible")
            }
            Err(e) => return StartResponse::new(500, e.to_string()),
        };
        let files: Vec<_> = files
            .into_iter()
            .filter(|f| f.ends_with(".txt"))
            .collect();
        if files.is_empty() {
            return StartResponse::new(
                400,
                format!("No files found in input bucket: {input_bucket}"),
            );
        }

        info!(
            input_bucket,
            output_bucket,
            files = files.len(),
            "starting MapReduce job"
        );

        let attributes =
            BTreeMap::from([(ATTR_OUTPUT_BUCKET.to_string(), output_bucket.to_string())]);
        let publishes = files.iter().map(|file| {
            let request = SplitRequest {
                bucket_name: input_bucket.to_string(),
                file_name: file.clone(),
            };
            let attributes = attributes.clone();
            async move {
                let payload = serde_json::to_vec(&request).map_err(|e| e.to_string())?;
                self.bus
                    .publish(topics::SPLITTER, BusMessage::new(payload, attributes))
                    .await
                    .map_err(|e| e.to_string())
            }
        });
        if let Err(e) = try_join_all(publishes).await {
            return StartResponse::new(500, e);
        }

        StartResponse::new(
            200,
            format!(
                "MapReduce started successfully - results will be stored in: {output_bucket}"
            ),
        )
    }
}
