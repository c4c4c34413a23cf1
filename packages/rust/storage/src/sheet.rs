//! REST spreadsheet client (Sheety-style JSON endpoint).
//!
//! `GET <endpoint>` returns `{ "<collection>": [ {column: value, ...}, ... ] }`.
//! `PUT <endpoint>` takes a list of `{ "<collection>": { "content": ... } }`
//! objects, one per row, in row order.

use std::time::Duration;

use reqwest::Client;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument};

use prospector_shared::{CONTENT_COLUMN, ProspectorError, Result, SheetConfig, TargetRecord};

use crate::row::{Outputs, record_from_cells};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Acknowledgement for one accepted `PUT` batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReceipt {
    /// Zero-based batch number.
    pub index: usize,
    /// Rows carried by this batch.
    pub rows: usize,
    pub status: u16,
}

/// Reads target rows from, and writes scraped content back to, the sheet.
#[derive(Clone)]
pub struct SheetClient {
    client: Client,
    endpoint: String,
    collection: String,
    url_column: String,
    batch_size: usize,
}

impl SheetClient {
    pub fn new(endpoint: impl Into<String>, config: &SheetConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProspectorError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            collection: config.collection.clone(),
            url_column: config.url_column.clone(),
            batch_size: config.update_batch_size.max(1),
        })
    }

    /// Fetch every row of the collection as a record, in sheet order.
    #[instrument(skip_all, fields(collection = %self.collection))]
    pub async fn load(&self) -> Result<Vec<TargetRecord>> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| ProspectorError::Network(format!("sheet request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProspectorError::Network(format!(
                "sheet returned HTTP {}",
                status.as_u16()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ProspectorError::parse(format!("sheet response is not JSON: {e}")))?;

        let rows = payload
            .get(&self.collection)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ProspectorError::parse(format!(
                    "sheet response has no `{}` array",
                    self.collection
                ))
            })?;

        let mut records = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let Some(object) = row.as_object() else {
                return Err(ProspectorError::parse(format!(
                    "sheet row {index} is not an object"
                )));
            };
            // The sheet is input only: content pushed back by an earlier run is
            // not a reason to skip the row.
            let record = record_from_cells(&self.url_column, index, Outputs::Ignore, cells(object));
            if let Some(record) = record {
                records.push(record);
            }
        }

        info!(rows = rows.len(), records = records.len(), "loaded sheet");
        Ok(records)
    }

    /// Write each record's `content` cell back, in batches.
    ///
    /// Batches are sent in order and are not rolled back: on failure the
    /// error reports how many batches the sheet had already accepted.
    #[instrument(skip_all, fields(records = records.len(), batch_size = self.batch_size))]
    pub async fn push_content(&self, records: &[TargetRecord]) -> Result<Vec<BatchReceipt>> {
        let total = records.len().div_ceil(self.batch_size);
        let mut receipts = Vec::with_capacity(total);

        for (index, batch) in records.chunks(self.batch_size).enumerate() {
            let body: Vec<Value> = batch
                .iter()
                .map(|record| {
                    json!({ self.collection.as_str(): { CONTENT_COLUMN: record.raw_content.as_cell() } })
                })
                .collect();

            let outcome = self.client.put(&self.endpoint).json(&body).send().await;
            let status = match outcome {
                Ok(response) if response.status().is_success() => response.status().as_u16(),
                Ok(response) => {
                    return Err(batch_failed(
                        index,
                        total,
                        format!("HTTP {}", response.status().as_u16()),
                    ));
                }
                Err(e) => return Err(batch_failed(index, total, e.to_string())),
            };

            debug!(batch = index + 1, total, rows = batch.len(), "sheet batch accepted");
            receipts.push(BatchReceipt {
                index,
                rows: batch.len(),
                status,
            });
        }

        info!(batches = receipts.len(), "sheet content updated");
        Ok(receipts)
    }
}

fn batch_failed(index: usize, total: usize, reason: String) -> ProspectorError {
    ProspectorError::Storage(format!(
        "sheet update failed at batch {} of {total} ({reason}); accepted batches: {index}",
        index + 1
    ))
}

/// Flatten a JSON row into string cells; scalars are stringified, null is empty.
fn cells(object: &Map<String, Value>) -> Vec<(String, String)> {
    object
        .iter()
        .map(|(column, value)| {
            let cell = match value {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (column.clone(), cell)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use prospector_shared::{Field, RecordState};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SheetClient {
        let config = SheetConfig {
            update_batch_size: 10,
            ..SheetConfig::default()
        };
        SheetClient::new(format!("{}/sheet", server.uri()), &config).unwrap()
    }

    #[tokio::test]
    async fn load_maps_rows_in_order() {
        let server = MockServer::start().await;
        let payload = json!({
            "targetCompanyData": [
                { "id": 2, "companywebsite": "acme.com", "industry": "manufacturing" },
                { "id": 3, "companywebsite": "", "industry": "retail" },
                { "id": 4, "companywebsite": "globex.com", "content": "N/A", "notes": null },
                { "id": 5, "companywebsite": "initech.com", "content": "Initech sells TPS reports" }
            ]
        });
        Mock::given(method("GET"))
            .and(path("/sheet"))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload))
            .mount(&server)
            .await;

        let records = client(&server).load().await.unwrap();

        let urls: Vec<&str> = records.iter().map(|r| r.website_url.as_str()).collect();
        assert_eq!(urls, ["acme.com", "globex.com", "initech.com"]);
        assert_eq!(
            records[0].extra,
            vec![
                ("id".to_string(), "2".to_string()),
                ("industry".to_string(), "manufacturing".to_string()),
            ]
        );
        assert!(records[1].extra.contains(&("notes".to_string(), String::new())));
        for record in &records {
            assert_eq!(record.state(), RecordState::Untried);
        }
    }

    #[tokio::test]
    async fn content_pushed_by_an_earlier_run_does_not_mark_rows_done() {
        let server = MockServer::start().await;
        let payload = json!({
            "targetCompanyData": [
                {
                    "id": 2,
                    "companywebsite": "initech.com",
                    "content": "Initech sells TPS reports",
                    "response1": "stale summary"
                }
            ]
        });
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload))
            .mount(&server)
            .await;

        let records = client(&server).load().await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].raw_content, Field::Empty);
        assert_eq!(records[0].summary, Field::Empty);
        assert!(!records[0].is_attempted());
        assert_eq!(records[0].extra, vec![("id".to_string(), "2".to_string())]);
    }

    #[tokio::test]
    async fn load_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server).load().await.unwrap_err();
        assert!(matches!(err, ProspectorError::Network(_)));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn load_rejects_missing_collection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "other": [] })))
            .mount(&server)
            .await;

        let err = client(&server).load().await.unwrap_err();
        assert!(matches!(err, ProspectorError::Parse { .. }));
    }

    #[tokio::test]
    async fn push_sends_content_in_batches() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/sheet"))
            .respond_with(ResponseTemplate::new(200))
            .expect(3)
            .mount(&server)
            .await;

        let records: Vec<TargetRecord> = (0..25)
            .map(|i| {
                let mut record = TargetRecord::new(format!("site{i}.test"));
                record.raw_content = if i == 0 {
                    Field::Unresolved
                } else {
                    Field::Text(format!("page {i}"))
                };
                record
            })
            .collect();

        let receipts = client(&server).push_content(&records).await.unwrap();

        let sizes: Vec<usize> = receipts.iter().map(|r| r.rows).collect();
        assert_eq!(sizes, [10, 10, 5]);

        let requests = server.received_requests().await.unwrap();
        let first: Vec<Value> = requests[0].body_json().unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(first[0], json!({ "targetCompanyData": { "content": "N/A" } }));
        assert_eq!(first[1], json!({ "targetCompanyData": { "content": "page 1" } }));

        let last: Vec<Value> = requests[2].body_json().unwrap();
        assert_eq!(last[4], json!({ "targetCompanyData": { "content": "page 24" } }));
    }

    #[tokio::test]
    async fn push_failure_reports_accepted_batches() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let records: Vec<TargetRecord> = (0..15)
            .map(|i| TargetRecord::new(format!("site{i}.test")))
            .collect();

        let err = client(&server).push_content(&records).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("batch 2 of 2"), "{message}");
        assert!(message.contains("HTTP 500"), "{message}");
        assert!(message.contains("accepted batches: 1"), "{message}");
    }

    #[tokio::test]
    async fn push_of_nothing_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let receipts = client(&server).push_content(&[]).await.unwrap();
        assert!(receipts.is_empty());
    }
}
