//! # Elasticsearch Source
//!
//! Wrapper around the Elasticsearch REST API. One index per snapshot.
//!
//! - `GET /_cat/indices/{prefix}*?format=json&h=index` lists snapshots
//! - `POST /{index}/_search` fetches one snapshot's documents, page by
//!   page with `search_after` on `_doc`
//!
//! A snapshot is returned whole or not at all: when fewer documents arrive
//! than the index reported, the fetch fails with `SourceError::Incomplete`.
//!
//! `_index` becomes the record partition and the document's `timestamp`
//! field, when present, its write time.

use super::{SnapshotSource, SourceError};
use chrono::{DateTime, NaiveDateTime};
use pupdates_core::primitives::MAX_RECORDS_PER_SNAPSHOT;
use pupdates_core::{RawRecord, SnapshotId};
use serde::Deserialize;
use serde_json::{Value, json};

/// HTTP client for an Elasticsearch-compatible snapshot store.
#[derive(Clone)]
pub struct ElasticsearchSource {
    http: reqwest::Client,
    base_url: String,
    page_size: u32,
}

impl std::fmt::Debug for ElasticsearchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchSource")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct CatIndex {
    index: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    #[serde(default)]
    total: Option<Total>,
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Total {
    Object { value: u64 },
    Count(u64),
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_index")]
    index: String,
    #[serde(rename = "_source", default)]
    source: Value,
    /// Sort values, the cursor for the next page.
    #[serde(default)]
    sort: Option<Value>,
}

impl ElasticsearchSource {
    /// Create a client for the given base URL (e.g. `http://localhost:9200`).
    pub fn new(base_url: impl Into<String>, page_size: u32) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| SourceError::ParseError(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_size,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.http.request(method, &url)
    }

    /// Send a request and handle connection errors.
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, SourceError> {
        req.send().await.map_err(|e| SourceError::ConnectionFailed {
            endpoint: self.base_url.clone(),
            reason: e.to_string(),
        })
    }

    /// Check status codes and parse JSON.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        resp: reqwest::Response,
        what: &str,
    ) -> Result<T, SourceError> {
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(what.to_string()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited);
        }
        if status.is_server_error() {
            let body = error_body(resp).await;
            return Err(SourceError::ServerError(status.as_u16(), body));
        }
        if !status.is_success() {
            let body = error_body(resp).await;
            return Err(SourceError::Rejected(status.as_u16(), body));
        }
        resp.json::<T>()
            .await
            .map_err(|e| SourceError::ParseError(e.to_string()))
    }
}

impl SnapshotSource for ElasticsearchSource {
    async fn list_snapshot_ids(&self, prefix: &str) -> Result<Vec<String>, SourceError> {
        let path = format!("/_cat/indices/{prefix}*?format=json&h=index");
        let resp = self.send(self.request(reqwest::Method::GET, &path)).await?;
        let indices: Vec<CatIndex> = match self.handle_response(resp, prefix).await {
            Ok(indices) => indices,
            // No index matches the pattern yet.
            Err(SourceError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        Ok(indices.into_iter().map(|i| i.index).collect())
    }

    async fn fetch_records(&self, snapshot: &SnapshotId) -> Result<Vec<RawRecord>, SourceError> {
        let path = format!("/{}/_search", snapshot.as_str());
        let mut pages = PageCollector::new(snapshot, self.page_size);
        let mut cursor: Option<Value> = None;

        loop {
            let mut body = json!({
                "size": self.page_size,
                "query": {"match_all": {}},
                "sort": ["_doc"],
                "track_total_hits": true,
            });
            if let Some(after) = cursor.take() {
                body["search_after"] = after;
            }
            let req = self.request(reqwest::Method::POST, &path).json(&body);
            let resp = self.send(req).await?;
            let page: SearchResponse = self.handle_response(resp, snapshot.as_str()).await?;

            match pages.absorb(page)? {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        pages.finish()
    }
}

/// Accumulates `_search` pages for one snapshot.
#[derive(Debug)]
struct PageCollector {
    snapshot: String,
    page_size: u32,
    expected: Option<u64>,
    records: Vec<RawRecord>,
}

impl PageCollector {
    fn new(snapshot: &SnapshotId, page_size: u32) -> Self {
        Self {
            snapshot: snapshot.to_string(),
            page_size,
            expected: None,
            records: Vec::new(),
        }
    }

    /// Take one page. Returns the cursor for the next page, or `None` when
    /// the last page has been read.
    fn absorb(&mut self, page: SearchResponse) -> Result<Option<Value>, SourceError> {
        if self.expected.is_none() {
            self.expected = page.hits.total.map(|total| match total {
                Total::Object { value } | Total::Count(value) => value,
            });
        }

        let received = page.hits.hits.len();
        let cursor = page.hits.hits.last().and_then(|hit| hit.sort.clone());
        self.records
            .extend(page.hits.hits.into_iter().map(hit_to_record));

        if self.records.len() > MAX_RECORDS_PER_SNAPSHOT {
            return Err(SourceError::ParseError(format!(
                "{} exceeds {} documents",
                self.snapshot, MAX_RECORDS_PER_SNAPSHOT
            )));
        }

        let done = received < self.page_size as usize
            || self
                .expected
                .is_some_and(|expected| self.records.len() as u64 >= expected);
        if done {
            return Ok(None);
        }
        match cursor {
            Some(cursor) => Ok(Some(cursor)),
            None => Err(SourceError::ParseError(format!(
                "{}: full page without sort values",
                self.snapshot
            ))),
        }
    }

    /// All records, or `Incomplete` if fewer arrived than were reported.
    fn finish(self) -> Result<Vec<RawRecord>, SourceError> {
        let received = self.records.len() as u64;
        if let Some(expected) = self.expected.filter(|&expected| received < expected) {
            return Err(SourceError::Incomplete {
                snapshot: self.snapshot,
                expected,
                received,
            });
        }
        Ok(self.records)
    }
}

/// Body of an error response, for the error message.
async fn error_body(resp: reqwest::Response) -> String {
    match resp.text().await {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!("Cannot read error response body: {}", e);
            String::new()
        }
    }
}

fn hit_to_record(hit: Hit) -> RawRecord {
    let written_at = hit
        .source
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(parse_timestamp);
    RawRecord {
        partition: hit.index,
        written_at,
        document: hit.source,
    }
}

/// RFC 3339, or a naive ISO date-time as the scraper writes it.
fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_keep_partition_and_timestamp() {
        let response: SearchResponse = serde_json::from_value(json!({
            "hits": {
                "total": {"value": 1, "relation": "eq"},
                "hits": [{
                    "_index": "animal-humane-20251230-1500",
                    "_id": "abc",
                    "_source": {"id": 5, "name": "Rex", "timestamp": "2025-12-30T15:01:02.123456"}
                }]
            }
        }))
        .expect("parse");

        let records: Vec<_> = response.hits.hits.into_iter().map(hit_to_record).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].partition, "animal-humane-20251230-1500");
        assert_eq!(
            records[0].written_at.map(|t| t.format("%H:%M:%S").to_string()),
            Some("15:01:02".to_string())
        );
        assert_eq!(records[0].document["name"], "Rex");
    }

    fn page(total: u64, ids: &[u64]) -> SearchResponse {
        let hits: Vec<Value> = ids
            .iter()
            .map(|id| {
                json!({
                    "_index": "animal-humane-20251230-1500",
                    "_source": {"id": id},
                    "sort": [id],
                })
            })
            .collect();
        serde_json::from_value(json!({
            "hits": {"total": {"value": total, "relation": "eq"}, "hits": hits}
        }))
        .expect("page")
    }

    fn snapshot() -> SnapshotId {
        SnapshotId::parse("animal-humane-", "animal-humane-20251230-1500").expect("id")
    }

    #[test]
    fn pages_are_followed_until_total_is_reached() {
        let mut pages = PageCollector::new(&snapshot(), 2);

        let cursor = pages.absorb(page(5, &[1, 2])).expect("first");
        assert_eq!(cursor, Some(json!([2])));
        let cursor = pages.absorb(page(5, &[3, 4])).expect("second");
        assert_eq!(cursor, Some(json!([4])));
        assert_eq!(pages.absorb(page(5, &[5])).expect("last"), None);

        let records = pages.finish().expect("complete");
        assert_eq!(records.len(), 5);
    }

    #[test]
    fn short_read_against_larger_total_is_incomplete() {
        let mut pages = PageCollector::new(&snapshot(), 3);
        assert_eq!(pages.absorb(page(10, &[1, 2])).expect("page"), None);

        assert!(matches!(
            pages.finish(),
            Err(SourceError::Incomplete {
                expected: 10,
                received: 2,
                ..
            })
        ));
    }

    #[test]
    fn exact_multiple_of_page_size_stops_at_total() {
        let mut pages = PageCollector::new(&snapshot(), 2);
        assert!(pages.absorb(page(4, &[1, 2])).expect("first").is_some());
        assert_eq!(pages.absorb(page(4, &[3, 4])).expect("second"), None);
        assert_eq!(pages.finish().expect("complete").len(), 4);
    }

    #[test]
    fn timestamp_accepts_offsets_and_rejects_junk() {
        assert!(parse_timestamp("2025-12-30T15:01:02Z").is_some());
        assert!(parse_timestamp("2025-12-30T15:01:02").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    /// Answers one request on a local socket with `response`, then closes.
    async fn serve_once(response: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.expect("read");
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.expect("write");
            socket.shutdown().await.expect("shutdown");
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn server_error_carries_response_body() {
        let url = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 4\r\nConnection: close\r\n\r\nbusy",
        )
        .await;
        let source = ElasticsearchSource::new(url, 100).expect("client");

        let err = source.list_snapshot_ids("animal-humane-").await;
        assert!(matches!(err, Err(SourceError::ServerError(503, ref body)) if body == "busy"));
    }

    #[tokio::test]
    async fn unreadable_error_body_still_maps_status() {
        // The body is cut off well short of its declared length.
        let url = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 100\r\nConnection: close\r\n\r\nbu",
        )
        .await;
        let source = ElasticsearchSource::new(url, 100).expect("client");

        let err = source.list_snapshot_ids("animal-humane-").await;
        assert!(matches!(err, Err(SourceError::ServerError(503, ref body)) if body.is_empty()));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let source = ElasticsearchSource::new("http://localhost:9200/", 100).expect("client");
        assert_eq!(source.base_url, "http://localhost:9200");
    }
}
