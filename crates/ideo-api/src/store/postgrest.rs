use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use ideo_core::{CallerIdentity, ReferenceOrder, ReferenceRecord};
use reqwest::{header, RequestBuilder, Response};
use serde_json::Value;

use super::{RecordStore, ReferenceQuery, StoreError};

const USAGE_TABLE: &str = "idea_usage";
const FEED_TABLE: &str = "ideo_feed";
const MAX_ERROR_BODY: usize = 512;

/// Record store speaking the PostgREST dialect (Supabase `/rest/v1`).
#[derive(Clone)]
pub struct PostgrestStore {
    client: reqwest::Client,
    base_url: String,
    key: String,
}

impl PostgrestStore {
    pub fn new(base_url: &str, key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        if self.key.is_empty() {
            return request;
        }
        request.header("apikey", &self.key).bearer_auth(&self.key)
    }
}

impl std::fmt::Debug for PostgrestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestStore")
            .field("base_url", &self.base_url)
            .field("has_key", &!self.key.is_empty())
            .finish()
    }
}

async fn ensure_success(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Total from a `Content-Range` header such as `0-24/57` or `*/0`.
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

fn select_columns(query: &ReferenceQuery) -> String {
    match query.label_column.as_deref() {
        Some(label) if !label.is_empty() => format!("title,{label}"),
        _ => "title".to_string(),
    }
}

/// Rows without a usable title are dropped; a non-array payload is malformed.
fn decode_references(
    payload: Value,
    label_column: Option<&str>,
) -> Result<Vec<ReferenceRecord>, StoreError> {
    let Value::Array(rows) = payload else {
        return Err(StoreError::Malformed("expected a JSON array of rows".to_string()));
    };
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(title) = row.get("title").and_then(Value::as_str).map(str::trim) else {
            tracing::debug!(?row, "skipping reference row without title");
            continue;
        };
        if title.is_empty() {
            continue;
        }
        let label = label_column
            .and_then(|column| row.get(column))
            .and_then(|value| match value {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
        records.push(ReferenceRecord {
            title: title.to_string(),
            label,
        });
    }
    Ok(records)
}

#[async_trait]
impl RecordStore for PostgrestStore {
    async fn count_usage(
        &self,
        caller: &CallerIdentity,
        since: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let request = self
            .client
            .head(self.table_url(USAGE_TABLE))
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{caller}")),
                (
                    "timestamp",
                    format!("gte.{}", since.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ),
            ])
            .header("Prefer", "count=exact");
        let response = ensure_success(self.authorized(request).send().await?).await?;

        let range = response
            .headers()
            .get(header::CONTENT_RANGE)
            .ok_or_else(|| StoreError::Malformed("missing Content-Range header".to_string()))?
            .to_str()
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        parse_content_range(range)
            .ok_or_else(|| StoreError::Malformed(format!("unexpected Content-Range: {range}")))
    }

    async fn fetch_references(
        &self,
        caller: &CallerIdentity,
        query: &ReferenceQuery,
    ) -> Result<Vec<ReferenceRecord>, StoreError> {
        let mut params = vec![
            ("select", select_columns(query)),
            ("user_id", format!("eq.{caller}")),
            ("limit", query.limit.to_string()),
        ];
        if query.order == ReferenceOrder::ViewsDesc {
            params.push(("order", "views.desc.nullslast".to_string()));
        }

        let request = self.client.get(self.table_url(FEED_TABLE)).query(&params);
        let response = ensure_success(self.authorized(request).send().await?).await?;
        let payload: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        decode_references(payload, query.label_column.as_deref())
    }

    async fn insert_usage(&self, caller: &CallerIdentity) -> Result<(), StoreError> {
        let request = self
            .client
            .post(self.table_url(USAGE_TABLE))
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ "user_id": caller.as_str() }));
        ensure_success(self.authorized(request).send().await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_content_range("0-24/57"), Some(57));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("*/*"), None);
        assert_eq!(parse_content_range("garbage"), None);
    }

    #[test]
    fn select_includes_label_column_when_configured() {
        let mut query = ReferenceQuery {
            limit: 25,
            order: ReferenceOrder::Store,
            label_column: None,
        };
        assert_eq!(select_columns(&query), "title");
        query.label_column = Some("channel".to_string());
        assert_eq!(select_columns(&query), "title,channel");
    }

    #[test]
    fn decodes_rows_in_store_order_and_skips_untitled() {
        let payload = json!([
            { "title": "A", "channel": "Chaîne 1" },
            { "title": null },
            { "title": "  " },
            { "title": "B", "channel": 42 },
            { "views": 3 }
        ]);
        let records = decode_references(payload, Some("channel")).unwrap();
        assert_eq!(
            records,
            vec![
                ReferenceRecord {
                    title: "A".to_string(),
                    label: Some("Chaîne 1".to_string())
                },
                ReferenceRecord {
                    title: "B".to_string(),
                    label: Some("42".to_string())
                },
            ]
        );
    }

    #[test]
    fn non_array_payload_is_malformed() {
        let err = decode_references(json!({ "message": "oops" }), None).unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[test]
    fn debug_hides_key() {
        let store =
            PostgrestStore::new("https://db.example.co/", "service-key", Duration::from_secs(1))
                .unwrap();
        let out = format!("{store:?}");
        assert!(!out.contains("service-key"));
        assert!(out.contains("https://db.example.co\""));
    }
}
