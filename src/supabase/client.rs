//! PostgREST client for the record table.
//!
//! Uses reqwest with the service key in both `apikey` and Bearer headers.
//! Writes ask for `return=representation` so the stored row comes back.

use async_trait::async_trait;
use reqwest::RequestBuilder;

use super::{authed, check, SupabaseConfig};
use crate::error::AppError;
use crate::gateway::RecordGateway;
use crate::records::mapping::to_external_update;
use crate::records::{from_external_row, to_external_row, ExternalRow, Record};

pub struct SupabaseClient {
    client: reqwest::Client,
    base_url: String,
    key: String,
    table: String,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Result<Self, AppError> {
        let (base_url, key) = config.credentials()?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            key,
            table: config.table.clone(),
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn request(&self, req: RequestBuilder) -> RequestBuilder {
        authed(req, &self.key).header("Prefer", "return=representation")
    }

    async fn rows(&self, req: RequestBuilder, what: &str) -> Result<Vec<ExternalRow>, AppError> {
        let resp = self.request(req).send().await?;
        let resp = check(resp, what).await?;
        resp.json::<Vec<ExternalRow>>()
            .await
            .map_err(|e| AppError::Parse(format!("{} response: {}", what, e)))
    }
}

fn id_filter(id: &str) -> [(&'static str, String); 1] {
    [("id", format!("eq.{}", id))]
}

#[async_trait]
impl RecordGateway for SupabaseClient {
    async fn list(&self) -> Result<Vec<Record>, AppError> {
        let rows = self
            .rows(
                self.client
                    .get(self.table_url())
                    .query(&[("select", "*"), ("order", "createdat.desc")]),
                "list records",
            )
            .await?;
        log::info!("Fetched {} records from {}", rows.len(), self.table);
        Ok(rows.iter().map(from_external_row).collect())
    }

    async fn create(&self, record: &Record) -> Result<Record, AppError> {
        let body = vec![to_external_row(record)];
        let rows = self
            .rows(
                self.client.post(self.table_url()).json(&body),
                "create record",
            )
            .await?;
        rows.first()
            .map(from_external_row)
            .ok_or_else(|| AppError::Parse("create returned no row".to_string()))
    }

    async fn update(&self, id: &str, record: &Record) -> Result<Record, AppError> {
        let rows = self
            .rows(
                self.client
                    .patch(self.table_url())
                    .query(&id_filter(id))
                    .json(&to_external_update(&record.input)),
                "update record",
            )
            .await?;
        rows.first()
            .map(from_external_row)
            .ok_or_else(|| AppError::NotFound(format!("record {}", id)))
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let rows = self
            .rows(
                self.client.delete(self.table_url()).query(&id_filter(id)),
                "delete record",
            )
            .await?;
        if rows.is_empty() {
            return Err(AppError::NotFound(format!("record {}", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_url_joins_base_and_table() {
        let client = SupabaseClient::new(&SupabaseConfig {
            url: Some("https://abc.supabase.co/".into()),
            key: Some("k".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.table_url(), "https://abc.supabase.co/rest/v1/sm_records");
    }

    #[test]
    fn unconfigured_client_is_rejected() {
        assert!(matches!(
            SupabaseClient::new(&SupabaseConfig::default()),
            Err(AppError::NotConfigured(_))
        ));
    }

    #[test]
    fn id_filter_uses_postgrest_equality() {
        assert_eq!(id_filter("abc")[0].1, "eq.abc");
    }
}
