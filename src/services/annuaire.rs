//! School directory API client.
//!
//! Harvests heads of public secondary schools from the national
//! education open-data API. Rows arrive as JSON pages addressed by
//! offset; the dataset reports its own total count up front.

use serde::{Deserialize, Deserializer};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::Result;
use crate::harvest::HarvestSink;
use crate::models::{AnnuaireConfig, Record, School};

/// Filter: public establishments of secondary-school types.
const WHERE_FILTER: &str = r#"statut_public_prive="Public" AND type_etablissement IN ("Lycée", "Collège", "Lycée professionnel", "Lycée polyvalent")"#;

/// Fields requested from the dataset.
const FIELDS: &str = "nom_etablissement,type_etablissement,nom_chef_etablissement,\
                      adresse_1,commune,code_postal,departement,region,telephone,\
                      mail,nombre_eleves";

/// Client for the school directory API.
pub struct AnnuaireClient {
    client: reqwest::Client,
    config: AnnuaireConfig,
}

impl AnnuaireClient {
    /// Create a new API client over the shared HTTP client.
    pub fn new(client: reqwest::Client, config: AnnuaireConfig) -> Self {
        Self { client, config }
    }

    /// Total record count matching the filters. Returns 0 on any
    /// failure; the harvest then runs with an unknown total.
    pub async fn count_total(&self, department: Option<&str>) -> usize {
        let result: Result<ApiPage> = async {
            let response = self
                .client
                .get(&self.config.api_base)
                .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
                .query(&[("where", build_where(department)), ("limit", "1".into())])
                .send()
                .await?
                .error_for_status()?;
            Ok(response.json().await?)
        }
        .await;

        match result {
            Ok(page) => page.total_count as usize,
            Err(error) => {
                warn!("count query failed: {}", error);
                0
            }
        }
    }

    /// Harvest all matching school heads.
    ///
    /// `max_records == 0` means unlimited. Pages are requested in
    /// offset order with a fixed inter-request delay; the loop stops on
    /// a transport error, an empty page, a short page, the cap, or
    /// cooperative cancellation. Collected records are always kept.
    pub async fn run(
        &self,
        department: Option<&str>,
        max_records: usize,
        sink: &dyn HarvestSink,
        cancel: &CancellationToken,
    ) -> Vec<School> {
        let mut total = self.count_total(department).await;
        if max_records > 0 && max_records < total {
            total = max_records;
        }
        sink.progress(
            0,
            total,
            &format!("Total: {total} establishments to fetch"),
        );

        let mut results: Vec<School> = Vec::new();
        let mut offset = 0;

        loop {
            if cancel.is_cancelled() {
                break;
            }
            let Some(limit) = page_limit(self.config.page_size, max_records, results.len())
            else {
                break;
            };

            let page = match self.fetch_page(offset, limit, department).await {
                Ok(page) => page,
                Err(error) => {
                    warn!("API page failed (offset={}): {}", offset, error);
                    break;
                }
            };
            if page.is_empty() {
                break;
            }

            let fetched = page.len();
            offset += fetched;
            sink.records(page.iter().cloned().map(Record::from).collect());
            results.extend(page);
            sink.progress(
                results.len(),
                total,
                &format!("Fetched {}/{} establishments", results.len(), total),
            );

            // A short page means the dataset is exhausted
            if fetched < limit {
                break;
            }

            if self.config.request_delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(
                    self.config.request_delay_ms,
                ))
                .await;
            }
        }

        if !cancel.is_cancelled() {
            sink.progress(
                results.len(),
                results.len(),
                &format!("Harvest complete: {} establishments", results.len()),
            );
        }
        results
    }

    async fn fetch_page(
        &self,
        offset: usize,
        limit: usize,
        department: Option<&str>,
    ) -> Result<Vec<School>> {
        let response = self
            .client
            .get(&self.config.api_base)
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
            .query(&[
                ("select", FIELDS.to_string()),
                ("where", build_where(department)),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
                ("order_by", "departement,nom_etablissement".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let page: ApiPage = response.json().await?;
        Ok(page.results.into_iter().map(School::from).collect())
    }
}

/// Page limit for the next request, `None` once the cap is reached.
fn page_limit(page_size: usize, max_records: usize, collected: usize) -> Option<usize> {
    if max_records == 0 {
        return Some(page_size);
    }
    let remaining = max_records.saturating_sub(collected);
    if remaining == 0 {
        None
    } else {
        Some(page_size.min(remaining))
    }
}

fn build_where(department: Option<&str>) -> String {
    match department {
        Some(department) => {
            let department = department.trim().replace('"', "");
            format!(r#"{WHERE_FILTER} AND departement="{department}""#)
        }
        None => WHERE_FILTER.to_string(),
    }
}

/// Head-of-school title derived from the establishment type.
fn derive_role(school_type: &str) -> &'static str {
    if school_type.trim().to_lowercase().contains("collège") {
        "Principal"
    } else {
        "Proviseur"
    }
}

/// One page of the records endpoint.
#[derive(Debug, Default, Deserialize)]
struct ApiPage {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    results: Vec<ApiRecord>,
}

/// Raw dataset row; every field may be null or absent.
#[derive(Debug, Default, Deserialize)]
struct ApiRecord {
    #[serde(default)]
    nom_etablissement: Option<String>,
    #[serde(default)]
    type_etablissement: Option<String>,
    #[serde(default)]
    nom_chef_etablissement: Option<String>,
    #[serde(default)]
    adresse_1: Option<String>,
    #[serde(default)]
    commune: Option<String>,
    #[serde(default)]
    code_postal: Option<String>,
    #[serde(default)]
    departement: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    telephone: Option<String>,
    #[serde(default)]
    mail: Option<String>,
    #[serde(default, deserialize_with = "de_student_count")]
    nombre_eleves: Option<u32>,
}

/// The headcount field occasionally arrives as a numeric string.
fn de_student_count<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().map(|n| n as u32),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

impl From<ApiRecord> for School {
    fn from(record: ApiRecord) -> Self {
        let school_type = record.type_etablissement.unwrap_or_default();
        School {
            role: derive_role(&school_type).to_string(),
            head_name: record.nom_chef_etablissement.unwrap_or_default(),
            school_name: record.nom_etablissement.unwrap_or_default(),
            school_type,
            address: record.adresse_1.unwrap_or_default(),
            postal_code: record.code_postal.unwrap_or_default(),
            city: record.commune.unwrap_or_default(),
            department: record.departement.unwrap_or_default(),
            region: record.region.unwrap_or_default(),
            phone: record.telephone.unwrap_or_default(),
            email: record.mail.unwrap_or_default(),
            student_count: record.nombre_eleves,
        }
    }
}
