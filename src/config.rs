#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub data_path: String,
    /// Region shown first when present in the dataset.
    pub preferred_region: String,
    /// Pseudo-region that sums all others; left out of the ranking.
    pub aggregate_region: String,
    pub manifest_ttl_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_path: "covid_19_indonesia_time_series_all.csv".to_string(),
            preferred_region: "Indonesia".to_string(),
            aggregate_region: "Indonesia".to_string(),
            manifest_ttl_secs: 86_400,
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            data_path: std::env::var("CASEDASH_DATA").unwrap_or(d.data_path),
            preferred_region: std::env::var("PREFERRED_REGION").unwrap_or(d.preferred_region),
            aggregate_region: std::env::var("AGGREGATE_REGION").unwrap_or(d.aggregate_region),
            manifest_ttl_secs: std::env::var("MANIFEST_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.manifest_ttl_secs),
        }
    }
}
