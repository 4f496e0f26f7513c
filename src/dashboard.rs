use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::DashboardConfig;
use crate::controller::Controller;
use crate::data::Dataset;
use crate::error::{InvalidSelectionError, SchemaError};

/// Process-wide entry: one immutable dataset, any number of sessions.
///
/// Each session gets its own selection and sinks; only the dataset is
/// shared.
pub struct Dashboard {
    dataset: Arc<Dataset>,
    config: DashboardConfig,
    next_session: AtomicU64,
}

impl Dashboard {
    pub fn new(dataset: Dataset, config: DashboardConfig) -> Self {
        Self {
            dataset: Arc::new(dataset),
            config,
            next_session: AtomicU64::new(1),
        }
    }

    /// Load `config.data_path`. Schema problems are fatal here.
    pub fn open(config: DashboardConfig) -> Result<Self, SchemaError> {
        let dataset = Dataset::load_path(Path::new(&config.data_path))?;
        Ok(Self::new(dataset, config))
    }

    /// A fresh controller. Subscribe observers, then call
    /// [`Controller::initial_pass`].
    pub fn open_session(&self) -> Result<Controller, InvalidSelectionError> {
        let id = self.next_session.fetch_add(1, Ordering::SeqCst);
        Controller::new(id, Arc::clone(&self.dataset), &self.config)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::PassOutcome;
    use crate::data::DailyRow;
    use chrono::NaiveDate;

    #[test]
    fn test_sessions_are_independent() {
        let date = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        let ds = Dataset::from_daily(vec![
            DailyRow::cases(date, "Aceh", Some(1)),
            DailyRow::cases(date, "Bali", Some(2)),
        ])
        .unwrap();
        let dash = Dashboard::new(ds, DashboardConfig::default());

        let mut a = dash.open_session().unwrap();
        let mut b = dash.open_session().unwrap();
        assert_ne!(a.session_id(), b.session_id());
        a.initial_pass();
        b.initial_pass();

        assert_eq!(b.on_region_change("Bali"), Ok(PassOutcome::Updated { generation: 2 }));
        assert_eq!(a.selection().region, "Aceh");
        assert_eq!(a.sinks().generation(), 1);
        assert_eq!(b.sinks().selection().unwrap().region, "Bali");
    }

    #[test]
    fn test_empty_dataset_has_no_session() {
        let dash = Dashboard::new(Dataset::from_daily(vec![]).unwrap(), DashboardConfig::default());
        assert_eq!(dash.open_session().err(), Some(InvalidSelectionError::NoData));
    }
}
