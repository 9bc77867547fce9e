//! Parameter store seam
//!
//! Decoders write engineering values through [`ParameterStore`]; presentation
//! code reads them back. The store is an external collaborator, so this crate
//! only defines the interface plus an in-memory implementation.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;

use crate::models::{ParameterId, ParameterMeta, ParameterSnapshot};

/// Write/read interface of the parameter store
pub trait ParameterStore: Send + Sync {
    /// Record the latest imperial and metric values for a parameter
    fn write(&self, id: ParameterId, imperial: f64, metric: f64);

    /// Record that the last frame carried no usable data for a parameter
    fn mark_no_data(&self, _id: ParameterId) {}

    /// Latest state of a parameter, if it is known to the store
    fn read(&self, id: ParameterId) -> Option<ParameterSnapshot>;
}

/// Thread-safe in-memory parameter store
#[derive(Debug, Default)]
pub struct InMemoryParameterStore {
    parameters: RwLock<HashMap<ParameterId, ParameterSnapshot>>,
}

impl InMemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set presentation metadata, keeping any value already stored
    pub fn configure(&self, id: ParameterId, meta: ParameterMeta) {
        let mut params = self.parameters.write();
        params
            .entry(id)
            .and_modify(|snapshot| snapshot.meta = meta.clone())
            .or_insert_with(|| ParameterSnapshot::empty(id, meta));
    }

    /// Number of parameters known to the store
    pub fn len(&self) -> usize {
        self.parameters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All parameters, sorted by id
    pub fn snapshot(&self) -> Vec<ParameterSnapshot> {
        let mut all: Vec<_> = self.parameters.read().values().cloned().collect();
        all.sort_by_key(|p| p.id);
        all
    }
}

impl ParameterStore for InMemoryParameterStore {
    fn write(&self, id: ParameterId, imperial: f64, metric: f64) {
        let mut params = self.parameters.write();
        let entry = params
            .entry(id)
            .or_insert_with(|| ParameterSnapshot::empty(id, ParameterMeta::default()));
        entry.imperial = imperial;
        entry.metric = metric;
        entry.has_data = true;
        entry.updated_at = Some(Utc::now());
    }

    fn mark_no_data(&self, id: ParameterId) {
        let mut params = self.parameters.write();
        let entry = params
            .entry(id)
            .or_insert_with(|| ParameterSnapshot::empty(id, ParameterMeta::default()));
        entry.has_data = false;
        entry.updated_at = Some(Utc::now());
    }

    fn read(&self, id: ParameterId) -> Option<ParameterSnapshot> {
        self.parameters.read().get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DisplayFormat;

    #[test]
    fn test_write_then_read() {
        let store = InMemoryParameterStore::new();
        assert!(store.read(110).is_none());

        store.write(110, 194.0, 90.0);
        let snapshot = store.read(110).unwrap();
        assert_eq!(snapshot.imperial, 194.0);
        assert_eq!(snapshot.metric, 90.0);
        assert!(snapshot.has_data);
        assert!(snapshot.updated_at.is_some());
    }

    #[test]
    fn test_no_data_keeps_last_value() {
        let store = InMemoryParameterStore::new();
        store.write(190, 1800.0, 1800.0);
        store.mark_no_data(190);

        let snapshot = store.read(190).unwrap();
        assert!(!snapshot.has_data);
        assert_eq!(snapshot.imperial, 1800.0);
    }

    #[test]
    fn test_configure_preserves_value() {
        let store = InMemoryParameterStore::new();
        store.write(100, 40.0, 275.0);
        store.configure(
            100,
            ParameterMeta {
                name: Some("Oil Pressure".to_string()),
                format: DisplayFormat {
                    decimals: 0,
                    imperial_unit: Some("psi".to_string()),
                    metric_unit: Some("kPa".to_string()),
                },
                thresholds: Default::default(),
            },
        );

        let snapshot = store.read(100).unwrap();
        assert_eq!(snapshot.imperial, 40.0);
        assert_eq!(snapshot.meta.format.decimals, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_snapshot_sorted() {
        let store = InMemoryParameterStore::new();
        store.write(190, 0.0, 0.0);
        store.write(84, 0.0, 0.0);
        store.write(110, 0.0, 0.0);

        let ids: Vec<_> = store.snapshot().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![84, 110, 190]);
    }
}
