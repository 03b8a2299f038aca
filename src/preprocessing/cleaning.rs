//! Удаление столбцов с большой долей пропусков

use super::table::RawTable;
use crate::error::Result;

pub struct Cleaner {
    threshold: f64,
}

impl Cleaner {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Доля пропусков по каждому столбцу
    pub fn missing_fractions(table: &RawTable) -> Vec<(String, f64)> {
        table
            .columns()
            .iter()
            .map(|c| {
                let fraction = if table.n_rows() == 0 {
                    0.0
                } else {
                    c.null_count() as f64 / table.n_rows() as f64
                };
                (c.name().to_string(), fraction)
            })
            .collect()
    }

    /// Столбец на границе порога сохраняется
    pub fn clean(&self, table: &RawTable) -> Result<RawTable> {
        let fractions = Self::missing_fractions(table);
        let dropped: Vec<&str> = fractions
            .iter()
            .filter(|(_, f)| *f > self.threshold)
            .map(|(name, _)| name.as_str())
            .collect();

        if !dropped.is_empty() {
            tracing::info!(
                "Dropping {} columns with more than {:.0}% missing: {:?}",
                dropped.len(),
                self.threshold * 100.0,
                dropped
            );
        }

        table.retain_columns(|c| !dropped.contains(&c.name().as_str()))
    }
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::new(0.3)
    }
}
