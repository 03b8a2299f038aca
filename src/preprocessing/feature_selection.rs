//! Ранжирование признаков по важности и отбор

use ndarray::Array1;

use super::normalization::{fit_transform, ScalerOrigin};
use super::table::FeatureTable;
use crate::config::RankingConfig;
use crate::error::{PipelineError, Result};
use crate::models::forest::{ForestParams, RandomForest};
use crate::types::{FeatureImportanceRanking, SelectedFeatureSet};

pub struct FeatureRanker {
    config: RankingConfig,
}

impl FeatureRanker {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    /// Важность каждого признака по вспомогательному случайному лесу
    pub fn rank(&self, features: &FeatureTable, target: &Array1<f64>) -> Result<FeatureImportanceRanking> {
        if features.n_columns() == 0 {
            return Err(PipelineError::InsufficientFeatures {
                required: self.config.selected_count,
                found: 0,
            });
        }

        let scaled;
        let input = if self.config.standardize {
            scaled = fit_transform(features, ScalerOrigin::Primary)?.0;
            &scaled
        } else {
            features
        };

        let params = ForestParams {
            n_estimators: self.config.n_trees,
            seed: self.config.seed,
            ..ForestParams::default()
        };
        let forest = RandomForest::fit_arrays(&params, input.values().view(), target.view())?;
        let ranking = FeatureImportanceRanking::new(input.names(), forest.feature_importances())?;

        for entry in ranking.head(10) {
            tracing::debug!("  {:<28} {:.4}", entry.name, entry.importance);
        }
        Ok(ranking)
    }

    /// Первые selected_count признаков рейтинга без исключённых
    pub fn select(&self, ranking: &FeatureImportanceRanking) -> Result<SelectedFeatureSet> {
        let eligible: Vec<String> = ranking
            .entries()
            .iter()
            .filter(|e| !self.config.excluded_features.contains(&e.name))
            .map(|e| e.name.clone())
            .collect();

        if eligible.len() < self.config.selected_count {
            return Err(PipelineError::InsufficientFeatures {
                required: self.config.selected_count,
                found: eligible.len(),
            });
        }

        let names: Vec<String> = eligible.into_iter().take(self.config.selected_count).collect();
        tracing::info!("Selected features: {:?}", names);
        SelectedFeatureSet::new(names)
    }

    pub fn rank_and_select(
        &self,
        features: &FeatureTable,
        target: &Array1<f64>,
    ) -> Result<(FeatureImportanceRanking, SelectedFeatureSet)> {
        let ranking = self.rank(features, target)?;
        let selected = self.select(&ranking)?;
        Ok((ranking, selected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn config() -> RankingConfig {
        RankingConfig {
            n_trees: 20,
            ..RankingConfig::default()
        }
    }

    /// Семь признаков; цель зависит от a и b, dob сильно коррелирует с целью
    fn table() -> (FeatureTable, Array1<f64>) {
        let names: Vec<String> = ["a", "b", "dob", "c", "d", "e", "f"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let values = Array2::from_shape_fn((50, 7), |(i, j)| match j {
            0 => i as f64,
            1 => ((i * 3) % 7) as f64,
            2 => (i as f64) * 2.0 + 1.0,
            _ => ((i * (j + 5)) % 11) as f64,
        });
        let target = values
            .rows()
            .into_iter()
            .map(|r| 3.0 * r[0] + r[1])
            .collect::<Array1<f64>>();
        (FeatureTable::new(names, values).unwrap(), target)
    }

    #[test]
    fn test_importances_sum_to_one() {
        let (features, target) = table();
        let ranking = FeatureRanker::new(config()).rank(&features, &target).unwrap();
        assert_eq!(ranking.len(), 7);
        let total: f64 = ranking.entries().iter().map(|e| e.importance).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(ranking
            .entries()
            .windows(2)
            .all(|w| w[0].importance >= w[1].importance));
    }

    #[test]
    fn test_selection_has_five_and_skips_excluded() {
        let (features, target) = table();
        let ranker = FeatureRanker::new(config());
        let (_, selected) = ranker.rank_and_select(&features, &target).unwrap();
        assert_eq!(selected.len(), 5);
        assert!(!selected.names().contains(&"dob".to_string()));
    }

    #[test]
    fn test_too_few_eligible_features() {
        let names: Vec<String> = ["a", "dob", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let ranking = FeatureImportanceRanking::new(&names, &[0.3, 0.3, 0.2, 0.1, 0.1]).unwrap();
        match FeatureRanker::new(config()).select(&ranking) {
            Err(PipelineError::InsufficientFeatures { required, found }) => {
                assert_eq!((required, found), (5, 4));
            }
            other => panic!("expected insufficient features, got {:?}", other),
        }
    }

    #[test]
    fn test_constant_candidate_fails_standardization() {
        let (features, target) = table();
        let mut values = features.values().clone();
        values.column_mut(3).fill(4.0);
        let flat = FeatureTable::new(features.names().to_vec(), values).unwrap();
        assert!(matches!(
            FeatureRanker::new(config()).rank(&flat, &target),
            Err(PipelineError::ZeroVariance(name)) if name == "c"
        ));
    }
}
