//! Конфигурация конвейера обучения
//!
//! Значения по умолчанию совпадают с исходным экспериментом на данных FIFA 21/22.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::models::forest::ForestParams;
use crate::models::gradient_boosting::GradientBoostingParams;
use crate::models::newton_boosting::NewtonBoostingParams;
use crate::models::{Hyperparams, ModelFamily};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Доля пропусков, выше которой столбец удаляется
    pub missing_threshold: f64,
    pub target_column: String,
    pub cv_folds: usize,
    pub secondary_scaler: SecondaryScalerPolicy,
    pub ranking: RankingConfig,
    pub split: SplitConfig,
    pub grids: GridConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub n_trees: usize,
    pub seed: u64,
    /// Стандартизировать все кандидаты перед оценкой важности
    pub standardize: bool,
    pub selected_count: usize,
    /// Признаки, которые никогда не отбираются (dob дублирует age)
    pub excluded_features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub test_fraction: f64,
    pub seed: u64,
}

/// Какой скейлер применяется ко второму набору данных (и сохраняется)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondaryScalerPolicy {
    /// Новый скейлер, обученный на втором наборе
    Refit,
    /// Скейлер, обученный на основном наборе
    ReuseTraining,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub random_forest: ForestGrid,
    pub gradient_boosting: BoostingGrid,
    pub newton_boosting: BoostingGrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<usize>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
    pub bootstrap: Vec<bool>,
    pub seed: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<usize>,
    pub seed: Vec<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            missing_threshold: 0.3,
            target_column: "overall".to_string(),
            cv_folds: 5,
            secondary_scaler: SecondaryScalerPolicy::Refit,
            ranking: RankingConfig::default(),
            split: SplitConfig::default(),
            grids: GridConfig::default(),
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            seed: 0,
            standardize: true,
            selected_count: 5,
            excluded_features: vec!["dob".to_string()],
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            random_forest: ForestGrid::default(),
            gradient_boosting: BoostingGrid::default(),
            newton_boosting: BoostingGrid::default(),
        }
    }
}

impl Default for ForestGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200],
            max_depth: vec![10, 20, 30],
            min_samples_split: vec![2, 5],
            min_samples_leaf: vec![1, 2],
            bootstrap: vec![true],
            seed: vec![0, 45],
        }
    }
}

impl Default for BoostingGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![30, 50, 100, 120],
            max_depth: vec![2, 5, 10, 12],
            seed: vec![0, 2, 15, 45],
        }
    }
}

impl ForestGrid {
    /// Декартово произведение; последний параметр меняется быстрее всех
    pub fn expand(&self) -> Vec<ForestParams> {
        let mut out = Vec::new();
        for &n_estimators in &self.n_estimators {
            for &max_depth in &self.max_depth {
                for &min_samples_split in &self.min_samples_split {
                    for &min_samples_leaf in &self.min_samples_leaf {
                        for &bootstrap in &self.bootstrap {
                            for &seed in &self.seed {
                                out.push(ForestParams {
                                    n_estimators,
                                    max_depth: Some(max_depth),
                                    min_samples_split,
                                    min_samples_leaf,
                                    bootstrap,
                                    seed,
                                    ..ForestParams::default()
                                });
                            }
                        }
                    }
                }
            }
        }
        out
    }
}

impl BoostingGrid {
    fn combinations(&self) -> Vec<(usize, usize, u64)> {
        let mut out = Vec::new();
        for &n in &self.n_estimators {
            for &depth in &self.max_depth {
                for &seed in &self.seed {
                    out.push((n, depth, seed));
                }
            }
        }
        out
    }

    pub fn expand_gradient(&self) -> Vec<GradientBoostingParams> {
        self.combinations()
            .into_iter()
            .map(|(n_estimators, max_depth, seed)| GradientBoostingParams {
                n_estimators,
                max_depth,
                seed,
                ..GradientBoostingParams::default()
            })
            .collect()
    }

    pub fn expand_newton(&self) -> Vec<NewtonBoostingParams> {
        self.combinations()
            .into_iter()
            .map(|(n_estimators, max_depth, seed)| NewtonBoostingParams {
                n_estimators,
                max_depth,
                seed,
                ..NewtonBoostingParams::default()
            })
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.n_estimators.is_empty() || self.max_depth.is_empty() || self.seed.is_empty()
    }
}

impl GridConfig {
    /// Перечисление сетки для одного семейства в детерминированном порядке
    pub fn candidates(&self, family: ModelFamily) -> Vec<Hyperparams> {
        match family {
            ModelFamily::RandomForest => self
                .random_forest
                .expand()
                .into_iter()
                .map(Hyperparams::RandomForest)
                .collect(),
            ModelFamily::GradientBoosting => self
                .gradient_boosting
                .expand_gradient()
                .into_iter()
                .map(Hyperparams::GradientBoosting)
                .collect(),
            ModelFamily::NewtonBoosting => self
                .newton_boosting
                .expand_newton()
                .into_iter()
                .map(Hyperparams::NewtonBoosting)
                .collect(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.missing_threshold) {
            return Err(PipelineError::Config(format!(
                "missing_threshold must be within [0, 1], got {}",
                self.missing_threshold
            )));
        }
        if !(self.split.test_fraction > 0.0 && self.split.test_fraction < 1.0) {
            return Err(PipelineError::Config(format!(
                "split.test_fraction must be within (0, 1), got {}",
                self.split.test_fraction
            )));
        }
        if self.cv_folds < 2 {
            return Err(PipelineError::Config(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.ranking.n_trees == 0 || self.ranking.selected_count == 0 {
            return Err(PipelineError::Config(
                "ranking.n_trees and ranking.selected_count must be positive".to_string(),
            ));
        }
        let forest = &self.grids.random_forest;
        if forest.n_estimators.is_empty()
            || forest.max_depth.is_empty()
            || forest.min_samples_split.is_empty()
            || forest.min_samples_leaf.is_empty()
            || forest.bootstrap.is_empty()
            || forest.seed.is_empty()
        {
            return Err(PipelineError::Config("grids.random_forest has an empty axis".to_string()));
        }
        if self.grids.gradient_boosting.is_empty() || self.grids.newton_boosting.is_empty() {
            return Err(PipelineError::Config("boosting grid has an empty axis".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grid_sizes() {
        let grids = GridConfig::default();
        assert_eq!(grids.candidates(ModelFamily::RandomForest).len(), 48);
        assert_eq!(grids.candidates(ModelFamily::GradientBoosting).len(), 64);
        assert_eq!(grids.candidates(ModelFamily::NewtonBoosting).len(), 64);
    }

    #[test]
    fn test_grid_order_last_axis_fastest() {
        let grid = BoostingGrid {
            n_estimators: vec![10, 20],
            max_depth: vec![3],
            seed: vec![1, 2],
        };
        let expanded = grid.expand_gradient();
        let pairs: Vec<(usize, u64)> = expanded.iter().map(|p| (p.n_estimators, p.seed)).collect();
        assert_eq!(pairs, vec![(10, 1), (10, 2), (20, 1), (20, 2)]);
    }

    #[test]
    fn test_toml_roundtrip_with_partial_file() {
        let config: PipelineConfig = toml::from_str(
            r#"
            missing_threshold = 0.5
            secondary_scaler = "reuse_training"

            [ranking]
            n_trees = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.missing_threshold, 0.5);
        assert_eq!(config.secondary_scaler, SecondaryScalerPolicy::ReuseTraining);
        assert_eq!(config.ranking.n_trees, 10);
        assert_eq!(config.ranking.excluded_features, vec!["dob".to_string()]);
        assert_eq!(config.target_column, "overall");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sample_file_matches_defaults() {
        let config = PipelineConfig::load(concat!(env!("CARGO_MANIFEST_DIR"), "/pipeline.toml")).unwrap();
        let defaults = PipelineConfig::default();
        assert_eq!(config.grids.candidates(ModelFamily::RandomForest), defaults.grids.candidates(ModelFamily::RandomForest));
        assert_eq!(config.ranking.excluded_features, defaults.ranking.excluded_features);
        assert_eq!(config.split.seed, 42);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        let path = path.to_str().unwrap();

        let mut config = PipelineConfig::default();
        config.cv_folds = 3;
        config.save(path).unwrap();
        let loaded = PipelineConfig::load(path).unwrap();
        assert_eq!(loaded.cv_folds, 3);
        assert_eq!(loaded.secondary_scaler, SecondaryScalerPolicy::Refit);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.cv_folds = 1;
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));

        let mut config = PipelineConfig::default();
        config.split.test_fraction = 1.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.grids.newton_boosting.seed.clear();
        assert!(config.validate().is_err());
    }
}
