//! Обучение и настройка трёх семейств моделей

use linfa::traits::{Fit, Predict};
use ndarray::Array1;

use super::grid_search::GridSearch;
use super::metrics::mean_absolute_error;
use crate::config::{GridConfig, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::models::{FittedModel, Hyperparams, ModelFamily, RatingDataset};

/// Настроенная модель одного семейства
#[derive(Debug, Clone)]
pub struct CandidateModel {
    pub family: ModelFamily,
    pub hyperparams: Hyperparams,
    pub model: FittedModel,
    pub cv_score: f64,
    pub baseline_mae: f64,
    pub test_mae: f64,
    /// Предсказания на отложенной выборке, в порядке её строк
    pub test_predictions: Array1<f64>,
}

pub struct ModelTrainer {
    grids: GridConfig,
    search: GridSearch,
}

impl ModelTrainer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            grids: config.grids.clone(),
            search: GridSearch::new(config.cv_folds),
        }
    }

    /// Семейства обучаются в фиксированном порядке ModelFamily::ALL
    pub fn train_all(&self, train: &RatingDataset, test: &RatingDataset) -> Result<Vec<CandidateModel>> {
        ModelFamily::ALL
            .iter()
            .map(|&family| self.train_family(family, train, test))
            .collect()
    }

    pub fn train_family(
        &self,
        family: ModelFamily,
        train: &RatingDataset,
        test: &RatingDataset,
    ) -> Result<CandidateModel> {
        let (_, baseline_mae) = fit_and_score(&Hyperparams::default_for(family), train, test)?;
        tracing::info!("{}: baseline test MAE {:.4}", family, baseline_mae);

        let grid = self.grids.candidates(family);
        let outcome = self.search.search(&grid, train)?;

        let (model, test_mae) = fit_and_score(&outcome.best_params, train, test)?;
        let test_predictions: Array1<f64> = model.predict(test.records());
        tracing::info!(
            "{}: best CV score {:.4} ({}), test MAE {:.4}",
            family,
            outcome.best_score,
            outcome.best_params,
            test_mae
        );

        Ok(CandidateModel {
            family,
            hyperparams: outcome.best_params,
            model,
            cv_score: outcome.best_score,
            baseline_mae,
            test_mae,
            test_predictions,
        })
    }
}

/// Обучение на train и MAE на test
fn fit_and_score(
    params: &Hyperparams,
    train: &RatingDataset,
    test: &RatingDataset,
) -> Result<(FittedModel, f64)> {
    let model = params.fit(train)?;
    let pred: Array1<f64> = model.predict(test.records());
    if pred.iter().any(|p| !p.is_finite()) {
        return Err(PipelineError::Numerical(format!(
            "{} produced non-finite predictions",
            params.family()
        )));
    }
    let mae = mean_absolute_error(test.targets().view(), pred.view())?;
    Ok((model, mae))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoostingGrid, ForestGrid};
    use crate::training::split::train_test_split;
    use linfa::DatasetBase;
    use ndarray::Array2;

    fn small_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.cv_folds = 3;
        config.grids.random_forest = ForestGrid {
            n_estimators: vec![5],
            max_depth: vec![3, 6],
            min_samples_split: vec![2],
            min_samples_leaf: vec![1],
            bootstrap: vec![true],
            seed: vec![0],
        };
        let boosting = BoostingGrid {
            n_estimators: vec![5, 10],
            max_depth: vec![2],
            seed: vec![0],
        };
        config.grids.gradient_boosting = boosting.clone();
        config.grids.newton_boosting = boosting;
        config
    }

    #[test]
    fn test_trains_every_family_in_order() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| ((i * (j + 1)) % 17) as f64);
        let y = x.column(0).mapv(|v| 50.0 + v);
        let (train, test) = train_test_split(&DatasetBase::new(x, y), 0.2, 42).unwrap();

        let trainer = ModelTrainer::new(&small_config());
        let candidates = trainer.train_all(&train, &test).unwrap();

        let families: Vec<ModelFamily> = candidates.iter().map(|c| c.family).collect();
        assert_eq!(families, ModelFamily::ALL.to_vec());
        for candidate in &candidates {
            assert_eq!(candidate.hyperparams.family(), candidate.family);
            assert_eq!(candidate.model.family(), candidate.family);
            assert!(candidate.test_mae.is_finite() && candidate.test_mae >= 0.0);
            assert!(candidate.baseline_mae.is_finite());
            assert_eq!(candidate.test_predictions.len(), test.targets().len());
        }
    }
}
