//! Перебор гиперпараметров по сетке с кросс-валидацией

use linfa::traits::{Fit, Predict};
use ndarray::Array1;
use rayon::prelude::*;

use super::metrics::mean_squared_error;
use super::split::{kfold_indices, subset};
use crate::error::{PipelineError, Result};
use crate::models::{Hyperparams, RatingDataset};

/// Средняя по фолдам отрицательная MSE (больше = лучше)
pub fn cross_val_score(params: &Hyperparams, dataset: &RatingDataset, folds: usize) -> Result<f64> {
    let splits = kfold_indices(dataset.records().nrows(), folds)?;
    let mut total = 0.0;
    for (train_rows, valid_rows) in &splits {
        let train = subset(dataset, train_rows);
        let valid = subset(dataset, valid_rows);
        let model = params.fit(&train)?;
        let pred: Array1<f64> = model.predict(valid.records());
        total += mean_squared_error(valid.targets().view(), pred.view())?;
    }
    Ok(-total / splits.len() as f64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridSearchOutcome {
    pub best_params: Hyperparams,
    pub best_score: f64,
    /// Оценка каждой конфигурации в порядке перебора
    pub scores: Vec<f64>,
}

pub struct GridSearch {
    folds: usize,
}

impl GridSearch {
    pub fn new(folds: usize) -> Self {
        Self { folds }
    }

    /// Конфигурации оцениваются параллельно, выбор лучшей детерминирован:
    /// при равных оценках побеждает более ранняя
    pub fn search(&self, candidates: &[Hyperparams], dataset: &RatingDataset) -> Result<GridSearchOutcome> {
        if candidates.is_empty() {
            return Err(PipelineError::Config(
                "Hyperparameter grid is empty".to_string(),
            ));
        }

        let scores = candidates
            .par_iter()
            .map(|params| cross_val_score(params, dataset, self.folds))
            .collect::<Result<Vec<f64>>>()?;

        let mut best = 0;
        for (i, score) in scores.iter().enumerate() {
            if score.is_nan() {
                return Err(PipelineError::Numerical(format!(
                    "Cross-validation score is NaN for {}",
                    candidates[i]
                )));
            }
            if *score > scores[best] {
                best = i;
            }
        }

        tracing::debug!(
            "Grid search over {} configurations: best score {:.4} with {}",
            candidates.len(),
            scores[best],
            candidates[best]
        );

        Ok(GridSearchOutcome {
            best_params: candidates[best].clone(),
            best_score: scores[best],
            scores,
        })
    }
}
