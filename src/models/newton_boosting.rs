//! Бустинг второго порядка на библиотеке XGBoost
//!
//! Бустер хранится как сериализованная модель XGBoost и поднимается при
//! каждом предсказании, поэтому `NewtonBoosting` остаётся `Send + Sync`.

use linfa::traits::{Fit, PredictInplace};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use xgboost::parameters::learning::{LearningTaskParametersBuilder, Objective};
use xgboost::parameters::tree::TreeBoosterParametersBuilder;
use xgboost::parameters::{BoosterParametersBuilder, BoosterType, TrainingParametersBuilder};
use xgboost::{Booster, DMatrix};

use super::{check_training_data, RatingDataset};
use crate::error::{PipelineError, Result};

const BOOSTER_FILE: &str = "booster.bin";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonBoostingParams {
    /// Число раундов бустинга
    pub n_estimators: usize,
    /// eta
    pub learning_rate: f64,
    pub max_depth: usize,
    /// lambda
    pub reg_lambda: f64,
    pub gamma: f64,
    pub min_child_weight: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub seed: u64,
}

impl Default for NewtonBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            reg_lambda: 1.0,
            gamma: 0.0,
            min_child_weight: 1.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            seed: 0,
        }
    }
}

impl NewtonBoostingParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 || self.max_depth == 0 {
            return Err(PipelineError::Config(
                "n_estimators and max_depth must be positive".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(PipelineError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        for (name, value) in [
            ("subsample", self.subsample),
            ("colsample_bytree", self.colsample_bytree),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(PipelineError::Config(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.reg_lambda < 0.0 || self.gamma < 0.0 || self.min_child_weight < 0.0 {
            return Err(PipelineError::Config(
                "reg_lambda, gamma and min_child_weight must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    fn booster_params(&self) -> Result<xgboost::parameters::BoosterParameters> {
        let tree_params = TreeBoosterParametersBuilder::default()
            .eta(self.learning_rate as f32)
            .max_depth(self.max_depth as u32)
            .lambda(self.reg_lambda as f32)
            .gamma(self.gamma as f32)
            .min_child_weight(self.min_child_weight as f32)
            .subsample(self.subsample as f32)
            .colsample_bytree(self.colsample_bytree as f32)
            .build()
            .map_err(PipelineError::Config)?;

        let learning_params = LearningTaskParametersBuilder::default()
            .objective(Objective::RegLinear)
            .seed(self.seed)
            .build()
            .map_err(PipelineError::Config)?;

        BoosterParametersBuilder::default()
            .booster_type(BoosterType::Tree(tree_params))
            .learning_params(learning_params)
            .verbose(false)
            .build()
            .map_err(PipelineError::Config)
    }
}

/// Обученный бустер XGBoost в виде байтов его модели
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewtonBoosting {
    booster: Vec<u8>,
    n_rounds: usize,
    n_features: usize,
}

impl NewtonBoosting {
    pub fn fit_arrays(
        params: &NewtonBoostingParams,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<Self> {
        params.validate()?;
        check_training_data(&x, &y)?;

        let mut dtrain = dense_matrix(x)?;
        let labels: Vec<f32> = y.iter().map(|&v| v as f32).collect();
        dtrain.set_labels(&labels)?;

        let booster_params = params.booster_params()?;
        let training_params = TrainingParametersBuilder::default()
            .dtrain(&dtrain)
            .boost_rounds(params.n_estimators as u32)
            .booster_params(booster_params)
            .evaluation_sets(None)
            .build()
            .map_err(PipelineError::Config)?;
        let booster = Booster::train(&training_params)?;

        // XGBoost пишет модель только в файл
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(BOOSTER_FILE);
        booster.save(&path)?;
        let bytes = std::fs::read(&path)?;

        tracing::debug!(
            "Trained XGBoost booster: {} rounds, {} bytes",
            params.n_estimators,
            bytes.len()
        );

        Ok(Self {
            booster: bytes,
            n_rounds: params.n_estimators,
            n_features: x.ncols(),
        })
    }

    pub fn try_predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(PipelineError::Numerical(format!(
                "Booster expects {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        let booster = Booster::load_buffer(&self.booster)?;
        let predictions = booster.predict(&dense_matrix(x)?)?;
        Ok(predictions.into_iter().map(f64::from).collect())
    }

    pub fn n_rounds(&self) -> usize {
        self.n_rounds
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

/// Построчная матрица f32 для XGBoost
fn dense_matrix(x: ArrayView2<'_, f64>) -> Result<DMatrix> {
    let values: Vec<f32> = x.rows().into_iter().flatten().map(|&v| v as f32).collect();
    Ok(DMatrix::from_dense(&values, x.nrows())?)
}

impl Fit<Array2<f64>, Array1<f64>, PipelineError> for NewtonBoostingParams {
    type Object = NewtonBoosting;

    fn fit(&self, dataset: &RatingDataset) -> Result<NewtonBoosting> {
        NewtonBoosting::fit_arrays(self, dataset.records().view(), dataset.targets().view())
    }
}

impl PredictInplace<Array2<f64>, Array1<f64>> for NewtonBoosting {
    fn predict_inplace(&self, x: &Array2<f64>, y: &mut Array1<f64>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );

        // Ошибка XGBoost превращается в NaN; метрики и предсказатель её отклоняют
        match self.try_predict(x.view()) {
            Ok(predictions) => y.assign(&predictions),
            Err(e) => {
                tracing::error!("XGBoost prediction failed: {}", e);
                y.fill(f64::NAN);
            }
        }
    }

    fn default_target(&self, x: &Array2<f64>) -> Array1<f64> {
        Array1::zeros(x.nrows())
    }
}
