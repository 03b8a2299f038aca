/// Модели регрессии рейтинга

pub mod forest;
pub mod gradient_boosting;
pub mod newton_boosting;
pub mod tree;

use std::fmt;

use chrono::{DateTime, Utc};
use linfa::traits::{Fit, PredictInplace};
use linfa::DatasetBase;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub use forest::{ForestParams, RandomForest};
pub use gradient_boosting::{GradientBoosting, GradientBoostingParams};
pub use newton_boosting::{NewtonBoosting, NewtonBoostingParams};

/// Признаки и целевой рейтинг
pub type RatingDataset = DatasetBase<Array2<f64>, Array1<f64>>;

/// Семейства моделей в порядке обучения
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    RandomForest,
    GradientBoosting,
    NewtonBoosting,
}

impl ModelFamily {
    /// Порядок важен: при равных ошибках побеждает более раннее семейство
    pub const ALL: [ModelFamily; 3] = [
        ModelFamily::RandomForest,
        ModelFamily::GradientBoosting,
        ModelFamily::NewtonBoosting,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::GradientBoosting => "gradient_boosting",
            ModelFamily::NewtonBoosting => "newton_boosting",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Гиперпараметры одной модели вместе с её семейством
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Hyperparams {
    RandomForest(ForestParams),
    GradientBoosting(GradientBoostingParams),
    NewtonBoosting(NewtonBoostingParams),
}

impl Hyperparams {
    pub fn family(&self) -> ModelFamily {
        match self {
            Hyperparams::RandomForest(_) => ModelFamily::RandomForest,
            Hyperparams::GradientBoosting(_) => ModelFamily::GradientBoosting,
            Hyperparams::NewtonBoosting(_) => ModelFamily::NewtonBoosting,
        }
    }

    /// Настройки по умолчанию, с которыми считается базовая ошибка
    pub fn default_for(family: ModelFamily) -> Self {
        match family {
            ModelFamily::RandomForest => Hyperparams::RandomForest(ForestParams::default()),
            ModelFamily::GradientBoosting => {
                Hyperparams::GradientBoosting(GradientBoostingParams::default())
            }
            ModelFamily::NewtonBoosting => {
                Hyperparams::NewtonBoosting(NewtonBoostingParams::default())
            }
        }
    }
}

impl fmt::Display for Hyperparams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hyperparams::RandomForest(p) => write!(
                f,
                "n_estimators={} max_depth={:?} min_samples_split={} min_samples_leaf={} bootstrap={} seed={}",
                p.n_estimators, p.max_depth, p.min_samples_split, p.min_samples_leaf, p.bootstrap, p.seed
            ),
            Hyperparams::GradientBoosting(p) => write!(
                f,
                "n_estimators={} max_depth={} learning_rate={} seed={}",
                p.n_estimators, p.max_depth, p.learning_rate, p.seed
            ),
            Hyperparams::NewtonBoosting(p) => write!(
                f,
                "n_estimators={} max_depth={} learning_rate={} reg_lambda={} seed={}",
                p.n_estimators, p.max_depth, p.learning_rate, p.reg_lambda, p.seed
            ),
        }
    }
}

/// Обученная модель любого семейства
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum FittedModel {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    NewtonBoosting(NewtonBoosting),
}

impl FittedModel {
    pub fn family(&self) -> ModelFamily {
        match self {
            FittedModel::RandomForest(_) => ModelFamily::RandomForest,
            FittedModel::GradientBoosting(_) => ModelFamily::GradientBoosting,
            FittedModel::NewtonBoosting(_) => ModelFamily::NewtonBoosting,
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            FittedModel::RandomForest(m) => m.n_features(),
            FittedModel::GradientBoosting(m) => m.n_features(),
            FittedModel::NewtonBoosting(m) => m.n_features(),
        }
    }
}

impl Fit<Array2<f64>, Array1<f64>, PipelineError> for Hyperparams {
    type Object = FittedModel;

    fn fit(&self, dataset: &RatingDataset) -> Result<FittedModel> {
        Ok(match self {
            Hyperparams::RandomForest(p) => FittedModel::RandomForest(p.fit(dataset)?),
            Hyperparams::GradientBoosting(p) => FittedModel::GradientBoosting(p.fit(dataset)?),
            Hyperparams::NewtonBoosting(p) => FittedModel::NewtonBoosting(p.fit(dataset)?),
        })
    }
}

impl PredictInplace<Array2<f64>, Array1<f64>> for FittedModel {
    fn predict_inplace(&self, x: &Array2<f64>, y: &mut Array1<f64>) {
        match self {
            FittedModel::RandomForest(m) => m.predict_inplace(x, y),
            FittedModel::GradientBoosting(m) => m.predict_inplace(x, y),
            FittedModel::NewtonBoosting(m) => m.predict_inplace(x, y),
        }
    }

    fn default_target(&self, x: &Array2<f64>) -> Array1<f64> {
        Array1::zeros(x.nrows())
    }
}

/// Сохраняемая модель-победитель
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub hyperparams: Hyperparams,
    /// Порядок столбцов, на которых обучена модель
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub model: FittedModel,
}

impl TrainedModel {
    pub fn family(&self) -> ModelFamily {
        self.model.family()
    }
}

/// Общая проверка обучающих данных
pub(crate) fn check_training_data(x: &ArrayView2<'_, f64>, y: &ArrayView1<'_, f64>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(PipelineError::EmptyTable(format!(
            "Cannot fit a model on a {}x{} matrix",
            x.nrows(),
            x.ncols()
        )));
    }
    if x.nrows() != y.len() {
        return Err(PipelineError::RowMismatch {
            context: "training targets".to_string(),
            got: y.len(),
            expected: x.nrows(),
        });
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(PipelineError::Numerical(
            "Training data contains non-finite values".to_string(),
        ));
    }
    Ok(())
}

/// Зерно дерева `index` внутри ансамбля с зерном `seed` (splitmix64)
pub(crate) fn tree_seed(seed: u64, index: usize) -> u64 {
    let mut z = seed
        .wrapping_add(0x9E37_79B9_7F4A_7C15)
        .wrapping_add((index as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Выборка строк без возвращения; при fraction = 1 берутся все строки
pub(crate) fn sample_rows(n: usize, fraction: f64, rng: &mut StdRng) -> Vec<usize> {
    if fraction >= 1.0 {
        return (0..n).collect();
    }
    let k = ((fraction * n as f64).round() as usize).clamp(1, n);
    let mut rows = rand::seq::index::sample(rng, n, k).into_vec();
    rows.sort_unstable();
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use linfa::traits::Predict;
    use ndarray::array;
    use rand::SeedableRng;

    fn dataset() -> RatingDataset {
        let x = Array2::from_shape_fn((24, 2), |(i, j)| (i * (j + 1)) as f64);
        let y = x.column(0).mapv(|v| v + 50.0);
        DatasetBase::new(x, y)
    }

    #[test]
    fn test_every_family_fits_through_hyperparams() {
        let data = dataset();
        for family in ModelFamily::ALL {
            let params = match Hyperparams::default_for(family) {
                Hyperparams::RandomForest(p) => Hyperparams::RandomForest(ForestParams {
                    n_estimators: 5,
                    ..p
                }),
                Hyperparams::GradientBoosting(p) => {
                    Hyperparams::GradientBoosting(GradientBoostingParams {
                        n_estimators: 5,
                        ..p
                    })
                }
                Hyperparams::NewtonBoosting(p) => Hyperparams::NewtonBoosting(NewtonBoostingParams {
                    n_estimators: 5,
                    ..p
                }),
            };
            let model = params.fit(&data).unwrap();
            assert_eq!(model.family(), family);
            assert_eq!(model.n_features(), 2);

            let pred: Array1<f64> = model.predict(data.records());
            assert_eq!(pred.len(), 24);
            assert!(pred.iter().all(|p| p.is_finite()));
        }
    }

    #[test]
    fn test_fitted_model_json_roundtrip() {
        let params = Hyperparams::GradientBoosting(GradientBoostingParams {
            n_estimators: 3,
            ..GradientBoostingParams::default()
        });
        let model = params.fit(&dataset()).unwrap();
        let trained = TrainedModel {
            hyperparams: params,
            feature_names: vec!["a".into(), "b".into()],
            trained_at: Utc::now(),
            model,
        };

        let json = serde_json::to_string(&trained).unwrap();
        assert!(json.contains("\"family\":\"gradient_boosting\""));
        let loaded: TrainedModel = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, trained);
        assert_eq!(loaded.family(), ModelFamily::GradientBoosting);
    }

    #[test]
    fn test_non_finite_training_data_is_rejected() {
        let data = DatasetBase::new(array![[1.0], [f64::NAN]], array![1.0, 2.0]);
        let result = Hyperparams::default_for(ModelFamily::RandomForest).fit(&data);
        assert!(matches!(result, Err(PipelineError::Numerical(_))));
    }

    #[test]
    fn test_sample_rows_and_tree_seeds() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(sample_rows(5, 1.0, &mut rng), vec![0, 1, 2, 3, 4]);

        let rows = sample_rows(10, 0.5, &mut rng);
        assert_eq!(rows.len(), 5);
        assert!(rows.windows(2).all(|w| w[0] < w[1]));

        assert_ne!(tree_seed(0, 0), tree_seed(0, 1));
        assert_ne!(tree_seed(0, 1), tree_seed(1, 0));
        assert_eq!(tree_seed(45, 3), tree_seed(45, 3));
    }
}
