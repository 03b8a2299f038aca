//! Случайный лес: бэггинг деревьев регрессии

use linfa::traits::{Fit, PredictInplace};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use super::{check_training_data, tree_seed, RatingDataset};
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: Option<usize>,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 0,
        }
    }
}

impl ForestParams {
    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
            ..TreeParams::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    pub fn fit_arrays(
        params: &ForestParams,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<Self> {
        check_training_data(&x, &y)?;
        if params.n_estimators == 0 {
            return Err(PipelineError::Config(
                "n_estimators must be positive".to_string(),
            ));
        }

        let n_samples = x.nrows();
        let features: Vec<usize> = (0..x.ncols()).collect();
        let tree_params = params.tree_params();

        // У каждого дерева своё зерно, поэтому порядок потоков не влияет на результат
        let trees = (0..params.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(tree_seed(params.seed, t));
                let indices: Vec<usize> = if params.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                RegressionTree::fit(&tree_params, x, y, indices, &features, &mut rng)
            })
            .collect::<Result<Vec<_>>>()?;

        let feature_importances = average_importances(&trees, x.ncols());

        Ok(Self {
            trees,
            n_features: x.ncols(),
            feature_importances,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Важность признаков по снижению ошибки, сумма равна 1
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

/// Среднее нормированных важностей деревьев. Если ни одно дерево не сделало
/// разбиения, важность распределяется равномерно.
fn average_importances(trees: &[RegressionTree], n_features: usize) -> Vec<f64> {
    let mut total = vec![0.0; n_features];
    for tree in trees {
        for (acc, value) in total.iter_mut().zip(tree.feature_importances()) {
            *acc += value;
        }
    }

    let sum: f64 = total.iter().sum();
    if sum > 0.0 {
        total.iter().map(|v| v / sum).collect()
    } else {
        vec![1.0 / n_features.max(1) as f64; n_features]
    }
}

impl Fit<Array2<f64>, Array1<f64>, PipelineError> for ForestParams {
    type Object = RandomForest;

    fn fit(&self, dataset: &RatingDataset) -> Result<RandomForest> {
        RandomForest::fit_arrays(self, dataset.records().view(), dataset.targets().view())
    }
}

impl PredictInplace<Array2<f64>, Array1<f64>> for RandomForest {
    fn predict_inplace(&self, x: &Array2<f64>, y: &mut Array1<f64>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );
        assert_eq!(x.ncols(), self.n_features, "Feature count mismatch");

        y.fill(0.0);
        for tree in &self.trees {
            *y += &tree.predict(x.view());
        }
        *y /= self.trees.len() as f64;
    }

    fn default_target(&self, x: &Array2<f64>) -> Array1<f64> {
        Array1::zeros(x.nrows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linfa::traits::Predict;
    use linfa::DatasetBase;

    fn dataset() -> RatingDataset {
        let x = Array2::from_shape_fn((60, 3), |(i, j)| match j {
            0 => i as f64,
            1 => ((i * 7) % 11) as f64,
            _ => 1.0,
        });
        let y = x.column(0).mapv(|v| 2.0 * v + 3.0);
        DatasetBase::new(x, y)
    }

    #[test]
    fn test_forest_fits_linear_signal() {
        let data = dataset();
        let params = ForestParams {
            n_estimators: 20,
            ..ForestParams::default()
        };
        let forest = params.fit(&data).unwrap();
        assert_eq!(forest.n_trees(), 20);

        let pred: Array1<f64> = forest.predict(data.records());
        let mae = (&pred - data.targets()).mapv(f64::abs).mean().unwrap();
        assert!(mae < 5.0, "mae = {}", mae);
    }

    #[test]
    fn test_importances_sum_to_one_and_favor_signal() {
        let data = dataset();
        let forest = ForestParams {
            n_estimators: 10,
            ..ForestParams::default()
        }
        .fit(&data)
        .unwrap();

        let importances = forest.feature_importances();
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(importances.iter().all(|&v| v >= 0.0));
        assert!(importances[0] > importances[1]);
        assert_eq!(importances[2], 0.0);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let data = dataset();
        let params = ForestParams {
            n_estimators: 5,
            seed: 45,
            ..ForestParams::default()
        };
        let a = params.fit(&data).unwrap();
        let b = params.fit(&data).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_trees_is_rejected() {
        let params = ForestParams {
            n_estimators: 0,
            ..ForestParams::default()
        };
        assert!(matches!(params.fit(&dataset()), Err(PipelineError::Config(_))));
    }
}
