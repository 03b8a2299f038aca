//! Градиентный бустинг деревьев для квадратичной функции потерь

use linfa::traits::{Fit, PredictInplace};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use super::{check_training_data, sample_rows, RatingDataset};
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientBoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Доля строк для каждого дерева (1.0 = все строки)
    pub subsample: f64,
    pub seed: u64,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            seed: 0,
        }
    }
}

impl GradientBoostingParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(PipelineError::Config(
                "n_estimators must be positive".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(PipelineError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(PipelineError::Config(format!(
                "subsample must be in (0, 1], got {}",
                self.subsample
            )));
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: Some(self.max_depth),
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            ..TreeParams::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    init: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl GradientBoosting {
    pub fn fit_arrays(
        params: &GradientBoostingParams,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<Self> {
        params.validate()?;
        check_training_data(&x, &y)?;

        let init = y.mean().unwrap_or(0.0);
        let tree_params = params.tree_params();
        let features: Vec<usize> = (0..x.ncols()).collect();
        let mut rng = StdRng::seed_from_u64(params.seed);

        let mut current = Array1::from_elem(y.len(), init);
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            // Антиградиент квадратичной потери это остатки
            let residuals = &y - &current;
            let indices = sample_rows(y.len(), params.subsample, &mut rng);
            let tree = RegressionTree::fit(
                &tree_params,
                x,
                residuals.view(),
                indices,
                &features,
                &mut rng,
            )?;
            current.scaled_add(params.learning_rate, &tree.predict(x));
            trees.push(tree);
        }

        Ok(Self {
            init,
            learning_rate: params.learning_rate,
            trees,
            n_features: x.ncols(),
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

impl Fit<Array2<f64>, Array1<f64>, PipelineError> for GradientBoostingParams {
    type Object = GradientBoosting;

    fn fit(&self, dataset: &RatingDataset) -> Result<GradientBoosting> {
        GradientBoosting::fit_arrays(self, dataset.records().view(), dataset.targets().view())
    }
}

impl PredictInplace<Array2<f64>, Array1<f64>> for GradientBoosting {
    fn predict_inplace(&self, x: &Array2<f64>, y: &mut Array1<f64>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );
        assert_eq!(x.ncols(), self.n_features, "Feature count mismatch");

        y.fill(self.init);
        for tree in &self.trees {
            y.scaled_add(self.learning_rate, &tree.predict(x.view()));
        }
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
        let x = Array2::from_shape_fn((40, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 3) as f64 });
        let y = x.column(0).mapv(|v| if v < 20.0 { 60.0 } else { 80.0 });
        DatasetBase::new(x, y)
    }

    fn mae(model: &GradientBoosting, data: &RatingDataset) -> f64 {
        let pred: Array1<f64> = model.predict(data.records());
        (&pred - data.targets()).mapv(f64::abs).mean().unwrap()
    }

    #[test]
    fn test_more_stages_fit_better() {
        let data = dataset();
        let few = GradientBoostingParams {
            n_estimators: 2,
            ..GradientBoostingParams::default()
        }
        .fit(&data)
        .unwrap();
        let many = GradientBoostingParams {
            n_estimators: 100,
            ..GradientBoostingParams::default()
        }
        .fit(&data)
        .unwrap();

        assert_eq!(many.n_trees(), 100);
        assert!(mae(&many, &data) < mae(&few, &data));
        assert!(mae(&many, &data) < 0.1);
    }

    #[test]
    fn test_subsample_is_reproducible() {
        let data = dataset();
        let params = GradientBoostingParams {
            n_estimators: 10,
            subsample: 0.5,
            seed: 15,
            ..GradientBoostingParams::default()
        };
        assert_eq!(params.fit(&data).unwrap(), params.fit(&data).unwrap());
    }

    #[test]
    fn test_invalid_params_are_rejected() {
        let data = dataset();
        let bad_rate = GradientBoostingParams {
            learning_rate: 0.0,
            ..GradientBoostingParams::default()
        };
        assert!(matches!(bad_rate.fit(&data), Err(PipelineError::Config(_))));

        let bad_subsample = GradientBoostingParams {
            subsample: 1.5,
            ..GradientBoostingParams::default()
        };
        assert!(matches!(bad_subsample.fit(&data), Err(PipelineError::Config(_))));
    }
}
