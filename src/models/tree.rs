//! Дерево регрессии
//!
//! Общее дерево случайного леса и градиентного бустинга. Вес листа это
//! среднее, прирост разбиения `GL²/nL + GR²/nR - G²/n`.

use std::cmp::Ordering;

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Сколько признаков просматривать в каждом узле (None = все)
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

impl TreeParams {
    pub fn validate(&self) -> Result<()> {
        if self.min_samples_split < 2 {
            return Err(PipelineError::Config(format!(
                "min_samples_split must be at least 2, got {}",
                self.min_samples_split
            )));
        }
        if self.min_samples_leaf == 0 {
            return Err(PipelineError::Config(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    root: TreeNode,
    n_features: usize,
    /// Суммарный прирост по каждому признаку
    gains: Vec<f64>,
}

struct TreeBuilder<'a> {
    x: ArrayView2<'a, f64>,
    y: ArrayView1<'a, f64>,
    params: &'a TreeParams,
    features: &'a [usize],
    rng: &'a mut StdRng,
    gains: Vec<f64>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    /// `indices` могут повторяться (бутстрэп); `features` ограничивает
    /// признаки, доступные этому дереву
    pub fn fit(
        params: &TreeParams,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        indices: Vec<usize>,
        features: &[usize],
        rng: &mut StdRng,
    ) -> Result<Self> {
        params.validate()?;
        if x.nrows() != y.len() {
            return Err(PipelineError::RowMismatch {
                context: "tree targets".to_string(),
                got: y.len(),
                expected: x.nrows(),
            });
        }
        if indices.is_empty() {
            return Err(PipelineError::EmptyTable(
                "Cannot fit a tree on zero samples".to_string(),
            ));
        }

        let mut builder = TreeBuilder {
            x: x.view(),
            y: y.view(),
            params,
            features,
            rng,
            gains: vec![0.0; x.ncols()],
        };
        let root = builder.build_tree(indices, 0);

        Ok(Self {
            root,
            n_features: x.ncols(),
            gains: builder.gains,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }

    /// Нормированная важность признаков (сумма 1, либо нули без разбиений)
    pub fn feature_importances(&self) -> Vec<f64> {
        let total: f64 = self.gains.iter().sum();
        if total > 0.0 {
            self.gains.iter().map(|g| g / total).collect()
        } else {
            vec![0.0; self.gains.len()]
        }
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        x.rows()
            .into_iter()
            .map(|row| self.predict_single(&row))
            .collect()
    }

    pub fn predict_single(&self, sample: &ArrayView1<'_, f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

impl TreeBuilder<'_> {
    fn build_tree(&mut self, indices: Vec<usize>, depth: usize) -> TreeNode {
        let n = indices.len();
        let sum: f64 = indices.iter().map(|&i| self.y[i]).sum();
        let sum_sq: f64 = indices.iter().map(|&i| self.y[i] * self.y[i]).sum();
        let leaf = TreeNode::Leaf {
            value: sum / n as f64,
        };

        let depth_reached = self.params.max_depth.map_or(false, |d| depth >= d);
        if depth_reached
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
        {
            return leaf;
        }

        // Чистый узел: все цели совпадают
        let impurity = sum_sq - sum * sum / n as f64;
        if impurity <= f64::EPSILON * sum_sq {
            return leaf;
        }

        let best = match self.find_best_split(&indices, sum) {
            Some(split) => split,
            None => return leaf,
        };
        self.gains[best.feature] += best.gain;

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.x[[i, best.feature]] <= best.threshold);

        TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.build_tree(left_indices, depth + 1)),
            right: Box::new(self.build_tree(right_indices, depth + 1)),
        }
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        match self.params.max_features {
            Some(k) if k > 0 && k < self.features.len() => {
                let mut chosen = self.features.to_vec();
                chosen.shuffle(&mut *self.rng);
                chosen.truncate(k);
                chosen.sort_unstable();
                chosen
            }
            _ => self.features.to_vec(),
        }
    }

    fn find_best_split(&mut self, indices: &[usize], sum: f64) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf;
        let parent_score = sum * sum / n as f64;

        let mut best: Option<SplitCandidate> = None;
        let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);

        for feature in self.candidate_features() {
            pairs.clear();
            pairs.extend(indices.iter().map(|&i| (self.x[[i, feature]], self.y[i])));
            pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

            let mut left_sum = 0.0;
            for k in 0..n - 1 {
                left_sum += pairs[k].1;
                let n_left = k + 1;
                let n_right = n - n_left;

                // Нельзя разделить одинаковые значения
                if pairs[k].0 == pairs[k + 1].0 {
                    continue;
                }
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let right_sum = sum - left_sum;
                let gain = left_sum * left_sum / n_left as f64
                    + right_sum * right_sum / n_right as f64
                    - parent_score;

                if gain <= 0.0 {
                    continue;
                }
                if best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: midpoint(pairs[k].0, pairs[k + 1].0),
                        gain,
                    });
                }
            }
        }

        best
    }
}

/// Середина между соседними значениями; при потере точности берётся левое
fn midpoint(a: f64, b: f64) -> f64 {
    let mid = a + (b - a) / 2.0;
    if mid >= b {
        a
    } else {
        mid
    }
}
