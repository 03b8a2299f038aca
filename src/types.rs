/// Типы данных конвейера рейтинга

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::models::{Hyperparams, ModelFamily};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub name: String,
    pub importance: f64,
}

/// Признаки по убыванию важности; при равенстве сохраняется исходный порядок
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportanceRanking {
    entries: Vec<FeatureImportance>,
}

impl FeatureImportanceRanking {
    pub fn new(names: &[String], importances: &[f64]) -> Result<Self> {
        if names.len() != importances.len() {
            return Err(PipelineError::RowMismatch {
                context: "feature importances".to_string(),
                got: importances.len(),
                expected: names.len(),
            });
        }
        if importances.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::Numerical(
                "Feature importances contain non-finite values".to_string(),
            ));
        }

        let mut entries: Vec<FeatureImportance> = names
            .iter()
            .zip(importances)
            .map(|(name, &importance)| FeatureImportance {
                name: name.clone(),
                importance,
            })
            .collect();
        // sort_by устойчива
        entries.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[FeatureImportance] {
        &self.entries
    }

    pub fn head(&self, n: usize) -> &[FeatureImportance] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Упорядоченный набор признаков, общий для обучения и предсказания
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedFeatureSet {
    names: Vec<String>,
}

impl SelectedFeatureSet {
    pub fn new(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(PipelineError::InsufficientFeatures {
                required: 1,
                found: 0,
            });
        }
        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Результаты одного семейства моделей
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub family: ModelFamily,
    pub hyperparams: Hyperparams,
    /// Средняя по фолдам отрицательная MSE лучшей конфигурации
    pub cv_score: f64,
    /// MAE на отложенной выборке с настройками по умолчанию
    pub baseline_mae: f64,
    pub test_mae: f64,
    pub secondary_mae: f64,
}

/// Строка справочной таблицы: истинный рейтинг и предсказание
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRow {
    pub y_test: f64,
    pub y_pred: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub scores: Vec<CandidateScore>,
    pub winner: ModelFamily,
    pub reference: Vec<ReferenceRow>,
}

impl EvaluationReport {
    pub fn winner_score(&self) -> Option<&CandidateScore> {
        self.scores.iter().find(|s| s.family == self.winner)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: f64,
    pub mean_absolute_error: f64,
}
