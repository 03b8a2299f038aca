//! Нормализация данных

#![allow(non_snake_case)]

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::table::FeatureTable;
use crate::error::{PipelineError, Result};

/// Откуда взяты статистики скейлера
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerOrigin {
    /// Основной набор данных (обучение)
    Primary,
    /// Второй, независимый набор данных (проверка)
    Secondary,
}

/// Обученный стандартизатор: (имя, среднее, std) для каждого признака
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    origin: ScalerOrigin,
    feature_names: Vec<String>,
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl FittedScaler {
    /// std считается по генеральной совокупности (ddof = 0)
    pub fn fit(table: &FeatureTable, origin: ScalerOrigin) -> Result<Self> {
        let X = table.values();
        if X.nrows() == 0 {
            return Err(PipelineError::EmptyTable(
                "Cannot fit scaler on an empty table".to_string(),
            ));
        }

        let mean = X
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::Numerical("Failed to compute mean".to_string()))?;
        let std = X.std_axis(Axis(0), 0.0);

        // Деление на нулевое std запрещено: постоянный столбец это ошибка
        for (j, name) in table.names().iter().enumerate() {
            let tolerance = f64::EPSILON * mean[j].abs().max(1.0) * 16.0;
            if !std[j].is_finite() || std[j] <= tolerance {
                return Err(PipelineError::ZeroVariance(name.clone()));
            }
        }

        Ok(Self {
            origin,
            feature_names: table.names().to_vec(),
            mean: mean.to_vec(),
            std: std.to_vec(),
        })
    }

    pub fn origin(&self) -> ScalerOrigin {
        self.origin
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn std(&self) -> &[f64] {
        &self.std
    }

    /// Столбцы сопоставляются по имени, а не по позиции
    pub fn transform(&self, table: &FeatureTable) -> Result<FeatureTable> {
        let mut got: Vec<&String> = table.names().iter().collect();
        let mut expected: Vec<&String> = self.feature_names.iter().collect();
        got.sort();
        expected.sort();
        if got != expected {
            return Err(PipelineError::FeatureMismatch {
                expected: self.feature_names.clone(),
                got: table.names().to_vec(),
            });
        }

        let aligned = table.select(&self.feature_names)?;
        let scaled = self.transform_array(aligned.values())?;
        FeatureTable::new(self.feature_names.clone(), scaled)
    }

    /// Матрица, столбцы которой уже идут в порядке feature_names
    pub fn transform_array(&self, X: &Array2<f64>) -> Result<Array2<f64>> {
        if X.ncols() != self.feature_names.len() {
            return Err(PipelineError::FeatureMismatch {
                expected: self.feature_names.clone(),
                got: (0..X.ncols()).map(|i| format!("#{}", i)).collect(),
            });
        }

        // Нормализация: (X - mean) / std
        let mut normalized = X.clone();
        for mut row in normalized.rows_mut() {
            for (i, val) in row.iter_mut().enumerate() {
                *val = (*val - self.mean[i]) / self.std[i];
            }
        }

        Ok(normalized)
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Array1<f64>> {
        let X = Array2::from_shape_vec((1, row.len()), row.to_vec())
            .map_err(|e| PipelineError::Numerical(format!("Bad feature vector: {}", e)))?;
        Ok(self.transform_array(&X)?.row(0).to_owned())
    }
}

/// Обучение и применение на одной таблице
pub fn fit_transform(table: &FeatureTable, origin: ScalerOrigin) -> Result<(FeatureTable, FittedScaler)> {
    let scaler = FittedScaler::fit(table, origin)?;
    let scaled = scaler.transform(table)?;
    Ok((scaled, scaler))
}
