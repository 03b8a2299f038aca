//! Онлайн-предсказание рейтинга по сохранённым артефактам

use std::path::Path;

use linfa::traits::Predict;
use ndarray::{Array1, Array2};
use serde_json::Value;

use crate::artifacts::ArtifactStore;
use crate::error::{PipelineError, Result};
use crate::models::TrainedModel;
use crate::preprocessing::FittedScaler;
use crate::training::mean_absolute_error;
use crate::types::{PredictionResponse, ReferenceRow};

/// Только чтение: после загрузки ничего не меняется
#[derive(Debug, Clone)]
pub struct Predictor {
    model: TrainedModel,
    scaler: FittedScaler,
    mean_absolute_error: f64,
}

impl Predictor {
    pub fn new(model: TrainedModel, scaler: FittedScaler, reference: &[ReferenceRow]) -> Result<Self> {
        if model.feature_names != scaler.feature_names() {
            return Err(PipelineError::FeatureMismatch {
                expected: scaler.feature_names().to_vec(),
                got: model.feature_names.clone(),
            });
        }
        if model.model.n_features() != model.feature_names.len() {
            return Err(PipelineError::FeatureMismatch {
                expected: model.feature_names.clone(),
                got: (0..model.model.n_features()).map(|i| format!("#{}", i)).collect(),
            });
        }

        let y_test: Array1<f64> = reference.iter().map(|r| r.y_test).collect();
        let y_pred: Array1<f64> = reference.iter().map(|r| r.y_pred).collect();
        let mae = mean_absolute_error(y_test.view(), y_pred.view())?;

        Ok(Self {
            model,
            scaler,
            mean_absolute_error: mae,
        })
    }

    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let store = ArtifactStore::new(dir);
        let predictor = Self::new(
            store.load_model()?,
            store.load_scaler()?,
            &store.load_reference()?,
        )?;
        tracing::info!(
            "Loaded {} model over {:?} (reference MAE {:.4})",
            predictor.model.family(),
            predictor.feature_names(),
            predictor.mean_absolute_error
        );
        Ok(predictor)
    }

    pub fn feature_names(&self) -> &[String] {
        self.scaler.feature_names()
    }

    pub fn mean_absolute_error(&self) -> f64 {
        self.mean_absolute_error
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    /// Запрос это JSON-объект ровно с признаками скейлера и числовыми значениями
    pub fn predict_json(&self, request: &Value) -> Result<PredictionResponse> {
        let fields = request
            .as_object()
            .ok_or_else(|| PipelineError::InvalidRequest("Request must be a JSON object".to_string()))?;

        let missing: Vec<&str> = self
            .feature_names()
            .iter()
            .filter(|name| !fields.contains_key(name.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::InvalidRequest(format!(
                "Missing fields: {}",
                missing.join(", ")
            )));
        }

        let unexpected: Vec<&str> = fields
            .keys()
            .filter(|key| !self.feature_names().contains(*key))
            .map(String::as_str)
            .collect();
        if !unexpected.is_empty() {
            return Err(PipelineError::InvalidRequest(format!(
                "Unexpected fields: {}",
                unexpected.join(", ")
            )));
        }

        let values = self
            .feature_names()
            .iter()
            .map(|name| match fields.get(name).and_then(Value::as_f64) {
                Some(v) if v.is_finite() => Ok(v),
                _ => Err(PipelineError::InvalidRequest(format!(
                    "Field `{}` must be a finite number",
                    name
                ))),
            })
            .collect::<Result<Vec<f64>>>()?;

        self.predict_values(&values)
    }

    /// Значения в порядке feature_names
    pub fn predict_values(&self, values: &[f64]) -> Result<PredictionResponse> {
        let scaled = self.scaler.transform_row(values)?;
        let n = scaled.len();
        let records = Array2::from_shape_vec((1, n), scaled.to_vec())
            .map_err(|e| PipelineError::Numerical(format!("Bad feature vector: {}", e)))?;
        let prediction: Array1<f64> = self.model.model.predict(&records);

        let prediction = prediction[0];
        if !prediction.is_finite() {
            return Err(PipelineError::Numerical(
                "Model produced a non-finite prediction".to_string(),
            ));
        }
        Ok(PredictionResponse {
            prediction,
            mean_absolute_error: self.mean_absolute_error,
        })
    }
}
