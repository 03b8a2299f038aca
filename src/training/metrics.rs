//! Метрики качества регрессии

use ndarray::ArrayView1;

use crate::error::{PipelineError, Result};

fn check_pair(y_true: &ArrayView1<'_, f64>, y_pred: &ArrayView1<'_, f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::RowMismatch {
            context: "predictions".to_string(),
            got: y_pred.len(),
            expected: y_true.len(),
        });
    }
    if y_true.is_empty() {
        return Err(PipelineError::EmptyTable(
            "Cannot score an empty prediction set".to_string(),
        ));
    }
    Ok(())
}

fn finite(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PipelineError::Numerical(format!("{} is not finite", name)))
    }
}

pub fn mean_absolute_error(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> Result<f64> {
    check_pair(&y_true, &y_pred)?;
    let mae = (&y_true - &y_pred).mapv(f64::abs).sum() / y_true.len() as f64;
    finite("Mean absolute error", mae)
}

pub fn mean_squared_error(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> Result<f64> {
    check_pair(&y_true, &y_pred)?;
    let mse = (&y_true - &y_pred).mapv(|d| d * d).sum() / y_true.len() as f64;
    finite("Mean squared error", mse)
}
