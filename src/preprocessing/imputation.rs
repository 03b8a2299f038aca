//! Заполнение пропусков
//!
//! Числовые столбцы заполняются средним по наблюдаемым значениям той же таблицы,
//! категориальные протягиваются вперёд. Ведущие пропуски категориальных столбцов
//! остаются пропусками.

use polars::prelude::*;

use super::table::{column_kind, ColumnKind, FeatureTable, RawTable};
use crate::error::{PipelineError, Result};

/// Категориальные столбцы после протягивания значений
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalTable {
    names: Vec<String>,
    columns: Vec<Vec<Option<String>>>,
    n_rows: usize,
}

impl CategoricalTable {
    pub fn new(names: Vec<String>, columns: Vec<Vec<Option<String>>>, n_rows: usize) -> Self {
        Self {
            names,
            columns,
            n_rows,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn columns(&self) -> &[Vec<Option<String>>] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn column(&self, name: &str) -> Option<&[Option<String>]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }
}

pub struct Imputer;

impl Imputer {
    /// Разделение на числовую и категориальную части с заполнением пропусков
    pub fn impute(table: &RawTable) -> Result<(FeatureTable, CategoricalTable)> {
        let n_rows = table.n_rows();
        let mut numeric = Vec::new();
        let mut cat_names = Vec::new();
        let mut cat_columns = Vec::new();
        let mut filled = 0usize;

        for column in table.columns() {
            let name = column.name().to_string();
            match column_kind(column) {
                Some(ColumnKind::Numeric) => match Self::mean_fill(column)? {
                    Some(values) => {
                        filled += column.null_count();
                        numeric.push((name, values));
                    }
                    None => {
                        tracing::warn!("Column `{}` has no observed values, dropping it", name);
                    }
                },
                Some(ColumnKind::Categorical) => {
                    cat_columns.push(Self::forward_fill(column)?);
                    cat_names.push(name);
                }
                None => return Err(PipelineError::NonNumericColumn(name)),
            }
        }

        tracing::info!(
            "Imputed {} numeric cells across {} numeric columns; {} categorical columns forward-filled",
            filled,
            numeric.len(),
            cat_names.len()
        );

        let numeric = FeatureTable::from_columns(numeric, n_rows)?;
        Ok((numeric, CategoricalTable::new(cat_names, cat_columns, n_rows)))
    }

    /// Заполнение средним; None, если в столбце нет ни одного значения
    pub fn mean_fill(column: &Column) -> Result<Option<Vec<f64>>> {
        if column.null_count() == column.len() {
            return Ok(None);
        }
        let filled = column
            .as_materialized_series()
            .fill_null(FillNullStrategy::Mean)?;
        let values = filled
            .f64()?
            .into_iter()
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| {
                PipelineError::Numerical(format!(
                    "Column `{}` still has missing values after mean fill",
                    column.name()
                ))
            })?;
        Ok(Some(values))
    }

    /// Протягивание последнего наблюдённого значения вперёд
    pub fn forward_fill(column: &Column) -> Result<Vec<Option<String>>> {
        let filled = column
            .as_materialized_series()
            .fill_null(FillNullStrategy::Forward(None))?;
        Ok(filled
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect())
    }
}
