//! Кодирование категориальных признаков целыми числами
//!
//! Коды плотные и следуют отсортированному порядку различных значений столбца.
//! Оставшийся пропуск считается отдельной категорией и идёт первым.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::imputation::CategoricalTable;
use super::table::FeatureTable;
use crate::error::{PipelineError, Result};

/// Словарь значение → код для одного столбца
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnEncoding {
    pub column: String,
    /// Код значения равен его индексу
    pub classes: Vec<Option<String>>,
}

impl ColumnEncoding {
    pub fn fit(column: &str, values: &[Option<String>]) -> Self {
        let classes: BTreeSet<Option<&str>> = values.iter().map(|v| v.as_deref()).collect();
        Self {
            column: column.to_string(),
            classes: classes.into_iter().map(|v| v.map(str::to_string)).collect(),
        }
    }

    pub fn code(&self, value: Option<&str>) -> Option<usize> {
        self.classes
            .binary_search_by(|class| class.as_deref().cmp(&value))
            .ok()
    }

    pub fn encode(&self, values: &[Option<String>]) -> Result<Vec<f64>> {
        values
            .iter()
            .map(|v| {
                self.code(v.as_deref())
                    .map(|c| c as f64)
                    .ok_or_else(|| PipelineError::UnseenCategory {
                        column: self.column.clone(),
                        value: v.clone(),
                    })
            })
            .collect()
    }
}

/// Словари для всех категориальных столбцов таблицы
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoding {
    pub columns: Vec<ColumnEncoding>,
}

impl CategoryEncoding {
    /// Применение ранее обученных словарей к другой таблице
    pub fn transform(&self, table: &CategoricalTable) -> Result<FeatureTable> {
        let columns = self
            .columns
            .iter()
            .map(|encoding| {
                let values = table
                    .column(&encoding.column)
                    .ok_or_else(|| PipelineError::MissingColumn(encoding.column.clone()))?;
                Ok((encoding.column.clone(), encoding.encode(values)?))
            })
            .collect::<Result<Vec<_>>>()?;
        FeatureTable::from_columns(columns, table.n_rows())
    }
}

pub struct CategoryEncoder;

impl CategoryEncoder {
    /// Обучение и применение за один проход; словари возвращаются вызывающему
    pub fn fit_transform(table: &CategoricalTable) -> Result<(FeatureTable, CategoryEncoding)> {
        let encoding = CategoryEncoding {
            columns: table
                .names()
                .iter()
                .zip(table.columns())
                .map(|(name, values)| ColumnEncoding::fit(name, values))
                .collect(),
        };
        let encoded = encoding.transform(table)?;
        Ok((encoded, encoding))
    }
}
