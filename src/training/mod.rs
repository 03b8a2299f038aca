/// Обучение, подбор гиперпараметров и оценка моделей

pub mod evaluation;
pub mod grid_search;
pub mod metrics;
pub mod split;
pub mod trainer;

pub use evaluation::{select_winner, Evaluator, SecondarySet};
pub use grid_search::{cross_val_score, GridSearch, GridSearchOutcome};
pub use metrics::{mean_absolute_error, mean_squared_error};
pub use split::{kfold_indices, train_test_split};
pub use trainer::{CandidateModel, ModelTrainer};
