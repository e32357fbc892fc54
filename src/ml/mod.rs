pub mod ml_model;
pub mod training;
pub mod inference;

pub use ml_model::{DigitNet, ModelConfig};
pub use training::{train_model, evaluate, resolve_output_path, DigitBatch, DigitBatcher};
pub use inference::DigitClassifier;
