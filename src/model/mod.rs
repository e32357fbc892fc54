pub mod model_metadata;
pub mod model_storage;
pub mod config;

pub use model_metadata::ModelMetadata;
pub use model_storage::{save_model_with_metadata, load_metadata, load_model_with_metadata, print_metadata_info};
pub use config::{AppConfig, DeviceType, ModelSettings, TrainingSettings, CanvasSettings};
