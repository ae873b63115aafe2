pub mod interpret;
pub mod model_manager;
pub mod preprocess;
