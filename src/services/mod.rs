pub mod classifier;
pub mod detection;
pub mod remote;
