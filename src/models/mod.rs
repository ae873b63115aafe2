pub mod detect_types;
