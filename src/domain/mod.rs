pub mod alert;
pub mod settings;
pub mod telemetry;
pub mod threshold;
pub mod user;
