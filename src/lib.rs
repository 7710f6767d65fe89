pub mod alert;
pub mod config;
pub mod crl;
pub mod health;
pub mod storage;
pub mod sync;
pub mod telemetry;
