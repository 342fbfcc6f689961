pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod models;
pub mod queue;
pub mod routes;
pub mod schema;
pub mod service;
pub mod state;
pub mod storage;

pub use service::{PdfStore, UploadOutcome};
