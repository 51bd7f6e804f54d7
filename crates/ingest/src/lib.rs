pub mod dashboard;
pub mod error;
pub mod export;
pub mod http;
pub mod ingest;
pub mod pipeline;
pub mod query;
pub mod server;
pub mod state;
pub mod stream;
pub mod synth;

pub use http::router;
pub use state::{AppState, HttpSettings};
