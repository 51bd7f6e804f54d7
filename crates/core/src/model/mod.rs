pub mod record;

pub use record::{Payload, StorageKind, TelemetryRecord};
