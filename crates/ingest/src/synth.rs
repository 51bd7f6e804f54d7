use axum::Json;
use axum::extract::State;
use rand::Rng;
use serde_json::{Number, Value};
use telesink_core::model::Payload;

use crate::error::ApiError;
use crate::ingest::ingest;
use crate::state::AppState;

pub const SENSORS_PATH: &str = "/api/sensors";

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn float(v: f64) -> Value {
    Number::from_f64(round2(v)).map_or(Value::Null, Value::Number)
}

/// One fake machine reading.
pub fn synthetic_reading<R: Rng + ?Sized>(rng: &mut R) -> Payload {
    let status = if rng.random_bool(0.9) {
        "running"
    } else if rng.random_bool(0.5) {
        "idle"
    } else {
        "maintenance"
    };

    let mut reading = Payload::new();
    reading.insert("temperature".into(), float(rng.random_range(20.0..=90.0)));
    reading.insert("vibration".into(), float(rng.random_range(0.1..=5.0)));
    reading.insert("rpm".into(), Value::from(rng.random_range(800u32..=3600)));
    reading.insert("torque".into(), float(rng.random_range(10.0..=120.0)));
    reading.insert("pressure".into(), float(rng.random_range(1.0..=10.0)));
    reading.insert("humidity".into(), float(rng.random_range(20.0..=80.0)));
    reading.insert("power_kw".into(), float(rng.random_range(0.5..=15.0)));
    reading.insert("status".into(), Value::from(status));
    reading
}

pub async fn sensors(State(state): State<AppState>) -> Result<Json<Payload>, ApiError> {
    let reading = synthetic_reading(&mut rand::rng());
    let stored = ingest(&state, SENSORS_PATH, reading).await?;
    Ok(Json(stored.data))
}
