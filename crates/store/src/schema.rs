pub const SCHEMA_SQL: &str = r#"
CREATE SEQUENCE IF NOT EXISTS telemetry_records_id_seq START 1;

CREATE TABLE IF NOT EXISTS telemetry_records (
  id BIGINT PRIMARY KEY,
  received_at TIMESTAMP NOT NULL,
  path TEXT NOT NULL,
  data_json TEXT NOT NULL
);
"#;
