use reqwest::{Method, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use telesink_core::error::{Result, TelesinkError};
use tokio::sync::OnceCell;

use super::auth::{Credentials, TokenSource};

#[derive(Debug, Clone)]
pub struct SheetsEndpoints {
    pub sheets_base: String,
    pub drive_base: String,
}

impl Default for SheetsEndpoints {
    fn default() -> Self {
        Self {
            sheets_base: "https://sheets.googleapis.com".to_string(),
            drive_base: "https://www.googleapis.com".to_string(),
        }
    }
}

impl SheetsEndpoints {
    /// Both APIs served from one base URL, as a local fake does.
    pub fn single(base: &str) -> Self {
        Self {
            sheets_base: base.to_string(),
            drive_base: base.to_string(),
        }
    }
}

/// The worksheet all reads and writes go to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetTarget {
    pub spreadsheet_id: String,
    pub sheet_id: i64,
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct DriveFiles {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Thin Google Sheets v4 client for a single worksheet.
pub struct SheetsClient {
    http: reqwest::Client,
    tokens: TokenSource,
    endpoints: SheetsEndpoints,
    spreadsheet_name: String,
    spreadsheet_id: Option<String>,
    target: OnceCell<SheetTarget>,
}

impl SheetsClient {
    pub fn new(
        credentials: Credentials,
        spreadsheet_name: impl Into<String>,
        spreadsheet_id: Option<String>,
        endpoints: SheetsEndpoints,
    ) -> Self {
        let http = reqwest::Client::new();
        Self {
            tokens: TokenSource::new(http.clone(), credentials),
            http,
            endpoints,
            spreadsheet_name: spreadsheet_name.into(),
            spreadsheet_id,
            target: OnceCell::new(),
        }
    }

    pub fn spreadsheet_name(&self) -> &str {
        &self.spreadsheet_name
    }

    /// Resolves the spreadsheet (by id, else by name through Drive) and its
    /// first worksheet once per process.
    pub async fn target(&self) -> Result<&SheetTarget> {
        self.target
            .get_or_try_init(|| async {
                let spreadsheet_id = match &self.spreadsheet_id {
                    Some(id) => id.clone(),
                    None => self.find_spreadsheet_id().await?,
                };
                let mut url = self.sheets_url(&["v4", "spreadsheets", &spreadsheet_id])?;
                url.query_pairs_mut()
                    .append_pair("fields", "sheets.properties");
                let meta: SpreadsheetMeta = self.send(self.http.get(url)).await?;
                let first = meta.sheets.into_iter().next().ok_or_else(|| {
                    TelesinkError::Sheet(format!("spreadsheet {spreadsheet_id} has no worksheets"))
                })?;
                tracing::info!(
                    spreadsheet_id = %spreadsheet_id,
                    worksheet = %first.properties.title,
                    "resolved spreadsheet"
                );
                Ok(SheetTarget {
                    spreadsheet_id,
                    sheet_id: first.properties.sheet_id,
                    title: first.properties.title,
                })
            })
            .await
    }

    async fn find_spreadsheet_id(&self) -> Result<String> {
        let mut url = parse_base(&self.endpoints.drive_base)?;
        extend_path(&mut url, &["drive", "v3", "files"])?;
        let query = format!(
            "name = '{}' and mimeType = 'application/vnd.google-apps.spreadsheet' and trashed = false",
            self.spreadsheet_name.replace('\'', "\\'")
        );
        url.query_pairs_mut()
            .append_pair("q", &query)
            .append_pair("fields", "files(id,name)");

        let found: DriveFiles = self.send(self.http.get(url)).await?;
        found
            .files
            .into_iter()
            .next()
            .map(|f| f.id)
            .ok_or_else(|| {
                TelesinkError::Sheet(format!(
                    "spreadsheet not found: {}",
                    self.spreadsheet_name
                ))
            })
    }

    /// Every non-empty row of the worksheet, header included.
    pub async fn read_all(&self) -> Result<Vec<Vec<Value>>> {
        let target = self.target().await?;
        self.read_range(target, &a1(&target.title, None)).await
    }

    pub async fn write_header(&self, header: &[String]) -> Result<()> {
        let target = self.target().await?;
        let values = vec![header.iter().cloned().map(Value::String).collect::<Vec<_>>()];
        self.put_values(target, &a1(&target.title, Some("A1")), values)
            .await
    }

    /// Inserts `rows` directly below the header, first row on top.
    pub async fn insert_top(&self, rows: Vec<Vec<Value>>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let target = self.target().await?;
        let url = self.sheets_url(&[
            "v4",
            "spreadsheets",
            &format!("{}:batchUpdate", target.spreadsheet_id),
        ])?;
        let body = json!({
            "requests": [{
                "insertDimension": {
                    "range": {
                        "sheetId": target.sheet_id,
                        "dimension": "ROWS",
                        "startIndex": 1,
                        "endIndex": 1 + rows.len(),
                    },
                    "inheritFromBefore": false,
                }
            }]
        });
        let _: Value = self.send(self.http.post(url).json(&body)).await?;
        self.put_values(target, &a1(&target.title, Some("A2")), rows)
            .await
    }

    pub async fn append(&self, rows: Vec<Vec<Value>>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let target = self.target().await?;
        let range = format!("{}:append", a1(&target.title, Some("A1")));
        let mut url = self.values_url(target, &range)?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let body = json!({ "majorDimension": "ROWS", "values": rows });
        let _: Value = self.send(self.http.post(url).json(&body)).await?;
        Ok(())
    }

    async fn read_range(&self, target: &SheetTarget, range: &str) -> Result<Vec<Vec<Value>>> {
        let mut url = self.values_url(target, range)?;
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE");
        let body: ValueRange = self.send(self.http.get(url)).await?;
        Ok(body.values)
    }

    async fn put_values(
        &self,
        target: &SheetTarget,
        range: &str,
        values: Vec<Vec<Value>>,
    ) -> Result<()> {
        let mut url = self.values_url(target, range)?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = json!({ "range": range, "majorDimension": "ROWS", "values": values });
        let _: Value = self
            .send(self.http.request(Method::PUT, url).json(&body))
            .await?;
        Ok(())
    }

    fn values_url(&self, target: &SheetTarget, range: &str) -> Result<Url> {
        self.sheets_url(&[
            "v4",
            "spreadsheets",
            &target.spreadsheet_id,
            "values",
            range,
        ])
    }

    fn sheets_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = parse_base(&self.endpoints.sheets_base)?;
        extend_path(&mut url, segments)?;
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let token = self.tokens.token().await?;
        let response = req
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| TelesinkError::Sheet(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TelesinkError::Sheet(format!(
                "api returned {status}: {body}"
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| TelesinkError::Sheet(format!("bad api response: {e}")))
    }
}

fn parse_base(base: &str) -> Result<Url> {
    Url::parse(base).map_err(|e| TelesinkError::Config(format!("bad api base url {base}: {e}")))
}

fn extend_path(url: &mut Url, segments: &[&str]) -> Result<()> {
    let shown = url.to_string();
    url.path_segments_mut()
        .map_err(|_| TelesinkError::Config(format!("api base url cannot hold a path: {shown}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(())
}

/// A1 notation for `cells` on worksheet `title`; the whole sheet if `None`.
pub(crate) fn a1(title: &str, cells: Option<&str>) -> String {
    let plain = title
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');
    let sheet = if plain {
        title.to_string()
    } else {
        format!("'{}'", title.replace('\'', "''"))
    };
    match cells {
        Some(cells) => format!("{sheet}!{cells}"),
        None => sheet,
    }
}

pub(crate) fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
