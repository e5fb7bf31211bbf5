use anyhow::Context;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Form, FromRequest, Multipart, Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use super::error::AppError;
use super::views;
use super::AppState;
use crate::data::describe::{describe, ColumnSummary};
use crate::data::loader::load_csv;
use crate::data::model::Dataset;
use crate::plot::{render_chart, ChartData};
use crate::storage::{allowed_file, secure_filename, UploadStore};

// ---------------------------------------------------------------------------
// Upload validation outcome
// ---------------------------------------------------------------------------

/// Why an upload was sent back to the form. Carried as a short code in the
/// redirect's query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadRejection {
    NoFile,
    FileType,
    TooLarge,
    Unreadable,
}

impl UploadRejection {
    pub fn code(self) -> &'static str {
        match self {
            UploadRejection::NoFile => "no-file",
            UploadRejection::FileType => "file-type",
            UploadRejection::TooLarge => "too-large",
            UploadRejection::Unreadable => "unreadable",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "no-file" => Some(UploadRejection::NoFile),
            "file-type" => Some(UploadRejection::FileType),
            "too-large" => Some(UploadRejection::TooLarge),
            "unreadable" => Some(UploadRejection::Unreadable),
            _ => None,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            UploadRejection::NoFile => "Choose a file to upload.",
            UploadRejection::FileType => "Only .csv files can be uploaded.",
            UploadRejection::TooLarge => "The file is larger than the upload limit.",
            UploadRejection::Unreadable => "The upload could not be read. Please try again.",
        }
    }
}

/// `302 Found` to `location`.
fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

fn send_back(rejection: UploadRejection) -> Response {
    log::info!("upload rejected: {}", rejection.code());
    found(format!("/?error={}", rejection.code()))
}

/// Run filesystem and CPU work off the async executor.
async fn blocking<T, E, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("blocking task did not complete")?
        .map_err(Into::into)
}

fn load_dataset(uploads: &UploadStore, filename: &str) -> anyhow::Result<Dataset> {
    let bytes = uploads
        .read(filename)
        .with_context(|| format!("reading upload {filename:?}"))?;
    let dataset =
        load_csv(bytes.as_slice()).with_context(|| format!("parsing {filename:?} as CSV"))?;
    log::debug!(
        "loaded {filename}: {} rows, columns {:?}",
        dataset.len(),
        dataset.columns
    );
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// GET /
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    error: Option<String>,
}

pub async fn index(Query(query): Query<IndexQuery>) -> Html<String> {
    let rejection = query.error.as_deref().and_then(UploadRejection::from_code);
    Html(views::upload_page(rejection))
}

// ---------------------------------------------------------------------------
// POST /upload
// ---------------------------------------------------------------------------

struct UploadedFile {
    name: String,
    bytes: Vec<u8>,
}

async fn read_file_field(mut multipart: Multipart) -> Result<UploadedFile, UploadRejection> {
    let read_err = |e: axum::extract::multipart::MultipartError| {
        log::warn!("failed to read multipart upload: {e}");
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            UploadRejection::TooLarge
        } else {
            UploadRejection::Unreadable
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(read_err)? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(read_err)?.to_vec();
        return Ok(UploadedFile { name, bytes });
    }
    Err(UploadRejection::NoFile)
}

/// Storage key for a client filename, or why it is refused.
fn storage_name(client_name: &str) -> Result<String, UploadRejection> {
    if client_name.is_empty() {
        return Err(UploadRejection::NoFile);
    }
    if !allowed_file(client_name) {
        return Err(UploadRejection::FileType);
    }
    let safe = secure_filename(client_name);
    if safe.is_empty() || !allowed_file(&safe) {
        return Err(UploadRejection::FileType);
    }
    Ok(safe)
}

pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let Ok(multipart) = multipart else {
        return send_back(UploadRejection::NoFile);
    };
    let file = match read_file_field(multipart).await {
        Ok(file) => file,
        Err(rejection) => return send_back(rejection),
    };
    let filename = match storage_name(&file.name) {
        Ok(name) => name,
        Err(rejection) => return send_back(rejection),
    };

    let uploads = state.uploads.clone();
    let key = filename.clone();
    let saved = blocking(move || {
        uploads
            .save(&key, &file.bytes)
            .with_context(|| format!("saving upload {key:?}"))
    })
    .await;

    match saved {
        Ok(path) => {
            log::info!("stored upload {filename} at {}", path.display());
            found(format!("/analyze/{filename}"))
        }
        Err(err) => err.respond(state.verbose_errors),
    }
}

// ---------------------------------------------------------------------------
// GET /analyze/:filename
// ---------------------------------------------------------------------------

pub async fn list_columns(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Response {
    let uploads = state.uploads.clone();
    let key = filename.clone();
    match blocking(move || load_dataset(&uploads, &key)).await {
        Ok(dataset) => Html(views::column_picker(&filename, &dataset.columns)).into_response(),
        Err(err) => err.respond(state.verbose_errors),
    }
}

// ---------------------------------------------------------------------------
// POST /analyze/:filename
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ColumnForm {
    column: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub summary_stats: ColumnSummary,
    pub plot_url: String,
}

/// The `column` field of a urlencoded or multipart form body. An unreadable
/// body counts as no column.
async fn read_column_field(state: &AppState, request: Request) -> Option<String> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if !is_multipart {
        let Form(form) = Form::<ColumnForm>::from_request(request, state).await.ok()?;
        return form.column;
    }

    let mut multipart = Multipart::from_request(request, state).await.ok()?;
    while let Some(field) = multipart.next_field().await.ok()? {
        if field.name() == Some("column") {
            return field.text().await.ok();
        }
    }
    None
}

pub async fn summarize(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request,
) -> Response {
    let column = read_column_field(&state, request).await;
    let verbose = state.verbose_errors;
    match blocking(move || analyze_column(&state, &filename, column)).await {
        Ok(analysis) => Json(analysis).into_response(),
        Err(err) => err.respond(verbose),
    }
}

fn analyze_column(
    state: &AppState,
    filename: &str,
    column: Option<String>,
) -> Result<AnalysisResponse, AppError> {
    let dataset = load_dataset(&state.uploads, filename)?;

    let Some(column) = column.as_deref().and_then(|name| dataset.column(name)) else {
        log::info!("rejected column {column:?} for {filename}");
        return Err(AppError::InvalidColumn);
    };

    let summary_stats = describe(&column);

    let target = state.plots.target_for(filename, column.name);
    log::info!("Generating histogram for column: {}", column.name);
    render_chart(
        &ChartData::for_column(&column),
        &format!("Histogram of {}", column.name),
        &target.path,
        state.plot_size,
    )
    .with_context(|| format!("rendering chart for column {:?}", column.name))?;
    log::info!("Histogram saved to: {}", target.path.display());

    Ok(AnalysisResponse {
        summary_stats,
        plot_url: target.url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_codes_round_trip() {
        for rejection in [
            UploadRejection::NoFile,
            UploadRejection::FileType,
            UploadRejection::TooLarge,
            UploadRejection::Unreadable,
        ] {
            assert_eq!(UploadRejection::from_code(rejection.code()), Some(rejection));
        }
        assert_eq!(UploadRejection::from_code("<script>"), None);
    }

    #[test]
    fn storage_name_validates_and_sanitizes() {
        assert_eq!(storage_name("data.csv"), Ok("data.csv".to_string()));
        assert_eq!(storage_name("../up/My Data.CSV"), Ok("up_My_Data.CSV".to_string()));
        assert_eq!(storage_name(""), Err(UploadRejection::NoFile));
        assert_eq!(storage_name("data.txt"), Err(UploadRejection::FileType));
        assert_eq!(storage_name("é.csv"), Err(UploadRejection::FileType));
    }
}
