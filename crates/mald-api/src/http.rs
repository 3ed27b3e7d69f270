use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartError},
    response::IntoResponse,
    routing::{get, options, post},
};
use mald_model::JobId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::ApiError,
    handler::ApiHandler,
    upload::{Upload, result_id_or_generate},
};

/// Default cap on request bodies, large enough for big executables.
pub const DEFAULT_BODY_LIMIT: usize = 256 * 1024 * 1024;

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
    body_limit: usize,
}

impl<H> HttpApi<H>
where
    H: ApiHandler,
{
    /// Create new HTTP API with the given handler.
    pub fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Override the request body limit in bytes.
    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - GET / - Welcome message
    /// - POST /api/upload_file/ - Classify a file synchronously
    /// - POST /api/upload_large_file/ - Queue a file for background classification
    /// - GET /api/search_result/{result_id}/ - Fetch a background result
    /// - OPTIONS on the api paths - Allowed methods
    pub fn router(self) -> Router {
        Router::new()
            .route("/", get(root))
            .route(
                "/api/upload_file/",
                post(upload_file::<H>).options(allow("POST, OPTIONS")),
            )
            .route(
                "/api/upload_large_file/",
                post(upload_large_file::<H>).options(allow("GET, POST, OPTIONS")),
            )
            .route("/api/search_result/", options(allow("GET, OPTIONS")))
            .route(
                "/api/search_result/{result_id}/",
                get(search_result::<H>).options(allow("GET, OPTIONS")),
            )
            .layer(DefaultBodyLimit::max(self.body_limit))
            .with_state(self.handler)
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct MessageResponse {
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SubmitLargeFileResponse {
    result_id: String,
}

/// Raw multipart fields before validation.
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<(Option<String>, Vec<u8>)>,
    unique_key: Option<String>,
    result_id: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some("file") => {
                    let file_name = field.file_name().map(str::to_owned);
                    let data = field.bytes().await.map_err(bad_multipart)?;
                    form.file = Some((file_name, data.to_vec()));
                }
                Some("unique_key") => {
                    form.unique_key = Some(field.text().await.map_err(bad_multipart)?);
                }
                Some("result_id") => {
                    form.result_id = Some(field.text().await.map_err(bad_multipart)?);
                }
                _ => {}
            }
        }
        Ok(form)
    }
}

fn bad_multipart(err: MultipartError) -> ApiError {
    ApiError::InvalidRequest(err.body_text())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /
async fn root() -> impl IntoResponse {
    Json(MessageResponse {
        message: "Welcome to MalDitectist".into(),
    })
}

/// OPTIONS on the api paths.
fn allow(
    methods: &'static str,
) -> impl Fn() -> std::future::Ready<Json<MessageResponse>> + Clone + Send + Sync + 'static {
    move || {
        std::future::ready(Json(MessageResponse {
            message: format!("Allow: {methods}"),
        }))
    }
}

/// POST /api/upload_file/
async fn upload_file<H>(
    State(handler): State<Arc<H>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let form = UploadForm::read(multipart).await?;
    let upload = Upload::from_parts(form.file, form.unique_key)?;
    debug!(key = %upload.unique_key, size = upload.data.len(), "classifying upload");

    let outcome = handler.classify_file(upload).await?;
    Ok(Json(outcome))
}

/// POST /api/upload_large_file/
async fn upload_large_file<H>(
    State(handler): State<Arc<H>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let form = UploadForm::read(multipart).await?;
    let upload = Upload::from_parts(form.file, form.unique_key)?;
    let result_id = result_id_or_generate(form.result_id)?;
    debug!(%result_id, key = %upload.unique_key, size = upload.data.len(), "submitting large upload");

    let result_id = handler.submit_large_file(result_id, upload).await?;
    Ok(Json(SubmitLargeFileResponse {
        result_id: result_id.to_string(),
    }))
}

/// GET /api/search_result/{result_id}/
async fn search_result<H>(
    State(handler): State<Arc<H>>,
    Path(raw): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    // An id that could never have been issued is simply not found.
    let result_id = JobId::parse(raw.as_str()).map_err(|_| ApiError::ResultNotFound(raw))?;
    debug!(%result_id, "looking up result");

    let outcome = handler.search_result(&result_id).await?;
    Ok(Json(outcome))
}
