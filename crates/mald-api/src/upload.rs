use mald_model::JobId;

use crate::error::ApiError;

const EXECUTABLE_SUFFIX: &str = ".exe";

/// A validated file upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Key the blob is stored under.
    pub unique_key: String,
    /// Client-side file name.
    pub file_name: String,
    pub data: Vec<u8>,
}

impl Upload {
    /// Check the raw form fields, in the order clients have always seen the
    /// errors reported: file, file type, key.
    pub fn from_parts(
        file: Option<(Option<String>, Vec<u8>)>,
        unique_key: Option<String>,
    ) -> Result<Self, ApiError> {
        let Some((file_name, data)) = file else {
            return Err(ApiError::InvalidRequest("File not found in request".into()));
        };

        let file_name = file_name.unwrap_or_default();
        if !is_executable_name(&file_name) {
            return Err(ApiError::InvalidRequest(
                "Invalid file type. Only .exe files are supported.".into(),
            ));
        }

        let unique_key = unique_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ApiError::InvalidRequest("Unique key not found in request.".into()))?;

        Ok(Self {
            unique_key,
            file_name,
            data,
        })
    }
}

fn is_executable_name(name: &str) -> bool {
    name.len() > EXECUTABLE_SUFFIX.len()
        && name
            .get(name.len() - EXECUTABLE_SUFFIX.len()..)
            .is_some_and(|suffix| suffix.eq_ignore_ascii_case(EXECUTABLE_SUFFIX))
}

/// Parse a client supplied result id, or mint one.
#[cfg_attr(not(feature = "http"), allow(dead_code))]
pub(crate) fn result_id_or_generate(raw: Option<String>) -> Result<JobId, ApiError> {
    match raw.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()) {
        Some(raw) => JobId::parse(raw).map_err(|e| ApiError::InvalidRequest(e.to_string())),
        None => Ok(JobId::generate()),
    }
}
