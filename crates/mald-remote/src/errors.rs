use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

pub(crate) fn parse_endpoint(endpoint: &str) -> Result<reqwest::Url, RemoteError> {
    let invalid = |reason: String| RemoteError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let url = reqwest::Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    }
    if url.cannot_be_a_base() {
        return Err(invalid("endpoint cannot carry a path".into()));
    }
    Ok(url)
}
