use crate::error::FetchError;
use reqwest::Client;
use tracing::{debug, warn};

/// Issues a GET and returns the body of a successful response.
/// Non-success statuses carry the response text back to the caller.
pub async fn get_body(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<Vec<u8>, FetchError> {
    debug!(%url, ?query, "requesting");

    let transport = |source| FetchError::Transport {
        url: url.to_string(),
        source,
    };

    let response = client.get(url).query(query).send().await.map_err(transport)?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(%url, %status, "non-success response");
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
            body,
        });
    }

    let bytes = response.bytes().await.map_err(transport)?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(FetchError::EmptyPayload {
            url: url.to_string(),
        });
    }
    Ok(bytes.to_vec())
}
