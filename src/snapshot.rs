//! Remote camera snapshot fetch.
//!
//! One-shot retrieval of the current still from a network camera. Failures
//! are distinguishable so the operator can tell a powered-off camera from a
//! mistyped address from a slow link; every failure is scoped to its own
//! endpoint and never takes a sibling down with it.

use std::error::Error as _;
use std::io::Read;
use std::time::Duration;

use image::RgbImage;
use url::Url;

/// Request budget for one snapshot.
pub const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

/// Path serving the current still on a MotionEye-style camera.
const SNAPSHOT_PATH: &str = "/picture/1/current/";

const MAX_SNAPSHOT_BYTES: usize = 10 * 1024 * 1024;

/// Why a snapshot could not be fetched. Recoverable and endpoint-scoped.
#[derive(Debug)]
pub enum FetchError {
    /// The request exceeded its time budget.
    Timeout,
    /// The endpoint could not be reached at all.
    ConnectionFailure,
    /// The endpoint answered with a non-success status.
    HttpError(u16),
    /// Any other transport-level failure.
    OtherTransport(String),
    /// The endpoint answered, but not with a decodable image.
    BadImage(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Timeout => write!(f, "request timed out"),
            FetchError::ConnectionFailure => {
                write!(f, "failed to connect; check the address and that the camera is powered on")
            }
            FetchError::HttpError(status) => write!(f, "camera returned HTTP status {}", status),
            FetchError::OtherTransport(reason) => write!(f, "transport error: {}", reason),
            FetchError::BadImage(reason) => write!(f, "camera response was not an image: {}", reason),
        }
    }
}

impl std::error::Error for FetchError {}

/// Build the snapshot URL for a camera address.
///
/// A bare address (`192.168.1.4`, `cam-2:8765`) gets the conventional
/// snapshot path; a full `http(s)://` URL passes through untouched.
pub fn snapshot_url(address: &str) -> anyhow::Result<Url> {
    let raw = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}{}", address, SNAPSHOT_PATH)
    };
    let url = Url::parse(&raw)
        .map_err(|e| anyhow::anyhow!("invalid camera address '{}': {}", address, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(anyhow::anyhow!(
            "unsupported camera scheme '{}'; expected http(s)",
            other
        )),
    }
}

/// Fetch and decode the current still from `url`.
pub fn fetch_snapshot(url: &Url, timeout: Duration) -> Result<RgbImage, FetchError> {
    let agent = ureq::AgentBuilder::new().timeout(timeout).build();
    let response = agent.get(url.as_str()).call().map_err(classify_error)?;

    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_SNAPSHOT_BYTES as u64)
        .read_to_end(&mut bytes)
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut || e.kind() == std::io::ErrorKind::WouldBlock
            {
                FetchError::Timeout
            } else {
                FetchError::OtherTransport(e.to_string())
            }
        })?;
    if bytes.is_empty() {
        return Err(FetchError::BadImage("empty response body".to_string()));
    }

    image::load_from_memory(&bytes)
        .map(|i| i.to_rgb8())
        .map_err(|e| FetchError::BadImage(e.to_string()))
}

fn classify_error(err: ureq::Error) -> FetchError {
    match err {
        ureq::Error::Status(code, _) => FetchError::HttpError(code),
        ureq::Error::Transport(transport) => match transport.kind() {
            ureq::ErrorKind::ConnectionFailed | ureq::ErrorKind::Dns => {
                FetchError::ConnectionFailure
            }
            ureq::ErrorKind::Io => {
                let timed_out = transport
                    .source()
                    .and_then(|source| source.downcast_ref::<std::io::Error>())
                    .map(|io| {
                        matches!(
                            io.kind(),
                            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                        )
                    })
                    .unwrap_or(false);
                if timed_out {
                    FetchError::Timeout
                } else {
                    FetchError::OtherTransport(transport.to_string())
                }
            }
            _ => FetchError::OtherTransport(transport.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_addresses_get_the_snapshot_path() {
        let url = snapshot_url("192.168.1.4").unwrap();
        assert_eq!(url.as_str(), "http://192.168.1.4/picture/1/current/");
    }

    #[test]
    fn full_urls_pass_through() {
        let url = snapshot_url("http://cam.local:8081/snap.jpg").unwrap();
        assert_eq!(url.as_str(), "http://cam.local:8081/snap.jpg");
    }

    #[test]
    fn non_http_schemes_are_rejected() {
        assert!(snapshot_url("ftp://192.168.1.4").is_err());
        assert!(snapshot_url("not a url at all").is_err());
    }
}
