use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::Request;
use hyper::body::Body;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Largest JSON body any route accepts.
pub const MAX_JSON_BODY: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("request body exceeds {MAX_JSON_BODY} bytes")]
    TooLarge,

    #[error("failed to read request body: {0}")]
    Read(String),

    #[error("request body is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Read the whole body (up to [`MAX_JSON_BODY`]) and parse it as `T`.
pub async fn read_json<T, B>(req: Request<B>) -> Result<T, BodyError>
where
    T: DeserializeOwned,
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let bytes = Limited::new(req.into_body(), MAX_JSON_BODY)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                BodyError::TooLarge
            } else {
                BodyError::Read(e.to_string())
            }
        })?
        .to_bytes();

    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Full;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Ping {
        n: u32,
    }

    fn req(body: impl Into<Bytes>) -> Request<Full<Bytes>> {
        Request::new(Full::new(body.into()))
    }

    #[tokio::test]
    async fn parses_json() {
        let ping: Ping = read_json(req(r#"{"n":3}"#)).await.unwrap();
        assert_eq!(ping, Ping { n: 3 });
    }

    #[tokio::test]
    async fn rejects_bad_json() {
        let err = read_json::<Ping, _>(req("n=3")).await.unwrap_err();
        assert!(matches!(err, BodyError::Malformed(_)));
    }

    #[tokio::test]
    async fn rejects_oversized_body() {
        let big = format!(r#"{{"n":1,"pad":"{}"}}"#, "x".repeat(MAX_JSON_BODY));
        let err = read_json::<Ping, _>(req(big)).await.unwrap_err();
        assert!(matches!(err, BodyError::TooLarge));
    }
}
