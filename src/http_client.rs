// ABOUTME: Minimal JSON-over-HTTP client for localhost CP<->RP admin calls.
// ABOUTME: Built on hyper + hyper-util, the same low-level client idiom the Backend uses internally.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;

use crate::error::{Error, Result};

async fn connect(uri: &Uri) -> Result<hyper::client::conn::http1::SendRequest<Full<Bytes>>> {
    let host = uri.host().ok_or_else(|| Error::bad_request("missing host"))?;
    let port = uri.port_u16().unwrap_or(80);
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| Error::upstream(e.to_string()))?;
    let io = TokioIo::new(stream);

    let (sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| Error::upstream(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::warn!("http client connection error: {}", e);
        }
    });

    Ok(sender)
}

/// `GET url`, returning only the status code. Used for the backend health probe.
pub async fn get_status(url: &str) -> Result<StatusCode> {
    let uri: Uri = url.parse().map_err(|e| Error::bad_request(format!("{e}")))?;
    let mut sender = connect(&uri).await?;

    let authority = uri
        .authority()
        .ok_or_else(|| Error::bad_request("missing authority"))?
        .clone();
    let request = Request::builder()
        .uri(uri.path())
        .header(hyper::header::HOST, authority.as_str())
        .body(Full::new(Bytes::new()))
        .map_err(|e| Error::bad_request(e.to_string()))?;

    let response = sender
        .send_request(request)
        .await
        .map_err(|e| Error::transient(e.to_string()))?;
    Ok(response.status())
}

/// `POST url` with a JSON body, decoding a JSON response on success.
pub async fn post_json<B: Serialize, R: DeserializeOwned>(
    url: &str,
    body: &B,
) -> Result<(StatusCode, Option<R>)> {
    let uri: Uri = url.parse().map_err(|e| Error::bad_request(format!("{e}")))?;
    let mut sender = connect(&uri).await?;

    let payload =
        serde_json::to_vec(body).map_err(|e| Error::bad_request(e.to_string()))?;
    let authority = uri
        .authority()
        .ok_or_else(|| Error::bad_request("missing authority"))?
        .clone();
    let path = if uri.path().is_empty() { "/" } else { uri.path() };
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header(hyper::header::HOST, authority.as_str())
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(payload)))
        .map_err(|e| Error::bad_request(e.to_string()))?;

    let response = sender
        .send_request(request)
        .await
        .map_err(|e| Error::upstream(e.to_string()))?;
    let status = response.status();

    let collected = response
        .collect()
        .await
        .map_err(|e| Error::upstream(e.to_string()))?
        .to_bytes();

    if !status.is_success() || collected.is_empty() {
        return Ok((status, None));
    }

    let decoded = serde_json::from_slice(&collected).ok();
    Ok((status, decoded))
}
