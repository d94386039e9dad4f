/*
 * blockmirror - multi-mirror, block-parallel downloader.
 * Copyright (C) 2025  blockmirror contributors
 */

//! One mirror: a base URL plus the pooled HTTP client that talks to it.
//!
//! `reqwest` has no hook for overriding the TLS verification name per
//! connection, which IP-literal mirrors require. This module instead
//! builds directly on `hyper-util`'s connection-pooling client with a
//! custom connector that performs the TCP connect and, for `https://`
//! mirrors, the TLS handshake with an explicit `ServerName` (see
//! `tls.rs`).

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Empty;
use hyper::body::Incoming;
use hyper::Uri;
use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tower_service::Service;

use super::tls;
use crate::config::Config;
use crate::error::MirrorError;

type Request = http::Request<Empty<Bytes>>;
pub type MirrorResponse = http::Response<Incoming>;

/// One mirror origin and its dedicated connection pool.
pub struct Mirror {
    /// Base URL prefix, e.g. `https://images.example.org/`.
    pub prefix: String,
    client: Client<MirrorConnector, Empty<Bytes>>,
    timeout: Duration,
    retries: u32,
}

impl Mirror {
    /// Build a mirror client. `tls_config` is `None` when `prefix` is
    /// plain `http://` (used in tests against a local mock server); real
    /// mirrors are always `https://`.
    pub fn new(prefix: String, config: &Config) -> std::io::Result<Self> {
        let tls_connector = if prefix.starts_with("https://") {
            Some(tokio_rustls::TlsConnector::from(tls::client_config(
                &config.ca_bundle_path,
            )?))
        } else {
            None
        };

        let connector = MirrorConnector { tls_connector };
        let client = Client::builder(hyper_util::rt::TokioExecutor::new()).build(connector);

        Ok(Self {
            prefix,
            client,
            timeout: config.request_timeout,
            retries: config.request_retries,
        })
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}{}", self.prefix, suffix)
    }

    /// Per-request connect+read timeout, also applied to each individual
    /// chunk read while streaming a block.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issue `HEAD <prefix><suffix>` with the mirror's timeout and retry
    /// budget.
    pub async fn head(&self, suffix: &str) -> Result<MirrorResponse, MirrorError> {
        self.send_with_retry(|| {
            http::Request::builder()
                .method(http::Method::HEAD)
                .uri(self.url(suffix))
                .body(Empty::new())
                .expect("valid HEAD request")
        })
        .await
    }

    /// Issue `GET <prefix><suffix>` with a `Range` header, with the
    /// mirror's timeout and retry budget.
    pub async fn get_range(&self, suffix: &str, range_header: &str) -> Result<MirrorResponse, MirrorError> {
        self.send_with_retry(|| {
            http::Request::builder()
                .method(http::Method::GET)
                .uri(self.url(suffix))
                .header(http::header::RANGE, range_header)
                .body(Empty::new())
                .expect("valid ranged GET request")
        })
        .await
    }

    async fn send_with_retry<F>(&self, mut build: F) -> Result<MirrorResponse, MirrorError>
    where
        F: FnMut() -> Request,
    {
        let mut attempt = 0;
        loop {
            let request = build();
            match tokio::time::timeout(self.timeout, self.client.request(request)).await {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(e)) => {
                    if attempt >= self.retries {
                        return Err(classify_hyper_error(&e));
                    }
                }
                Err(_elapsed) => {
                    if attempt >= self.retries {
                        return Err(MirrorError::ConnectTimeout);
                    }
                }
            }
            attempt += 1;
        }
    }
}

fn classify_hyper_error(e: &hyper_util::client::legacy::Error) -> MirrorError {
    if let Some(reason) = find_tls_handshake_failure(e) {
        return MirrorError::TlsHandshake(reason);
    }

    if e.is_connect() {
        MirrorError::ConnectFailed(e.to_string())
    } else {
        MirrorError::RetriesExhausted(e.to_string())
    }
}

/// Walk the error's source chain looking for the `TlsHandshakeFailure`
/// the connector tags its handshake errors with, so the mirror's
/// concrete transport-error cause survives hyper's generic error
/// wrapping instead of collapsing into `ConnectFailed`.
fn find_tls_handshake_failure(e: &(dyn std::error::Error + 'static)) -> Option<String> {
    if let Some(io_err) = e.downcast_ref::<std::io::Error>() {
        if let Some(tls) = io_err.get_ref().and_then(|inner| inner.downcast_ref::<TlsHandshakeFailure>()) {
            return Some(tls.0.clone());
        }
    }
    e.source().and_then(find_tls_handshake_failure)
}

/// Marker error the connector wraps TLS handshake failures in, so
/// `find_tls_handshake_failure` can pick them out of hyper's otherwise
/// opaque connect-error chain.
#[derive(Debug)]
struct TlsHandshakeFailure(String);

impl std::fmt::Display for TlsHandshakeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TLS handshake failed: {}", self.0)
    }
}

impl std::error::Error for TlsHandshakeFailure {}

// --- Connector plumbing -----------------------------------------------

#[derive(Clone)]
struct MirrorConnector {
    tls_connector: Option<tokio_rustls::TlsConnector>,
}

impl Service<Uri> for MirrorConnector {
    type Response = MirrorStream;
    type Error = std::io::Error;
    type Future = Pin<Box<dyn Future<Output = std::io::Result<MirrorStream>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let tls_connector = self.tls_connector.clone();
        Box::pin(async move {
            let host = uri
                .host()
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "missing host"))?
                .to_string();
            let port = uri
                .port_u16()
                .unwrap_or(if uri.scheme_str() == Some("https") { 443 } else { 80 });

            let tcp = TcpStream::connect((host.as_str(), port)).await?;
            tcp.set_nodelay(true)?;

            let inner = if let Some(connector) = tls_connector {
                let server_name = tls::verification_name(&host);
                let tls_stream = connector.connect(server_name, tcp).await.map_err(|e| {
                    std::io::Error::new(std::io::ErrorKind::Other, TlsHandshakeFailure(e.to_string()))
                })?;
                MaybeTlsStream::Tls(Box::new(tls_stream))
            } else {
                MaybeTlsStream::Plain(tcp)
            };

            Ok(MirrorStream(TokioIo::new(inner)))
        })
    }
}

enum MaybeTlsStream {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_flush(cx),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Newtype so we can implement hyper-util's `Connection` marker trait,
/// which `TokioIo<MaybeTlsStream>` does not get for free.
struct MirrorStream(TokioIo<MaybeTlsStream>);

impl hyper::rt::Read for MirrorStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: hyper::rt::ReadBufCursor<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().0).poll_read(cx, buf)
    }
}

impl hyper::rt::Write for MirrorStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.get_mut().0).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().0).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().0).poll_shutdown(cx)
    }
}

impl Connection for MirrorStream {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_a_plain_http_mirror_for_tests() {
        let config = Config::default();
        let mirror = Mirror::new("http://127.0.0.1:1/".to_string(), &config).unwrap();
        assert_eq!(mirror.prefix, "http://127.0.0.1:1/");
    }
}
