//! HTTP client adapter.
//!
//! Implements [`HttpClient`] for the update server.
//!
//! - **`target_os = "espidf"`**: `EspHttpConnection` wrapped in the
//!   `embedded_svc` blocking client.  One connection per request; the body
//!   is read in 1 KiB chunks into memory.  The blocking request runs on a
//!   short-lived worker thread while the calling task polls it on reactor
//!   timers, so the executor keeps driving its other tasks.
//! - **all other targets**: [`DirectoryServer`] answers GETs from a local
//!   directory laid out like the server, for simulation runs.

use crate::app::ports::{HttpClient, HttpResponse};
use crate::error::TransportError;

#[cfg(target_os = "espidf")]
pub use device::EspHttpClient;

#[cfg(not(target_os = "espidf"))]
pub use host::DirectoryServer;

#[cfg(target_os = "espidf")]
mod device {
    use core::time::Duration;

    use embedded_svc::http::client::Client;
    use embedded_svc::io::Read;
    use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
    use log::{debug, warn};

    use super::{HttpClient, HttpResponse, TransportError};

    const READ_CHUNK: usize = 1024;
    /// TLS handshakes need the headroom.
    const WORKER_STACK: usize = 12 * 1024;
    const WORKER_POLL: Duration = Duration::from_millis(20);

    pub struct EspHttpClient {
        timeout: Duration,
    }

    impl EspHttpClient {
        pub fn new(timeout_ms: u32) -> Self {
            Self {
                timeout: Duration::from_millis(u64::from(timeout_ms)),
            }
        }
    }

    impl HttpClient for EspHttpClient {
        async fn get(&mut self, url: &str) -> Result<HttpResponse, TransportError> {
            let owned = url.to_string();
            let timeout = self.timeout;
            let worker = std::thread::Builder::new()
                .name("ota-http".into())
                .stack_size(WORKER_STACK)
                .spawn(move || blocking_get(&owned, timeout))
                .map_err(|e| {
                    warn!("HTTP: worker spawn failed: {}", e);
                    TransportError::ConnectFailed
                })?;

            while !worker.is_finished() {
                async_io_mini::Timer::after(WORKER_POLL).await;
            }
            worker.join().unwrap_or_else(|_| {
                warn!("HTTP: worker for {} panicked", url);
                Err(TransportError::ReadFailed)
            })
        }
    }

    fn blocking_get(url: &str, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let connection = EspHttpConnection::new(&Configuration {
            buffer_size: Some(4096),
            buffer_size_tx: Some(512),
            timeout: Some(timeout),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        })
        .map_err(|e| {
            warn!("HTTP: connection setup failed: {:?}", e);
            TransportError::ConnectFailed
        })?;
        let mut client = Client::wrap(connection);

        let request = client.get(url).map_err(|_| TransportError::ConnectFailed)?;
        let mut response = request.submit().map_err(|e| {
            warn!("HTTP: GET {} failed: {:?}", url, e);
            TransportError::Timeout
        })?;
        let status = response.status();

        let mut body = Vec::new();
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match response.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => body.extend_from_slice(&buf[..n]),
                Err(e) => {
                    warn!("HTTP: body read from {} failed: {:?}", url, e);
                    return Err(TransportError::ReadFailed);
                }
            }
        }
        debug!("HTTP: GET {} -> {} ({} B)", url, status, body.len());
        Ok(HttpResponse { status, body })
    }
}

#[cfg(not(target_os = "espidf"))]
mod host {
    use std::io::ErrorKind;
    use std::path::PathBuf;

    use super::{HttpClient, HttpResponse, TransportError};

    /// Serves `<base_url>/<path>` from `<root>/<path>`.
    pub struct DirectoryServer {
        base_url: String,
        root: PathBuf,
        online: bool,
    }

    impl DirectoryServer {
        pub fn new(base_url: &str, root: impl Into<PathBuf>) -> Self {
            Self {
                base_url: base_url.trim_end_matches('/').to_string(),
                root: root.into(),
                online: true,
            }
        }

        /// Simulate losing the uplink.
        pub fn set_online(&mut self, online: bool) {
            self.online = online;
        }
    }

    impl HttpClient for DirectoryServer {
        async fn get(&mut self, url: &str) -> Result<HttpResponse, TransportError> {
            if !self.online {
                return Err(TransportError::NoLink);
            }
            let Some(rel) = url.strip_prefix(self.base_url.as_str()).and_then(|r| r.strip_prefix('/')) else {
                return Err(TransportError::ConnectFailed);
            };
            if rel.split('/').any(|part| part == "..") {
                return Ok(HttpResponse { status: 403, body: Vec::new() });
            }
            match std::fs::read(self.root.join(rel)) {
                Ok(body) => Ok(HttpResponse::ok(body)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(HttpResponse { status: 404, body: Vec::new() }),
                Err(_) => Err(TransportError::ReadFailed),
            }
        }
    }

}
