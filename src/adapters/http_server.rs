//! HTTP server adapter.
//!
//! Implements [`HttpListener`].  On ESP-IDF, `EspHttpServer` owns the
//! socket: its task frames each request, hands it to the control loop
//! through a channel, and writes whatever the loop sends back.  The loop
//! side only ever waits in `recv_timeout`, so a slow or silent client
//! cannot stretch a wait past the caller's timeout.
//!
//! On the host the same queue is fed by [`SimClient`] handles.

use core::time::Duration;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};

use log::{debug, info, warn};

use crate::app::ports::HttpListener;
use crate::error::ConnectivityError;
use crate::http::{HttpRequest, HttpResponse, Method};

/// How long a server task waits for the loop's answer.  Long enough for
/// a credential test plus the save retry.
const REPLY_TIMEOUT: Duration = Duration::from_secs(30);

type Exchange = (HttpRequest, SyncSender<HttpResponse>);

/// Server-task side: decode the target, queue the request, wait for the
/// loop.  Malformed targets are answered here and never reach the loop.
fn dispatch(queue: &Sender<Exchange>, method: Method, target: &str) -> HttpResponse {
    let request = match HttpRequest::new(method, target) {
        Ok(r) => r,
        Err(e) => {
            debug!("HTTP: rejecting request ({})", e);
            return HttpResponse::bad_request();
        }
    };
    let (reply_tx, reply_rx) = mpsc::sync_channel(1);
    if queue.send((request, reply_tx)).is_err() {
        warn!("HTTP: request queue closed");
        return HttpResponse::unavailable();
    }
    reply_rx.recv_timeout(REPLY_TIMEOUT).unwrap_or_else(|_| {
        debug!("HTTP: no answer for {}", target.split('?').next().unwrap_or(""));
        HttpResponse::unavailable()
    })
}

pub struct HttpServerAdapter {
    requests: Receiver<Exchange>,
    pending: Option<SyncSender<HttpResponse>>,
    #[cfg(target_os = "espidf")]
    _server: esp_idf_svc::http::server::EspHttpServer<'static>,
    #[cfg(not(target_os = "espidf"))]
    queue: Sender<Exchange>,
}

#[cfg(target_os = "espidf")]
impl HttpServerAdapter {
    /// Start the server on `port` with a single client socket.
    pub fn start(port: u16) -> Result<Self, ConnectivityError> {
        use embedded_svc::http::{Method as WireMethod, Query as _};
        use embedded_svc::io::Write;
        use esp_idf_svc::http::server::{Configuration, EspHttpServer};
        use esp_idf_svc::io::EspIOError;

        let conf = Configuration {
            http_port: port,
            max_open_sockets: 1,
            lru_purge_enable: true,
            uri_match_wildcard: true,
            stack_size: 8 * 1024,
            ..Default::default()
        };
        let mut server = EspHttpServer::new(&conf).map_err(|e| {
            warn!("HTTP: server start failed: {:?}", e);
            ConnectivityError::ListenerFailed
        })?;

        let (queue, requests) = mpsc::channel();
        for (wire, method) in [(WireMethod::Get, Method::Get), (WireMethod::Post, Method::Post)] {
            let queue = queue.clone();
            server
                .fn_handler("/*", wire, move |req| -> Result<(), EspIOError> {
                    let response = dispatch(&queue, method, req.uri());
                    req.into_response(
                        response.status,
                        Some(response.reason()),
                        &[("Content-Type", response.content_type)],
                    )?
                    .write_all(response.body.as_bytes())
                })
                .map_err(|e| {
                    warn!("HTTP: handler registration failed: {:?}", e);
                    ConnectivityError::ListenerFailed
                })?;
        }

        info!("HTTP: listening on port {}", port);
        Ok(Self {
            requests,
            pending: None,
            _server: server,
        })
    }
}

#[cfg(not(target_os = "espidf"))]
impl HttpServerAdapter {
    pub fn start(port: u16) -> Result<Self, ConnectivityError> {
        let (queue, requests) = mpsc::channel();
        info!("HTTP: simulated server on port {}", port);
        Ok(Self {
            requests,
            pending: None,
            queue,
        })
    }

    /// A client that submits requests the way the server task does.
    pub fn client(&self) -> SimClient {
        SimClient {
            queue: self.queue.clone(),
        }
    }
}

/// Host stand-in for a browser talking to the device.
#[cfg(not(target_os = "espidf"))]
#[derive(Clone)]
pub struct SimClient {
    queue: Sender<Exchange>,
}

#[cfg(not(target_os = "espidf"))]
impl SimClient {
    /// Blocks until the loop answers or the reply budget runs out.
    pub fn send(&self, method: Method, target: &str) -> HttpResponse {
        dispatch(&self.queue, method, target)
    }
}

impl HttpListener for HttpServerAdapter {
    fn next_request(&mut self, timeout: Duration) -> Result<Option<HttpRequest>, ConnectivityError> {
        // Dropping an unanswered reply slot releases its client with 503.
        self.pending = None;
        match self.requests.recv_timeout(timeout) {
            Ok((request, reply)) => {
                debug!("HTTP: {:?} {}", request.method, request.path);
                self.pending = Some(reply);
                Ok(Some(request))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                warn!("HTTP: server stopped");
                Err(ConnectivityError::ListenerFailed)
            }
        }
    }

    fn respond(&mut self, response: &HttpResponse) -> Result<(), ConnectivityError> {
        let reply = self.pending.take().ok_or(ConnectivityError::ListenerFailed)?;
        reply.send(response.clone()).map_err(|_| {
            warn!("HTTP: client gave up before the answer");
            ConnectivityError::ListenerFailed
        })
    }
}
