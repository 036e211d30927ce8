//! Wi-Fi provisioning state machine.
//!
//! Runs once at boot, before the control loop:
//!
//! ```text
//!  STATION_CONNECT ──ok──────────────────────────────▶ DONE
//!        │ no creds / failed
//!        ▼
//!  AP_FALLBACK ◀──────── error page ─────────┐
//!        │ GET /connect?network=..&password=..│
//!        ▼                                    │
//!  CREDENTIAL_TEST ──rejected─────────────────┤
//!        │ associated                         │
//!        ▼                                    │
//!  PERSIST ──write failed twice───────────────┘
//!        │ stored
//!        ▼
//!      DONE (success page, AP torn down)
//! ```
//!
//! The access-point session is bounded: after `ap_session_timeout_secs`
//! the machine gives up and the controller runs offline.

pub mod pages;

use core::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::events::AppEvent;
use crate::app::ports::{Clock, CredentialStore, EventSink, HttpListener, WifiPort};
use crate::config::SystemConfig;
use crate::error::{ConnectivityError, CredentialError, Error};
use crate::http::{HttpRequest, HttpResponse, Method};

/// Poll interval for association checks.
const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Longest single listener wait, so the session deadline and the station
/// link are re-checked regularly.
const LISTEN_SLICE: Duration = Duration::from_secs(1);

// ───────────────────────────────────────────────────────────────
// Credentials
// ───────────────────────────────────────────────────────────────

/// The persisted station credentials, `{"ssid": .., "password": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
}

impl WifiCredentials {
    /// Validate and build.  SSID: 1-32 printable ASCII bytes.  Password:
    /// empty (open network) or 8-64 bytes.
    pub fn new(ssid: &str, password: &str) -> Result<Self, CredentialError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        Ok(Self {
            ssid: heapless::String::try_from(ssid).map_err(|_| CredentialError::InvalidSsid)?,
            password: heapless::String::try_from(password)
                .map_err(|_| CredentialError::InvalidPassword)?,
        })
    }

    /// Re-check a record read back from storage.
    pub fn validate(&self) -> Result<(), CredentialError> {
        validate_ssid(&self.ssid)?;
        validate_password(&self.password)
    }
}

/// Returns `true` if every byte of `s` is in the printable ASCII range
/// `0x20..=0x7E` (space through tilde, inclusive).
fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), CredentialError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(CredentialError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), CredentialError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(CredentialError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// States
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningState {
    StationConnect,
    ApFallback,
    CredentialTest,
    Persist,
    Done,
}

/// How provisioning ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningOutcome {
    /// Stored credentials worked.
    Connected,
    /// New credentials were entered, tested and stored.
    Provisioned,
    /// Nobody provisioned the device in time; running offline.
    TimedOut,
}

/// What the AP session does with one request.
enum Submission {
    /// Not a credential submission; answer with this page.
    Page(HttpResponse),
    /// A well-formed `/connect` request.
    Candidate(WifiCredentials),
}

// ───────────────────────────────────────────────────────────────
// Provisioner
// ───────────────────────────────────────────────────────────────

pub struct Provisioner {
    state: ProvisioningState,
    station_attempts: u8,
    credential_test_timeout: Duration,
    ap_ssid: heapless::String<32>,
    ap_password: heapless::String<64>,
    ap_session_timeout: Duration,
}

impl Provisioner {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            state: ProvisioningState::StationConnect,
            station_attempts: config.station_connect_attempts.max(1),
            credential_test_timeout: Duration::from_secs(u64::from(
                config.credential_test_timeout_secs,
            )),
            ap_ssid: config.ap_ssid.clone(),
            ap_password: config.ap_password.clone(),
            ap_session_timeout: Duration::from_secs(u64::from(config.ap_session_timeout_secs)),
        }
    }

    pub fn state(&self) -> ProvisioningState {
        self.state
    }

    /// Run the machine to DONE.
    ///
    /// Errors only when the access point itself cannot be started; every
    /// other failure is handled inside the session.
    pub fn run(
        &mut self,
        wifi: &mut impl WifiPort,
        store: &mut impl CredentialStore,
        listener: &mut impl HttpListener,
        clock: &mut impl Clock,
        sink: &mut impl EventSink,
    ) -> Result<ProvisioningOutcome, Error> {
        self.enter(ProvisioningState::StationConnect, sink);
        if self.connect_stored(wifi, store, clock) {
            return Ok(self.finish(ProvisioningOutcome::Connected, sink));
        }

        self.enter(ProvisioningState::ApFallback, sink);
        if let Err(e) = wifi.start_access_point(&self.ap_ssid, &self.ap_password) {
            warn!("Provisioning: access point failed: {}", e);
            return Err(Error::from(e));
        }
        info!("Provisioning: access point '{}' up", self.ap_ssid);
        let networks = wifi.scan();

        let outcome = self.serve_session(wifi, store, listener, clock, sink, &networks);
        wifi.stop_access_point();
        Ok(self.finish(outcome, sink))
    }

    // ── STATION_CONNECT ───────────────────────────────────────

    fn connect_stored(
        &mut self,
        wifi: &mut impl WifiPort,
        store: &impl CredentialStore,
        clock: &mut impl Clock,
    ) -> bool {
        let creds = match store.load_credentials() {
            Ok(Some(c)) => c,
            Ok(None) => {
                info!("Provisioning: no stored credentials");
                return false;
            }
            Err(e) => {
                warn!("Provisioning: credential record unreadable ({})", e);
                return false;
            }
        };
        if let Err(e) = creds.validate() {
            warn!("Provisioning: stored credentials invalid ({})", e);
            return false;
        }

        info!("Provisioning: connecting to '{}'", creds.ssid);
        if let Err(e) = wifi.begin_connect(&creds) {
            warn!("Provisioning: cannot start station connection ({})", e);
            return false;
        }
        // One association, polled; a second begin_connect would restart it.
        for poll in 1..=self.station_attempts {
            clock.sleep(POLL_INTERVAL);
            if wifi.is_connected() {
                return true;
            }
            info!(
                "Provisioning: waiting for '{}' ({}/{})",
                creds.ssid, poll, self.station_attempts
            );
        }
        wifi.disconnect();
        warn!(
            "Provisioning: {}",
            Error::from(ConnectivityError::ConnectionFailed)
        );
        false
    }

    // ── AP_FALLBACK / CREDENTIAL_TEST / PERSIST ───────────────

    fn serve_session<S: AsRef<str>>(
        &mut self,
        wifi: &mut impl WifiPort,
        store: &mut impl CredentialStore,
        listener: &mut impl HttpListener,
        clock: &mut impl Clock,
        sink: &mut impl EventSink,
        networks: &[S],
    ) -> ProvisioningOutcome {
        let deadline = clock.now() + self.ap_session_timeout;

        loop {
            if wifi.is_connected() {
                info!("Provisioning: station associated, leaving AP mode");
                return ProvisioningOutcome::Connected;
            }
            let now = clock.now();
            if now >= deadline {
                warn!("Provisioning: AP session timed out, running offline");
                return ProvisioningOutcome::TimedOut;
            }

            let req = match listener.next_request((deadline - now).min(LISTEN_SLICE)) {
                Ok(Some(req)) => req,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Provisioning: listener error ({})", e);
                    clock.sleep(LISTEN_SLICE);
                    continue;
                }
            };

            let candidate = match route(&req, networks) {
                Submission::Page(resp) => {
                    respond(listener, &resp);
                    continue;
                }
                Submission::Candidate(c) => c,
            };

            if self.test_and_persist(&candidate, wifi, store, listener, clock, sink) {
                return ProvisioningOutcome::Provisioned;
            }
            self.enter(ProvisioningState::ApFallback, sink);
        }
    }

    /// CREDENTIAL_TEST then PERSIST for one submission.  Always answers the
    /// pending request.  Returns `true` when the device is provisioned.
    fn test_and_persist(
        &mut self,
        candidate: &WifiCredentials,
        wifi: &mut impl WifiPort,
        store: &mut impl CredentialStore,
        listener: &mut impl HttpListener,
        clock: &mut impl Clock,
        sink: &mut impl EventSink,
    ) -> bool {
        self.enter(ProvisioningState::CredentialTest, sink);
        if !self.live_test(candidate, wifi, clock) {
            let err = Error::from(CredentialError::Rejected);
            sink.emit(&AppEvent::CredentialsRejected(err));
            let reason = CredentialError::Rejected.to_string();
            respond(
                listener,
                &HttpResponse::html(200, pages::error_page(&candidate.ssid, &reason)),
            );
            return false;
        }

        self.enter(ProvisioningState::Persist, sink);
        let saved = store.save_credentials(candidate).or_else(|e| {
            warn!("Provisioning: credential write failed ({}), retrying", e);
            store.save_credentials(candidate)
        });
        if let Err(e) = saved {
            let err = Error::from(e);
            warn!("Provisioning: {}", err);
            sink.emit(&AppEvent::PersistenceFailed(err));
            wifi.disconnect();
            respond(
                listener,
                &HttpResponse::html(
                    200,
                    pages::error_page(&candidate.ssid, "the credentials could not be saved"),
                ),
            );
            return false;
        }

        info!("Provisioning: credentials for '{}' stored", candidate.ssid);
        respond(
            listener,
            &HttpResponse::html(200, pages::success_page(&candidate.ssid)),
        );
        true
    }

    /// Associate with `candidate` within the credential-test budget.
    fn live_test(
        &self,
        candidate: &WifiCredentials,
        wifi: &mut impl WifiPort,
        clock: &mut impl Clock,
    ) -> bool {
        if let Err(e) = wifi.begin_connect(candidate) {
            warn!("Provisioning: cannot start test connection ({})", e);
            return false;
        }
        let polls = (self.credential_test_timeout.as_secs()).max(1);
        for _ in 0..polls {
            clock.sleep(POLL_INTERVAL);
            if wifi.is_connected() {
                return true;
            }
        }
        warn!("Provisioning: '{}' did not associate", candidate.ssid);
        wifi.disconnect();
        false
    }

    // ── Bookkeeping ───────────────────────────────────────────

    fn enter(&mut self, state: ProvisioningState, sink: &mut impl EventSink) {
        self.state = state;
        sink.emit(&AppEvent::Provisioning(state));
    }

    fn finish(
        &mut self,
        outcome: ProvisioningOutcome,
        sink: &mut impl EventSink,
    ) -> ProvisioningOutcome {
        self.enter(ProvisioningState::Done, sink);
        sink.emit(&AppEvent::ProvisioningFinished(outcome));
        outcome
    }
}

/// Classify one request received on the access point.
fn route<S: AsRef<str>>(req: &HttpRequest, networks: &[S]) -> Submission {
    if req.method != Method::Get {
        return Submission::Page(HttpResponse::bad_request());
    }
    if req.path != "/connect" {
        return Submission::Page(HttpResponse::html(200, pages::form_page(networks)));
    }

    let ssid = req.param("network").unwrap_or_default();
    let password = req.param("password").unwrap_or_default();
    match WifiCredentials::new(ssid, password) {
        Ok(c) => Submission::Candidate(c),
        Err(e) => {
            warn!("Provisioning: {}", Error::from(e));
            Submission::Page(HttpResponse::html(
                200,
                pages::error_page(ssid, &e.to_string()),
            ))
        }
    }
}

fn respond(listener: &mut impl HttpListener, resp: &HttpResponse) {
    if let Err(e) = listener.respond(resp) {
        warn!("Provisioning: response not delivered ({})", e);
    }
}
