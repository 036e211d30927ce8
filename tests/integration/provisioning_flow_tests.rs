//! Integration tests for the provisioning state machine.
//!
//! STATION_CONNECT → AP_FALLBACK → CREDENTIAL_TEST → PERSIST → DONE,
//! driven through mock radio, store and listener on the virtual clock.

use std::time::Duration;

use greenhouse::app::events::AppEvent;
use greenhouse::app::ports::{Clock, WifiPort};
use greenhouse::config::SystemConfig;
use greenhouse::error::{ConnectivityError, CredentialError, Error};
use greenhouse::provisioning::{
    Provisioner, ProvisioningOutcome, ProvisioningState, WifiCredentials,
};

use crate::mock_hw::*;

struct Rig {
    clock: FakeClock,
    wifi: MockWifi,
    store: MockStore,
    listener: MockListener,
    sink: RecordingSink,
}

impl Rig {
    fn new(mut wifi: MockWifi, store: MockStore) -> Self {
        let clock = FakeClock::new();
        wifi.clock = clock.clone();
        Self {
            listener: MockListener::new(clock.clone()),
            clock,
            wifi,
            store,
            sink: RecordingSink::default(),
        }
    }

    fn run(&mut self) -> Result<ProvisioningOutcome, Error> {
        let mut provisioner = Provisioner::new(&SystemConfig::default());
        let outcome = provisioner.run(
            &mut self.wifi,
            &mut self.store,
            &mut self.listener,
            &mut self.clock,
            &mut self.sink,
        );
        if outcome.is_ok() {
            assert_eq!(provisioner.state(), ProvisioningState::Done);
        }
        outcome
    }

    fn entered(&self, state: ProvisioningState) -> usize {
        self.sink
            .count(|e| matches!(e, AppEvent::Provisioning(s) if *s == state))
    }
}

#[test]
fn stored_credentials_connect_without_ap() {
    let mut rig = Rig::new(
        MockWifi::with_network("Barn", "hayloft99"),
        MockStore::holding("Barn", "hayloft99"),
    );

    assert_eq!(rig.run(), Ok(ProvisioningOutcome::Connected));
    assert_eq!(rig.wifi.ap_started, 0);
    assert_eq!(rig.wifi.connect_calls, 1);
    assert!(rig.wifi.is_connected());
    assert_eq!(rig.entered(ProvisioningState::ApFallback), 0);
}

#[test]
fn stored_credentials_survive_slow_association() {
    let mut wifi = MockWifi::with_network("Barn", "hayloft99");
    wifi.association_delay = Duration::from_millis(3_500);
    let mut rig = Rig::new(wifi, MockStore::holding("Barn", "hayloft99"));

    assert_eq!(rig.run(), Ok(ProvisioningOutcome::Connected));
    assert_eq!(rig.wifi.connect_calls, 1);
    assert_eq!(rig.wifi.ap_started, 0);
    assert_eq!(rig.clock.now(), Duration::from_secs(4));
}

#[test]
fn stored_network_slower_than_the_poll_budget_falls_back_to_ap() {
    let mut wifi = MockWifi::with_network("Barn", "hayloft99");
    wifi.association_delay = Duration::from_secs(6);
    let mut rig = Rig::new(wifi, MockStore::holding("Barn", "hayloft99"));
    rig.listener.push("GET /connect?network=Barn&password=hayloft99");

    assert_eq!(rig.run(), Ok(ProvisioningOutcome::Provisioned));
    // The stored attempt plus the live test of the submitted form.
    assert_eq!(rig.wifi.connect_calls, 2);
    assert_eq!(rig.entered(ProvisioningState::ApFallback), 1);
}

#[test]
fn valid_submission_is_tested_and_persisted() {
    let mut rig = Rig::new(MockWifi::with_network("Barn", "hayloft99"), MockStore::default());
    rig.listener.push("GET /");
    rig.listener.push("GET /connect?network=Barn&password=hayloft99");

    assert_eq!(rig.run(), Ok(ProvisioningOutcome::Provisioned));

    assert_eq!(
        rig.store.record,
        Some(WifiCredentials::new("Barn", "hayloft99").unwrap())
    );
    assert_eq!(rig.listener.responses.len(), 2);
    assert!(rig.listener.body(0).contains("Barn"));
    assert!(rig.listener.body(0).contains("<form"));
    assert_eq!(rig.listener.responses[1].status, 200);
    assert!(rig.listener.body(1).contains("Barn"));
    assert!(rig.listener.body(1).contains("saved"));

    assert!(!rig.wifi.ap_up);
    assert_eq!(rig.entered(ProvisioningState::CredentialTest), 1);
    assert_eq!(rig.entered(ProvisioningState::Persist), 1);
    assert!(matches!(
        rig.sink.events.last(),
        Some(AppEvent::ProvisioningFinished(ProvisioningOutcome::Provisioned))
    ));
}

#[test]
fn percent_encoded_submission_is_decoded() {
    let mut rig = Rig::new(
        MockWifi::with_network("Barn WiFi", "hay loft&99"),
        MockStore::default(),
    );
    rig.listener.push("GET /connect?network=Barn+WiFi&password=hay%20loft%2699");

    assert_eq!(rig.run(), Ok(ProvisioningOutcome::Provisioned));
    let stored = rig.store.record.as_ref().unwrap();
    assert_eq!(stored.ssid.as_str(), "Barn WiFi");
    assert_eq!(stored.password.as_str(), "hay loft&99");
}

#[test]
fn rejected_and_malformed_submissions_leave_store_untouched() {
    let mut rig = Rig::new(
        MockWifi::with_network("Barn", "hayloft99"),
        MockStore::holding("OldNet", "oldpassword"),
    );
    rig.listener.push("GET /connect?network=Barn&password=wrongpass");
    rig.listener.push("GET /connect?network=Barn&password=short");

    assert_eq!(rig.run(), Ok(ProvisioningOutcome::TimedOut));

    assert_eq!(
        rig.store.record,
        Some(WifiCredentials::new("OldNet", "oldpassword").unwrap())
    );
    assert_eq!(rig.store.write_attempts, 0);

    assert_eq!(rig.listener.responses.len(), 2);
    assert!(rig.listener.body(0).contains("did not accept"));
    assert!(rig.listener.body(1).contains("password invalid"));
    // One stored-credential association plus one live test; the malformed
    // password never reaches the radio.
    assert_eq!(rig.wifi.connect_calls, 2);
    assert_eq!(
        rig.sink.count(|e| matches!(
            e,
            AppEvent::CredentialsRejected(Error::CredentialInvalid(CredentialError::Rejected))
        )),
        1
    );
    assert!(!rig.wifi.ap_up);
}

#[test]
fn persistence_failure_is_retried_once() {
    let mut rig = Rig::new(MockWifi::with_network("Barn", "hayloft99"), MockStore::default());
    rig.store.failing_writes = 1;
    rig.listener.push("GET /connect?network=Barn&password=hayloft99");

    assert_eq!(rig.run(), Ok(ProvisioningOutcome::Provisioned));
    assert_eq!(rig.store.write_attempts, 2);
    assert!(rig.store.record.is_some());
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::PersistenceFailed(_))), 0);
}

#[test]
fn persistent_write_failure_returns_to_access_point() {
    let mut rig = Rig::new(MockWifi::with_network("Barn", "hayloft99"), MockStore::default());
    rig.store.failing_writes = 2;
    rig.listener.push("GET /connect?network=Barn&password=hayloft99");
    rig.listener.push("GET /connect?network=Barn&password=hayloft99");

    assert_eq!(rig.run(), Ok(ProvisioningOutcome::Provisioned));

    // Two writes for the first submission, one for the second.
    assert_eq!(rig.store.write_attempts, 3);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::PersistenceFailed(_))), 1);
    assert!(rig.listener.body(0).contains("could not be saved"));
    assert!(rig.listener.body(1).contains("saved successfully"));
    assert_eq!(rig.entered(ProvisioningState::ApFallback), 2);
}

#[test]
fn unattended_session_times_out() {
    let mut rig = Rig::new(MockWifi::default(), MockStore::default());

    assert_eq!(rig.run(), Ok(ProvisioningOutcome::TimedOut));

    assert!(rig.clock.now() >= Duration::from_secs(900));
    assert!(rig.clock.now() < Duration::from_secs(902));
    assert!(!rig.wifi.ap_up);
    assert_eq!(rig.wifi.ap_started, 1);
    assert!(rig.store.record.is_none());
}

#[test]
fn access_point_failure_is_reported() {
    let mut wifi = MockWifi::default();
    wifi.ap_fails = true;
    let mut rig = Rig::new(wifi, MockStore::default());

    assert_eq!(
        rig.run().err(),
        Some(Error::NetworkUnavailable(ConnectivityError::AccessPointFailed))
    );
}
