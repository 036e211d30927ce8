//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the business rules of the running controller:
//! the periodic measure → decide → actuate → report cycle and the
//! status page served between cycles.  All interaction with hardware
//! happens through **port traits** defined in [`ports`], keeping this
//! layer fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
