#![cfg_attr(not(test), no_std, no_main)]
// #![warn(missing_docs)]

//! Audio Stream Control Service (ASCS) server: the GATT-level state
//! engine an LE Audio "acceptor" uses to negotiate and operate audio
//! streams with a remote "initiator".
//!
//! The server exposes a set of Audio Stream Endpoints (ASEs); a remote
//! client reads each ASE's state/configuration and writes a single ASE
//! Control Point characteristic to drive every ASE through a
//! codec-negotiation -> QoS-negotiation -> enable -> stream ->
//! disable/release lifecycle. [`ascs::AscsServer`] is transport-agnostic
//! (see [`ascs::transport::GattTransport`]); wiring it to a live
//! `trouble-host` connection, registering its characteristics in an
//! `AttributeTable`, and dispatching GATT read/write callbacks into it
//! is left to the caller, matching the attribute-server wire mechanics
//! this crate treats as an external contract.

#[allow(dead_code)]
pub mod ascs;
#[allow(dead_code)]
pub mod generic_audio;

pub use ascs::{AscsInitError, AscsServer};
