#![doc = include_str!("../../../README.md")]
//!

//! This crate bundles the state model and the network client.

pub use omix_client as client;
pub use omix_client::{
    ApiClient, DetailsSession, Notifier, ResultTableSession, SessionEvent, UPDATE_EXPERIMENTS,
};
pub use omix_core::*;
