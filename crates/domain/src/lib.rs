//! # linescript-domain
//!
//! Pure domain model for the linescript line-automation runtime.
//!
//! ## Responsibilities
//! - Foundational types: channel identifiers, error conventions, timestamps
//! - Define **Channels** (addressable communication lines and their events)
//! - Define **Log entries** (the bounded activity record shown to observers)
//! - Define the **Automation state** (script, active channel, last error)
//! - Byte/hex **codecs** shared by the send path and the script sandbox
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod automation;
pub mod channel;
pub mod codec;
pub mod log;
