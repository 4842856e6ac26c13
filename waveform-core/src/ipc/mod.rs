//! Types published to render hosts.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so a host can
//! forward them over whatever transport it uses.

pub mod events;
