// src/db/models/mod.rs

//! Data models for persisted engine state

mod installed;
mod mirror_state;

pub use installed::InstalledRecord;
pub use mirror_state::MirrorState;
