//! Process-wide tracker instance.
//!
//! Most applications should build a [`Tracker`] and pass it around instead.

use crate::config::TrackerBuilder;
use crate::{Error, Tracker};
use std::sync::OnceLock;
use tracing::info;

static TRACKER: OnceLock<Tracker> = OnceLock::new();

/// Build and install the global tracker.
///
/// Fails with [`Error::AlreadyInitialized`] if called more than once.
pub fn init(builder: TrackerBuilder) -> Result<&'static Tracker, Error> {
    if TRACKER.get().is_some() {
        return Err(Error::AlreadyInitialized);
    }

    let instance = builder.build()?;
    TRACKER.set(instance).map_err(|_| Error::AlreadyInitialized)?;
    info!("global tracker initialized");

    tracker()
}

/// The global tracker, or [`Error::NotInitialized`] before [`init`].
pub fn tracker() -> Result<&'static Tracker, Error> {
    TRACKER.get().ok_or(Error::NotInitialized)
}

/// Whether [`init`] has completed.
pub fn is_initialized() -> bool {
    TRACKER.get().is_some()
}
