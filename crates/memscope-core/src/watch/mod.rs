//! # Watching
//!
//! Two ways of keeping values on screen: live inspect surfaces that re-read
//! one address after every edit, and the watch list whose entries are
//! refreshed on an external trigger.

pub mod list;
pub mod poller;

pub use list::{WatchEntry, WatchEntryId, WatchList};
pub use poller::{InspectFields, LiveWatchPoller, SurfaceId};
