//! Object sessions: one open object per invocation.
//!
//! Each session owns the handle(s) it opened and closes them on drop, so a
//! session cannot outlive the invocation that created it and every exit path
//! releases the handle.

pub mod event;
pub mod file;
pub mod process;
pub mod service;

pub use event::{qualify_event_name, EventSession, EventState};
pub use file::FileSession;
pub use process::ProcessSession;
pub use service::{ServiceSession, ServiceState};

use tracing::{debug, warn};

use crate::error::status_message;
use crate::platform::{Platform, RawHandle, SecurityTarget};

/// A kernel handle closed through `CloseHandle` on drop.
pub(crate) struct OwnedHandle<'p> {
    platform: &'p dyn Platform,
    raw: RawHandle,
    what: &'static str,
}

impl<'p> OwnedHandle<'p> {
    pub(crate) fn new(platform: &'p dyn Platform, raw: RawHandle, what: &'static str) -> Self {
        debug!(target: "acltool::session", handle = raw.0, "{} opened", what);
        Self { platform, raw, what }
    }

    pub(crate) fn raw(&self) -> RawHandle { self.raw }

    pub(crate) fn target(&self) -> SecurityTarget<'static> { SecurityTarget::Handle(self.raw) }
}

impl Drop for OwnedHandle<'_> {
    fn drop(&mut self) {
        match self.platform.close_handle(self.raw) {
            Ok(()) => debug!(target: "acltool::session", handle = self.raw.0, "{} closed", self.what),
            Err(code) => warn!(
                target: "acltool::session",
                handle = self.raw.0,
                "failed to close {}: {}",
                self.what,
                status_message(code, &self.platform.describe_error(code))
            ),
        }
    }
}
