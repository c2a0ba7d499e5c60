use serde::Serialize;
use std::fmt::{Display, Formatter};

use super::OwnedHandle;
use crate::error::{AclError, AclResult};
use crate::object::AccessMask;
use crate::platform::{self, Platform, SecurityTarget};

/// Prefix `name` with `<namespace>\` unless it already names a namespace.
pub fn qualify_event_name(namespace: &str, name: &str) -> String {
    if name.contains('\\') || namespace.is_empty() { name.to_string() } else { format!("{}\\{}", namespace, name) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    Signaled,
    NotSignaled,
}

impl Display for EventState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EventState::Signaled => "Signaled",
            EventState::NotSignaled => "Not signaled",
        })
    }
}

pub struct EventSession<'p> {
    platform: &'p dyn Platform,
    name: String,
    handle: OwnedHandle<'p>,
}

impl<'p> EventSession<'p> {
    /// `name` must already be qualified.
    pub fn open(platform: &'p dyn Platform, name: &str, access: AccessMask) -> AclResult<Self> {
        let raw = platform
            .open_event(name, access)
            .map_err(|code| platform::failure(platform, AclError::open, "OpenEvent", code))?;
        Ok(Self { platform, name: name.to_string(), handle: OwnedHandle::new(platform, raw, "event") })
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn target(&self) -> SecurityTarget<'static> { self.handle.target() }

    pub fn set(&self) -> AclResult<()> {
        self.platform
            .set_event(self.handle.raw())
            .map_err(|code| platform::failure(self.platform, AclError::action, "SetEvent", code))
    }

    pub fn unset(&self) -> AclResult<()> {
        self.platform
            .reset_event(self.handle.raw())
            .map_err(|code| platform::failure(self.platform, AclError::action, "ResetEvent", code))
    }

    /// Zero-timeout probe of the signal state.
    pub fn query(&self) -> AclResult<EventState> {
        match self.platform.probe_event(self.handle.raw()) {
            Ok(true) => Ok(EventState::Signaled),
            Ok(false) => Ok(EventState::NotSignaled),
            Err(code) => Err(platform::failure(self.platform, AclError::action, "WaitForSingleObject", code)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::rights;
    use crate::testing::FakePlatform;

    #[test]
    fn qualification() {
        assert_eq!(qualify_event_name("Global", "Foo"), r"Global\Foo");
        assert_eq!(qualify_event_name("Global", r"Local\Foo"), r"Local\Foo");
        assert_eq!(qualify_event_name("Session\\2", "Foo"), r"Session\2\Foo");
        assert_eq!(qualify_event_name("", "Foo"), "Foo");
    }

    #[test]
    fn set_unset_query() {
        let fake = FakePlatform::new();
        fake.add_event(r"Global\Ready", false);
        {
            let s = EventSession::open(&fake, r"Global\Ready", rights::EVENT_MODIFY_STATE | rights::SYNCHRONIZE).unwrap();
            assert_eq!(s.query().unwrap(), EventState::NotSignaled);
            s.set().unwrap();
            assert_eq!(s.query().unwrap(), EventState::Signaled);
            s.unset().unwrap();
            assert_eq!(s.query().unwrap(), EventState::NotSignaled);
        }
        assert_eq!(fake.open_handle_count(), 0);
    }

    #[test]
    fn query_without_synchronize_is_an_action_error() {
        let fake = FakePlatform::new();
        fake.add_event(r"Global\Ready", true);
        let s = EventSession::open(&fake, r"Global\Ready", rights::EVENT_MODIFY_STATE).unwrap();
        let err = s.query().unwrap_err();
        assert_eq!(err.kind_str(), "action");
        assert_eq!(err.code_str(), "WaitForSingleObject");
    }

    #[test]
    fn missing_event_fails_open() {
        let fake = FakePlatform::new();
        let err = EventSession::open(&fake, r"Global\Nope", rights::SYNCHRONIZE).err().unwrap();
        assert_eq!(err.kind_str(), "object_open");
        assert_eq!(err.to_string(), "OpenEvent: 0x2 (The system cannot find the file specified.)");
    }
}
