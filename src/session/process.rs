use super::OwnedHandle;
use crate::error::{AclError, AclResult};
use crate::object::AccessMask;
use crate::platform::{self, Platform, SecurityTarget};

/// Exit code handed to `TerminateProcess`.
pub const TERMINATE_EXIT_CODE: u32 = 1;

pub struct ProcessSession<'p> {
    platform: &'p dyn Platform,
    pid: u32,
    handle: OwnedHandle<'p>,
}

impl<'p> ProcessSession<'p> {
    pub fn open(platform: &'p dyn Platform, pid: u32, access: AccessMask) -> AclResult<Self> {
        let raw = platform
            .open_process(pid, access)
            .map_err(|code| platform::failure(platform, AclError::open, "OpenProcess", code))?;
        Ok(Self { platform, pid, handle: OwnedHandle::new(platform, raw, "process") })
    }

    pub fn pid(&self) -> u32 { self.pid }

    pub fn target(&self) -> SecurityTarget<'static> { self.handle.target() }

    pub fn terminate(&self) -> AclResult<()> {
        self.platform
            .terminate_process(self.handle.raw(), TERMINATE_EXIT_CODE)
            .map_err(|code| platform::failure(self.platform, AclError::action, "TerminateProcess", code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::rights;
    use crate::testing::FakePlatform;

    #[test]
    fn terminate_uses_exit_code_one() {
        let fake = FakePlatform::new();
        fake.add_process(321, "worker.exe");
        ProcessSession::open(&fake, 321, rights::PROCESS_TERMINATE).unwrap().terminate().unwrap();
        assert_eq!(fake.exit_code_of(321), Some(1));
        assert_eq!(fake.open_handle_count(), 0);
        assert!(fake.list_processes().unwrap().is_empty());
    }

    #[test]
    fn unknown_pid_fails_open() {
        let fake = FakePlatform::new();
        let err = ProcessSession::open(&fake, 9, rights::PROCESS_TERMINATE).err().unwrap();
        assert_eq!(err.code_str(), "OpenProcess");
    }
}
