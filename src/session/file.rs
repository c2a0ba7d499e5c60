use super::OwnedHandle;
use crate::error::{AclError, AclResult};
use crate::object::AccessMask;
use crate::platform::{self, Platform, SecurityTarget};

/// A file or directory opened for security changes.
pub struct FileSession<'p> {
    path: String,
    handle: OwnedHandle<'p>,
}

impl<'p> FileSession<'p> {
    pub fn open(platform: &'p dyn Platform, path: &str, access: AccessMask) -> AclResult<Self> {
        let raw = platform
            .open_file(path, access)
            .map_err(|code| platform::failure(platform, AclError::open, "CreateFile", code))?;
        Ok(Self { path: path.to_string(), handle: OwnedHandle::new(platform, raw, "file") })
    }

    pub fn path(&self) -> &str { &self.path }

    pub fn target(&self) -> SecurityTarget<'static> { self.handle.target() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::rights;
    use crate::testing::FakePlatform;

    #[test]
    fn opens_and_closes() {
        let fake = FakePlatform::new();
        fake.add_file(r"C:\data");
        {
            let s = FileSession::open(&fake, r"C:\data", rights::WRITE_OWNER).unwrap();
            assert_eq!(s.path(), r"C:\data");
            assert_eq!(fake.open_handle_count(), 1);
        }
        assert_eq!(fake.open_handle_count(), 0);
    }
}
