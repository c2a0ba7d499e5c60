//! Replacement DACLs.
//!
//! Entries are always grant-only and non-inheritable, and a [`Dacl`] is
//! always applied as the object's whole discretionary list; nothing here
//! reads or merges an existing ACL.

use serde::Serialize;

use crate::error::{AclError, AclResult};
use crate::object::AccessMask;
use crate::sid::{Sid, Trustee};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessControlEntry {
    pub trustee: Trustee,
    pub sid: Sid,
    pub rights: AccessMask,
}

impl AccessControlEntry {
    pub fn grant(trustee: Trustee, sid: Sid, rights: AccessMask) -> Self {
        Self { trustee, sid, rights }
    }

    /// `(A;;<mask>;;;<sid>)`, using the SDDL alias where one exists.
    pub fn to_sddl(&self) -> String {
        let who = match self.sid.sddl_alias() {
            Some(alias) => alias.to_string(),
            None => self.sid.to_string(),
        };
        format!("(A;;{};;;{})", self.rights, who)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dacl {
    entries: Vec<AccessControlEntry>,
}

impl Dacl {
    /// Validate an entry list for use as a complete replacement DACL.
    /// An empty list or an entry granting nothing is a build failure.
    pub fn replacement(entries: Vec<AccessControlEntry>) -> AclResult<Dacl> {
        if entries.is_empty() {
            return Err(AclError::acl_build("SetEntriesInAcl", "replacement DACL has no entries"));
        }
        if let Some(e) = entries.iter().find(|e| e.rights == AccessMask::NONE) {
            return Err(AclError::acl_build("SetEntriesInAcl", format!("entry for {} grants no rights", e.trustee)));
        }
        Ok(Dacl { entries })
    }

    pub fn entries(&self) -> &[AccessControlEntry] { &self.entries }

    pub fn trustees(&self) -> Vec<Trustee> { self.entries.iter().map(|e| e.trustee).collect() }

    pub fn to_sddl(&self) -> String {
        let mut out = String::from("D:");
        for e in &self.entries { out.push_str(&e.to_sddl()); }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::rights;

    #[test]
    fn two_entry_harden_sddl() {
        let dacl = Dacl::replacement(vec![
            AccessControlEntry::grant(Trustee::LocalSystem, Trustee::LocalSystem.canonical(), rights::EVENT_ALL_ACCESS),
            AccessControlEntry::grant(Trustee::Interactive, Trustee::Interactive.canonical(), rights::SYNCHRONIZE),
        ]).unwrap();
        assert_eq!(dacl.to_sddl(), "D:(A;;0x1f0003;;;SY)(A;;0x100000;;;IU)");
        assert_eq!(dacl.trustees(), vec![Trustee::LocalSystem, Trustee::Interactive]);
    }

    #[test]
    fn unaliased_sid_renders_in_full() {
        let ace = AccessControlEntry::grant(Trustee::World, Sid::from_parts(5, &[21, 7, 1001]), rights::FILE_ALL_ACCESS);
        assert_eq!(ace.to_sddl(), "(A;;0x1f01ff;;;S-1-5-21-7-1001)");
    }

    #[test]
    fn malformed_lists_fail_to_build() {
        assert_eq!(Dacl::replacement(vec![]).unwrap_err().kind_str(), "acl_build");
        let zero = AccessControlEntry::grant(Trustee::World, Trustee::World.canonical(), AccessMask::NONE);
        assert_eq!(Dacl::replacement(vec![zero]).unwrap_err().kind_str(), "acl_build");
    }
}
