//! Security-descriptor mutations: harden, weaken and take ownership.
//!
//! Every mutation resolves its SIDs fresh from the platform, echoes what it is
//! about to apply (`Setting DACL: ...`, `Setting Owner: ...`) and then applies
//! it. Harden is two separate steps, DACL then owner, with no rollback: a
//! failed owner step leaves the new DACL in place.

use tracing::debug;

use crate::acl::{AccessControlEntry, Dacl};
use crate::error::{AclError, AclResult};
use crate::object::{Mutation, ObjectKind};
use crate::platform::{self, Platform, SecurityTarget};
use crate::sid::{Sid, Trustee};

/// What a mutation applied, for the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub dacl: Option<String>,
    pub owner: Option<String>,
}

fn sid_for(platform: &dyn Platform, trustee: Trustee) -> AclResult<Sid> {
    platform
        .well_known_sid(trustee)
        .map_err(|code| platform::failure(platform, AclError::identifier, &format!("CreateWellKnownSid ({})", trustee), code))
}

fn apply_dacl(platform: &dyn Platform, target: &SecurityTarget<'_>, kind: ObjectKind, dacl: &Dacl) -> AclResult<String> {
    let sddl = dacl.to_sddl();
    println!("Setting DACL: {}", sddl);
    let native = platform
        .build_acl(dacl)
        .map_err(|code| platform::failure(platform, AclError::acl_build, "SetEntriesInAcl", code))?;
    let api = match target {
        SecurityTarget::Handle(_) => "SetSecurityInfo (DACL)",
        SecurityTarget::Named(_) => "SetNamedSecurityInfo (DACL)",
    };
    platform
        .set_dacl(target, kind.security_type(), &native)
        .map_err(|code| platform::failure(platform, AclError::acl_apply, api, code))?;
    debug!(target: "acltool::mutator", %sddl, "DACL applied");
    Ok(sddl)
}

fn apply_owner(platform: &dyn Platform, target: &SecurityTarget<'_>, kind: ObjectKind, owner: &Sid) -> AclResult<String> {
    println!("Setting Owner: {}", owner);
    let api = match target {
        SecurityTarget::Handle(_) => "SetSecurityInfo (Owner)",
        SecurityTarget::Named(_) => "SetNamedSecurityInfo (Owner)",
    };
    platform
        .set_owner(target, kind.security_type(), owner)
        .map_err(|code| platform::failure(platform, AclError::ownership, api, code))?;
    debug!(target: "acltool::mutator", owner = %owner, "owner applied");
    Ok(owner.to_string())
}

/// Replace the DACL with SYSTEM full access plus INTERACTIVE restricted
/// access, then make SYSTEM the owner. The owner step is skipped if the DACL
/// step fails.
pub fn harden(platform: &dyn Platform, target: &SecurityTarget<'_>, kind: ObjectKind) -> AclResult<MutationRecord> {
    let system = sid_for(platform, Trustee::LocalSystem)?;
    let interactive = sid_for(platform, Trustee::Interactive)?;
    let dacl = Dacl::replacement(vec![
        AccessControlEntry::grant(Trustee::LocalSystem, system.clone(), kind.full_access()),
        AccessControlEntry::grant(Trustee::Interactive, interactive, kind.interactive_access()),
    ])?;
    let sddl = apply_dacl(platform, target, kind, &dacl)?;
    let owner = apply_owner(platform, target, kind, &system)?;
    Ok(MutationRecord { dacl: Some(sddl), owner: Some(owner) })
}

/// Replace the DACL with a single Everyone full-access entry. The owner is untouched.
pub fn weaken(platform: &dyn Platform, target: &SecurityTarget<'_>, kind: ObjectKind) -> AclResult<MutationRecord> {
    let world = sid_for(platform, Trustee::World)?;
    let dacl = Dacl::replacement(vec![AccessControlEntry::grant(Trustee::World, world, kind.full_access())])?;
    let sddl = apply_dacl(platform, target, kind, &dacl)?;
    Ok(MutationRecord { dacl: Some(sddl), owner: None })
}

pub fn apply(platform: &dyn Platform, mutation: Mutation, target: &SecurityTarget<'_>, kind: ObjectKind) -> AclResult<MutationRecord> {
    match mutation {
        Mutation::Harden => harden(platform, target, kind),
        Mutation::TakeOwn => take_ownership(platform, target, kind),
        Mutation::Weaken => weaken(platform, target, kind),
    }
}

/// Make BUILTIN\Administrators the owner. The DACL is untouched.
pub fn take_ownership(platform: &dyn Platform, target: &SecurityTarget<'_>, kind: ObjectKind) -> AclResult<MutationRecord> {
    let admins = sid_for(platform, Trustee::BuiltinAdministrators)?;
    let owner = apply_owner(platform, target, kind, &admins)?;
    Ok(MutationRecord { dacl: None, owner: Some(owner) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::rights;
    use crate::platform::status;
    use crate::testing::{Call, FakePlatform};

    fn open_event(fake: &FakePlatform, name: &str) -> SecurityTarget<'static> {
        fake.add_event(name, false);
        let h = fake.open_event(name, rights::WRITE_DAC | rights::WRITE_OWNER).unwrap();
        SecurityTarget::Handle(h)
    }

    #[test]
    fn harden_applies_two_entries_then_system_owner() {
        let fake = FakePlatform::new();
        fake.set_privilege(crate::privilege::Privilege::Restore, true).unwrap();
        let target = open_event(&fake, r"Global\e1");
        let rec = harden(&fake, &target, ObjectKind::Event).unwrap();
        assert_eq!(rec.dacl.as_deref(), Some("D:(A;;0x1f0003;;;SY)(A;;0x100000;;;IU)"));
        assert_eq!(rec.owner.as_deref(), Some("S-1-5-18"));
        assert_eq!(
            fake.dacl_of(ObjectKind::Event, r"Global\e1"),
            Some(vec![(Trustee::LocalSystem, rights::EVENT_ALL_ACCESS), (Trustee::Interactive, rights::SYNCHRONIZE)])
        );
        assert_eq!(fake.owner_of(ObjectKind::Event, r"Global\e1"), Some(Trustee::LocalSystem));
    }

    #[test]
    fn harden_skips_owner_after_dacl_failure() {
        let fake = FakePlatform::new();
        let target = open_event(&fake, r"Global\e2");
        fake.fail_on("set_dacl", status::ERROR_ACCESS_DENIED);
        let err = harden(&fake, &target, ObjectKind::Event).unwrap_err();
        assert_eq!(err.kind_str(), "acl_apply");
        assert_eq!(err.to_string(), "SetSecurityInfo (DACL): 0x5 (Access is denied.)");
        assert!(!fake.calls().iter().any(|c| matches!(c, Call::SetOwner { .. })));
    }

    #[test]
    fn harden_keeps_dacl_when_owner_fails() {
        let fake = FakePlatform::new();
        let target = open_event(&fake, r"Global\e3");
        // Without Restore the fake refuses SYSTEM as owner.
        let err = harden(&fake, &target, ObjectKind::Event).unwrap_err();
        assert_eq!(err.kind_str(), "ownership_apply");
        assert_eq!(fake.dacl_of(ObjectKind::Event, r"Global\e3").map(|d| d.len()), Some(2));
        assert_eq!(fake.owner_of(ObjectKind::Event, r"Global\e3"), None);
    }

    #[test]
    fn weaken_grants_everyone_and_leaves_owner() {
        let fake = FakePlatform::new();
        fake.add_service("Spooler", 4);
        fake.set_object_security(ObjectKind::Service, "Spooler", vec![(Trustee::World, rights::WRITE_DAC)], Some(Trustee::BuiltinAdministrators));
        let scm = fake.open_service_manager(rights::SC_MANAGER_CONNECT).unwrap();
        let h = fake.open_service(scm, "Spooler", rights::WRITE_DAC).unwrap();
        let rec = weaken(&fake, &SecurityTarget::Handle(h), ObjectKind::Service).unwrap();
        assert_eq!(rec.dacl.as_deref(), Some("D:(A;;0xf01ff;;;WD)"));
        assert_eq!(rec.owner, None);
        assert_eq!(fake.owner_of(ObjectKind::Service, "Spooler"), Some(Trustee::BuiltinAdministrators));
    }

    #[test]
    fn identifier_failures_stop_before_any_apply() {
        let fake = FakePlatform::new();
        let target = open_event(&fake, r"Global\e4");
        fake.fail_on("well_known_sid", status::ERROR_INVALID_PARAMETER);
        let err = take_ownership(&fake, &target, ObjectKind::Event).unwrap_err();
        assert_eq!(err.kind_str(), "identifier_resolution");
        assert_eq!(err.code_str(), "CreateWellKnownSid (Administrators)");
        assert!(!fake.calls().iter().any(|c| matches!(c, Call::SetOwner { .. } | Call::SetDacl { .. })));
    }

    #[test]
    fn build_failure_maps_to_acl_build() {
        let fake = FakePlatform::new();
        fake.add_file(r"C:\x.txt");
        fake.fail_on("build_acl", status::ERROR_INVALID_ACL);
        let err = weaken(&fake, &SecurityTarget::Named(r"C:\x.txt"), ObjectKind::File).unwrap_err();
        assert_eq!(err.kind_str(), "acl_build");
    }
}
