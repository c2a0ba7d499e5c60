//! Engine-wide guarantees, checked against the in-memory platform:
//! least privilege, minimal masks, deterministic release, and validation
//! before any side effect.

use anyhow::Result;

use acltool::object::{rights, AccessMask, ObjectKind};
use acltool::platform::{status, SecurityTarget};
use acltool::privilege::{Privilege, SecurityContext};
use acltool::sid::Trustee;
use acltool::testing::{Call, FakePlatform};
use acltool::{Invocation, Orchestrator};

fn run(fake: &FakePlatform, kind: ObjectKind, target: &str, command: &str) -> acltool::AclResult<acltool::Outcome> {
    Orchestrator::new(fake).run(&Invocation::new(kind, target, command))
}

#[test]
fn none_guard_is_enabled_and_silent() -> Result<()> {
    let fake = FakePlatform::new();
    let ctx = SecurityContext::new(&fake);
    let guard = ctx.acquire(None)?;
    assert!(guard.is_enabled());
    drop(guard);
    assert!(fake.calls().is_empty());
    Ok(())
}

#[test]
fn failed_privilege_means_no_open() {
    let fake = FakePlatform::new();
    fake.add_process(77, "target.exe");
    fake.deny_privilege(Privilege::Debug, status::ERROR_NOT_ALL_ASSIGNED);
    let err = run(&fake, ObjectKind::Process, "77", "terminate").unwrap_err();
    assert_eq!(err.kind_str(), "privilege_acquisition");
    assert_eq!(err.exit_status(), 1);
    assert!(!fake.calls().iter().any(Call::is_open));
    assert_eq!(fake.exit_code_of(77), None);
}

#[test]
fn second_privilege_failure_unwinds_the_first() {
    let fake = FakePlatform::new();
    fake.add_file(r"C:\locked");
    fake.deny_privilege(Privilege::Restore, status::ERROR_PRIVILEGE_NOT_HELD);
    assert!(run(&fake, ObjectKind::File, r"C:\locked", "harden").is_err());
    assert_eq!(fake.privilege_log(), vec![
        (Privilege::TakeOwnership, true),
        (Privilege::Restore, true),
        (Privilege::TakeOwnership, false),
    ]);
    assert!(!fake.privilege_enabled(Privilege::TakeOwnership));
}

#[test]
fn privileges_release_lifo_on_success_and_failure() {
    for fail in [false, true] {
        let fake = FakePlatform::new();
        fake.add_service("Spooler", 4);
        if fail { fake.fail_on("set_owner", status::ERROR_INVALID_OWNER); }
        let result = run(&fake, ObjectKind::Service, "Spooler", "harden");
        assert_eq!(result.is_err(), fail);
        assert_eq!(fake.privilege_log(), vec![
            (Privilege::TakeOwnership, true),
            (Privilege::Restore, true),
            (Privilege::Restore, false),
            (Privilege::TakeOwnership, false),
        ]);
        assert_eq!(fake.open_handle_count(), 0);
    }
}

#[test]
fn opens_use_exactly_the_resolved_mask() {
    let fake = FakePlatform::new();
    fake.add_event(r"Global\Ev", false);
    fake.add_service("Svc", 1);
    run(&fake, ObjectKind::Event, "Ev", "set").unwrap();
    run(&fake, ObjectKind::Service, "Svc", "start").unwrap();
    run(&fake, ObjectKind::Service, "Svc", "stop").unwrap();
    let opens: Vec<Call> = fake.calls().into_iter().filter(Call::is_open).collect();
    assert_eq!(opens, vec![
        Call::OpenEvent(r"Global\Ev".into(), rights::EVENT_MODIFY_STATE),
        Call::OpenServiceManager(rights::SC_MANAGER_CONNECT),
        Call::OpenService("Svc".into(), rights::SERVICE_START),
        Call::OpenServiceManager(rights::SC_MANAGER_CONNECT),
        Call::OpenService("Svc".into(), rights::SERVICE_STOP),
    ]);
}

#[test]
fn harden_then_query_reports_not_signaled() -> Result<()> {
    let fake = FakePlatform::new();
    fake.add_event(r"Global\Gate", false);
    run(&fake, ObjectKind::Event, "Gate", "harden")?;
    // INTERACTIVE keeps SYNCHRONIZE, which is all query needs.
    let out = run(&fake, ObjectKind::Event, "Gate", "query")?;
    assert_eq!(out.summary(), "Event state  : Not signaled");
    Ok(())
}

#[test]
fn set_then_query_reports_signaled() -> Result<()> {
    let fake = FakePlatform::new();
    fake.add_event(r"Global\Gate", false);
    run(&fake, ObjectKind::Event, "Gate", "set")?;
    assert_eq!(run(&fake, ObjectKind::Event, "Gate", "query")?.summary(), "Event state  : Signaled");
    Ok(())
}

#[test]
fn weaken_then_harden_converges() -> Result<()> {
    for (kind, name) in [(ObjectKind::Event, "Conv"), (ObjectKind::Service, "ConvSvc"), (ObjectKind::Process, "900")] {
        let fake = FakePlatform::new();
        match kind {
            ObjectKind::Event => fake.add_event(r"Global\Conv", false),
            ObjectKind::Service => fake.add_service(name, 1),
            _ => fake.add_process(900, "conv.exe"),
        }
        let stored = if kind == ObjectKind::Event { r"Global\Conv".to_string() } else { name.to_string() };
        run(&fake, kind, name, "weaken")?;
        assert_eq!(fake.dacl_of(kind, &stored), Some(vec![(Trustee::World, kind.full_access())]));
        run(&fake, kind, name, "harden")?;
        let expected: Vec<(Trustee, AccessMask)> =
            vec![(Trustee::LocalSystem, kind.full_access()), (Trustee::Interactive, kind.interactive_access())];
        assert_eq!(fake.dacl_of(kind, &stored), Some(expected));
        assert_eq!(fake.owner_of(kind, &stored), Some(Trustee::LocalSystem));
    }
    Ok(())
}

#[test]
fn weaken_never_changes_owner() -> Result<()> {
    let fake = FakePlatform::new();
    fake.add_event(r"Global\Own", false);
    fake.set_object_security(ObjectKind::Event, r"Global\Own", vec![(Trustee::Interactive, rights::WRITE_DAC)], Some(Trustee::LocalSystem));
    run(&fake, ObjectKind::Event, "Own", "weaken")?;
    assert_eq!(fake.owner_of(ObjectKind::Event, r"Global\Own"), Some(Trustee::LocalSystem));
    assert!(!fake.calls().iter().any(|c| matches!(c, Call::SetOwner { .. })));
    Ok(())
}

#[test]
fn ambiguous_process_name_opens_nothing() {
    let fake = FakePlatform::new();
    fake.add_process(10, "notepad.exe");
    fake.add_process(11, "NOTEPAD.EXE");
    let err = run(&fake, ObjectKind::Process, "notepad", "terminate").unwrap_err();
    assert_eq!(err.kind_str(), "ambiguous_target");
    assert!(fake.privilege_log().is_empty());
    assert!(!fake.calls().iter().any(Call::is_open));
}

#[test]
fn missing_process_name_is_not_found() {
    let fake = FakePlatform::new();
    fake.add_process(10, "explorer.exe");
    let err = run(&fake, ObjectKind::Process, "ghost", "terminate").unwrap_err();
    assert_eq!(err.kind_str(), "target_not_found");
    assert_eq!(err.exit_status(), 1);
    assert!(!fake.calls().iter().any(Call::is_open));
}

#[test]
fn file_weaken_by_name_bypasses_denying_dacl() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("locked.bin");
    std::fs::write(&path, b"x")?;
    let path = path.to_string_lossy().to_string();

    let fake = FakePlatform::new();
    fake.add_file(&path);
    fake.set_object_security(ObjectKind::File, &path, vec![(Trustee::LocalSystem, rights::FILE_ALL_ACCESS)], Some(Trustee::LocalSystem));

    // Without Restore held the same by-name DACL write is refused.
    let denied = FakePlatform::new();
    denied.add_file(&path);
    denied.set_object_security(ObjectKind::File, &path, vec![(Trustee::LocalSystem, rights::FILE_ALL_ACCESS)], Some(Trustee::LocalSystem));
    let err = acltool::mutator::weaken(&denied, &SecurityTarget::Named(&path), ObjectKind::File).unwrap_err();
    assert_eq!(err.kind_str(), "acl_apply");
    assert_eq!(err.code_str(), "SetNamedSecurityInfo (DACL)");

    let out = run(&fake, ObjectKind::File, &path, "weaken")?;
    assert_eq!(out.summary(), "File ACL weakened successfully (Everyone has full access)");
    assert!(!fake.calls().iter().any(Call::is_open));
    assert_eq!(fake.dacl_of(ObjectKind::File, &path), Some(vec![(Trustee::World, rights::FILE_ALL_ACCESS)]));
    assert_eq!(fake.owner_of(ObjectKind::File, &path), Some(Trustee::LocalSystem));
    Ok(())
}

#[test]
fn unknown_command_touches_nothing() {
    for kind in ObjectKind::ALL {
        let fake = FakePlatform::new();
        let err = run(&fake, kind, "whatever", "frobnicate").unwrap_err();
        assert_eq!(err.kind_str(), "unknown_command");
        assert!(err.is_validation());
        assert!(fake.calls().is_empty(), "{} made calls: {:?}", kind, fake.calls());
    }
}
