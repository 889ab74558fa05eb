//! Flush boundary logging
mod common;

use common::{factory, id, seed_employee_with_info};
use graft_core::logging_facility::test_capture::init_test_capture;
use graft_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};

#[test]
fn test_flush_logs_start_and_end_with_plan_sizes() {
    let capture = init_test_capture();
    let mut factory = factory();
    seed_employee_with_info(&mut factory, "e1", "i1", "v1");

    let session_id = factory
        .from_transaction(|session| {
            let employee = session.get("Employee", &id("e1"))?.expect("employee e1");
            session.associate(employee, "info", None)?;
            session.flush()?;
            Ok(session.session_id().to_string())
        })
        .unwrap();

    let flush_events = capture.events_for_session("flush", &session_id);
    assert!(flush_events.iter().any(|e| e.is("flush", EVENT_START)));
    assert!(flush_events
        .iter()
        .any(|e| e.is("flush", EVENT_END) && e.field("orphan_deletes") == Some("1")));
    assert!(capture.scheduled_orphans().contains(&"i1".to_string()));
}

#[test]
fn test_failed_flush_logs_error_code() {
    let capture = init_test_capture();
    let mut factory = factory();
    seed_employee_with_info(&mut factory, "e1", "i1", "v1");
    factory
        .in_transaction(|session| {
            let info = session.get("EmployeeInfo", &id("i1"))?.expect("info");
            let badge = session.instantiate("Badge")?;
            session.set_association(badge, "info", Some(info))?;
            session.persist(badge)
        })
        .unwrap();

    let mut session_id = String::new();
    let _ = factory.in_transaction(|session| {
        session_id = session.session_id().to_string();
        let employee = session.get("Employee", &id("e1"))?.expect("employee e1");
        let info = session.association(employee, "info")?.expect("info");
        let badges = session.list("Badge")?;
        assert_eq!(badges.len(), 1);
        session.associate(employee, "info", None)?;
        assert!(session.association(info, "employee")?.is_none());
        session.flush().map(|_| ())
    });

    let errors: Vec<_> = capture
        .events_for_session("flush", &session_id)
        .into_iter()
        .filter(|e| e.is("flush", EVENT_END_ERROR))
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].field("err.code"),
        Some("ERR_CONFIGURATION_VIOLATION")
    );
    assert_eq!(errors[0].field("rollback_only"), Some("true"));
}
