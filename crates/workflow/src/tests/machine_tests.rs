use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Light {
    Red,
    Green,
}

struct Facts {
    maintenance: bool,
}

fn not_in_maintenance(facts: &Facts) -> Option<Blocker> {
    if facts.maintenance {
        Some(Blocker {
            code: "maintenance",
            message: "signal under maintenance",
        })
    } else {
        None
    }
}

fn machine() -> Machine<Light, Facts> {
    Machine::new(vec![
        TransitionDef {
            name: "go",
            from: Light::Red,
            to: Light::Green,
            guards: vec![not_in_maintenance],
            hooks: vec![],
        },
        TransitionDef {
            name: "stop",
            from: Light::Green,
            to: Light::Red,
            guards: vec![],
            hooks: vec![],
        },
    ])
}

#[test]
fn applies_defined_transition() {
    let m = machine();
    let facts = Facts { maintenance: false };
    assert_eq!(m.apply(Light::Red, &facts, "go").unwrap(), Light::Green);
}

#[test]
fn rejects_transition_undefined_from_current_state() {
    let m = machine();
    let facts = Facts { maintenance: false };
    assert!(!m.can(Light::Green, &facts, "go"));
    let rejection = m.apply(Light::Green, &facts, "go").unwrap_err();
    assert_eq!(rejection.current, Light::Green);
    assert!(rejection.blockers.is_empty());
    assert_eq!(rejection.enabled, vec!["stop"]);
}

#[test]
fn guard_blocks_with_reason() {
    let m = machine();
    let facts = Facts { maintenance: true };
    assert!(!m.can(Light::Red, &facts, "go"));
    let blockers = m.blockers(Light::Red, &facts, "go");
    assert_eq!(blockers.len(), 1);
    assert_eq!(blockers[0].code, "maintenance");

    let rejection = m.apply(Light::Red, &facts, "go").unwrap_err();
    assert_eq!(rejection.blockers[0].code, "maintenance");
}

#[test]
fn enabled_reflects_guard_state() {
    let m = machine();
    assert_eq!(
        m.enabled(Light::Red, &Facts { maintenance: false }),
        vec!["go"]
    );
    assert!(m
        .enabled(Light::Red, &Facts { maintenance: true })
        .is_empty());
}

#[test]
fn unknown_transition_name_is_rejected_not_panicked() {
    let m = machine();
    let facts = Facts { maintenance: false };
    assert!(!m.can(Light::Red, &facts, "fly"));
    assert!(m.apply(Light::Red, &facts, "fly").is_err());
}
