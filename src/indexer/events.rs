// Event map derivation

use std::collections::BTreeMap;

use crate::index::{Declaration, EventInfo, Parameter};

/// Event plumbing that lives in event namespaces but is not itself an event
pub const EXCLUDED_EVENT_CLASSES: &[&str] = &[
    "EventManager",
    "EventManagerInterface",
    "EventListener",
    "EventListenerInterface",
    "EventSubscriber",
    "EventSubscriberInterface",
    "EventDispatcher",
    "EventDispatcherInterface",
    "EventAwareInterface",
    "EventAwareTrait",
];

/// True when some namespace segment is exactly `Event`
fn in_event_namespace(namespace: &str) -> bool {
    namespace.split('\\').any(|segment| segment == "Event")
}

pub fn is_event(declaration: &Declaration) -> bool {
    if !in_event_namespace(&declaration.namespace) {
        return false;
    }
    if EXCLUDED_EVENT_CLASSES.contains(&declaration.name.as_str()) {
        return false;
    }

    declaration.name.ends_with("Event")
        || declaration
            .extends_name
            .as_deref()
            .map(|parent| parent.ends_with("Event") || parent.contains("AbstractEvent"))
            .unwrap_or(false)
}

/// Describe an event by its constructor signature
pub fn event_info(declaration: &Declaration) -> EventInfo {
    let parameters = declaration
        .constructor()
        .map(|ctor| ctor.parameters.iter().map(event_parameter).collect())
        .unwrap_or_default();

    EventInfo {
        name: declaration.name.clone(),
        fully_qualified_name: declaration.fully_qualified_name.clone(),
        parameters,
        description: declaration.doc_comment.clone(),
    }
}

/// `<type> $<name>[ = <default>]`; reference and variadic markers are dropped
fn event_parameter(parameter: &Parameter) -> String {
    let mut out = match &parameter.type_ {
        Some(type_) => format!("{} ${}", type_, parameter.name),
        None => format!("${}", parameter.name),
    };
    if let Some(default) = &parameter.default_value {
        out.push_str(" = ");
        out.push_str(default);
    }
    out
}

/// Keyed by FQN; a later declaration with the same FQN replaces the earlier one
pub fn build_event_map(declarations: &[Declaration]) -> BTreeMap<String, EventInfo> {
    let mut events = BTreeMap::new();
    for declaration in declarations.iter().filter(|d| is_event(d)) {
        events.insert(declaration.fully_qualified_name.clone(), event_info(declaration));
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{DeclarationKind, Method, Parameter};

    fn class(namespace: &str, name: &str, extends: Option<&str>) -> Declaration {
        let mut decl = Declaration::new(name, namespace, DeclarationKind::Class, "/src/x.php");
        decl.extends_name = extends.map(str::to_string);
        decl
    }

    #[test]
    fn test_ping_event_parameters() {
        let mut ping = class("App\\Event\\Network", "PingEvent", Some("AbstractEvent"));
        ping.methods.push(Method {
            name: "__construct".to_string(),
            parameters: vec![Parameter {
                name: "host".to_string(),
                type_: Some("string".to_string()),
                ..Parameter::default()
            }],
            ..Method::default()
        });

        let events = build_event_map(&[ping]);
        let info = &events["App\\Event\\Network\\PingEvent"];
        assert_eq!(info.parameters, vec!["string $host"]);
    }

    #[test]
    fn test_parameter_rendering_variants() {
        let mut event = class("Cms\\Event", "SaveEvent", None);
        event.doc_comment = Some("/** Saved. */".to_string());
        event.methods.push(Method {
            name: "__construct".to_string(),
            parameters: vec![
                Parameter {
                    name: "name".to_string(),
                    ..Parameter::default()
                },
                Parameter {
                    name: "args".to_string(),
                    type_: Some("array".to_string()),
                    default_value: Some("...".to_string()),
                    ..Parameter::default()
                },
            ],
            ..Method::default()
        });

        let info = event_info(&event);
        assert_eq!(info.parameters, vec!["$name", "array $args = ..."]);
        assert_eq!(info.description.as_deref(), Some("/** Saved. */"));
    }

    #[test]
    fn test_reference_and_variadic_markers_dropped() {
        let mut event = class("Cms\\Event", "BatchEvent", None);
        event.methods.push(Method {
            name: "__construct".to_string(),
            parameters: vec![
                Parameter {
                    name: "x".to_string(),
                    is_by_reference: true,
                    ..Parameter::default()
                },
                Parameter {
                    name: "rest".to_string(),
                    type_: Some("int".to_string()),
                    is_variadic: true,
                    ..Parameter::default()
                },
            ],
            ..Method::default()
        });

        assert_eq!(event_info(&event).parameters, vec!["$x", "int $rest"]);
    }

    #[test]
    fn test_event_without_constructor_has_no_parameters() {
        let event = class("Cms\\Event\\Table", "AfterStoreEvent", None);
        assert!(event_info(&event).parameters.is_empty());
    }

    #[test]
    fn test_excluded_plumbing_never_qualifies() {
        for name in EXCLUDED_EVENT_CLASSES {
            let decl = class("Framework\\Event", name, Some("AbstractEvent"));
            assert!(!is_event(&decl), "{} should be excluded", name);
        }
    }

    #[test]
    fn test_namespace_segment_rules() {
        assert!(is_event(&class("App\\Event", "LoginEvent", None)));
        assert!(is_event(&class("App\\Event\\User", "Login", Some("UserEvent"))));
        assert!(is_event(&class("App\\Event\\User", "Login", Some("Base\\AbstractEventBase"))));

        // Segment must be exactly `Event`
        assert!(!is_event(&class("App\\Events", "LoginEvent", None)));
        assert!(!is_event(&class("App\\EventBus", "LoginEvent", None)));
        assert!(!is_event(&class("", "LoginEvent", None)));

        // Name or parent must look like an event
        assert!(!is_event(&class("App\\Event", "Helper", None)));
        assert!(!is_event(&class("App\\Event", "Helper", Some("Base"))));
    }

    #[test]
    fn test_duplicate_fqn_last_write_wins() {
        let mut first = class("App\\Event", "SaveEvent", None);
        first.doc_comment = Some("first".to_string());
        let mut second = class("App\\Event", "SaveEvent", None);
        second.doc_comment = Some("second".to_string());

        let events = build_event_map(&[first, second]);
        assert_eq!(events.len(), 1);
        assert_eq!(events["App\\Event\\SaveEvent"].description.as_deref(), Some("second"));
    }
}
