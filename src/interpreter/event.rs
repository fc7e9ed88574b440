//! Event definitions, dispatched on their kind

use std::sync::LazyLock;

use regex::Regex;

use crate::error::SemanticError;
use crate::graph::{resolver, Event, EventCategory, SourceLink, TopologyGraph, UNKNOWN};
use crate::parser::ast::{Defaults, EventDecl, EventKind, PropertyKey};
use crate::sandbox::Scope;
use crate::value::Value;

use super::properties::PropertyResolver;

pub const ELEMENT_PROPERTIES_CHANGED: &str = "Element Properties Changed";

/// `[description](url)`
static LINK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(.+)\]\((\S+)\)$").expect("link pattern compiles"));

/// Defaults keys that apply to events
const EVENT_DEFAULT_KEYS: &[PropertyKey] = &[PropertyKey::Tags, PropertyKey::EventProcessor];

/// Interpret one event and append it to the graph. Runs after the relation
/// pass so identifiers see every component of the unit.
pub fn interpret_event(
    graph: &mut TopologyGraph,
    decl: &EventDecl,
    defaults: Option<&Defaults>,
) -> Result<(), SemanticError> {
    let event = match decl.kind.node {
        EventKind::ElementPropertiesChanged => element_properties_changed(graph, decl, defaults)?,
    };
    tracing::debug!(
        title = %event.title,
        identifiers = ?event.context.element_identifiers,
        "interpreted event"
    );
    graph.add_event(event);
    Ok(())
}

fn element_properties_changed(
    graph: &TopologyGraph,
    decl: &EventDecl,
    defaults: Option<&Defaults>,
) -> Result<Event, SemanticError> {
    let mut props = PropertyResolver::new(&decl.properties, defaults, decl.kind.node.as_str())
        .with_default_keys(EVENT_DEFAULT_KEYS);
    let mut event = Event::new(ELEMENT_PROPERTIES_CHANGED, EventCategory::Changes);

    let title = props.get_string_or(
        PropertyKey::Title,
        UNKNOWN,
        &mut Scope::for_event(graph, &mut event),
    )?;
    props.set_element(title.as_str());
    event.title = title;

    let message =
        props.get_string_or(PropertyKey::Message, "", &mut Scope::for_event(graph, &mut event))?;
    event.message = message;

    let tags =
        props.merge_string_list(PropertyKey::Tags, &mut Scope::for_event(graph, &mut event))?;
    event.tags.extend(tags);

    let identifiers = props.merge_string_list(
        PropertyKey::Identifiers,
        &mut Scope::for_event(graph, &mut event),
    )?;
    event.context.element_identifiers.extend(identifiers);

    let links =
        props.merge_string_list(PropertyKey::Links, &mut Scope::for_event(graph, &mut event))?;
    for link in links {
        let parsed = parse_link(&link, props.element())?;
        event.context.source_links.push(parsed);
    }

    let previous =
        props.merge_map(PropertyKey::Previous, &mut Scope::for_event(graph, &mut event))?;
    let current =
        props.merge_map(PropertyKey::Current, &mut Scope::for_event(graph, &mut event))?;
    event.context.data.insert("old".to_string(), Value::Map(previous));
    event.context.data.insert("new".to_string(), Value::Map(current));

    props.run_processors(
        PropertyKey::Processor,
        PropertyKey::EventProcessor,
        &mut Scope::for_event(graph, &mut event),
    )?;

    if event.context.element_identifiers.is_empty() {
        return Err(SemanticError::EmptyIdentifiers {
            event: props.element().to_string(),
        });
    }
    event.context.element_identifiers =
        resolver::resolve_identifiers(graph, &event.context.element_identifiers)?;

    Ok(event)
}

/// Parse `[description](url)`
pub fn parse_link(link: &str, event: &str) -> Result<SourceLink, SemanticError> {
    let captures = LINK_PATTERN
        .captures(link)
        .ok_or_else(|| SemanticError::MalformedLink {
            link: link.to_string(),
            event: event.to_string(),
        })?;
    Ok(SourceLink {
        title: captures[1].to_string(),
        url: captures[2].to_string(),
    })
}
