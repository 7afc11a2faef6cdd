//! Graph definition validation.

mod common;

use common::{Classify, Greeting, Question, SetField, chat_schema, classification_router};
use serde_json::json;
use threadflow::graph::{GraphBuilder, GraphDefinitionError};

fn set(field: &'static str) -> SetField {
    SetField {
        field,
        value: json!(true),
    }
}

#[test]
fn minimal_graph_compiles() {
    let app = GraphBuilder::new()
        .with_state_schema(chat_schema())
        .add_node("only", set("response"))
        .set_entry_point("only")
        .set_finish_point("only")
        .compile()
        .expect("valid graph");
    assert_eq!(app.entry_point(), "only");
    assert_eq!(app.node_names(), vec!["only"]);
}

#[test]
fn node_without_outgoing_edge_is_legal() {
    // Implicit routing to END covers the missing edge.
    let app = GraphBuilder::new()
        .add_node("only", set("response"))
        .set_entry_point("only")
        .compile()
        .expect("valid graph");
    assert!(app.has_node("only"));
}

#[test]
fn duplicate_node_name_is_rejected() {
    let err = GraphBuilder::new()
        .add_node("worker", set("a"))
        .add_node("worker", set("b"))
        .set_entry_point("worker")
        .compile()
        .unwrap_err();
    assert_eq!(
        err,
        GraphDefinitionError::DuplicateNode {
            name: "worker".into()
        }
    );
}

#[test]
fn reserved_names_are_rejected() {
    for reserved in ["START", "END"] {
        let err = GraphBuilder::new()
            .add_node(reserved, set("a"))
            .set_entry_point(reserved)
            .compile()
            .unwrap_err();
        assert_eq!(
            err,
            GraphDefinitionError::ReservedName {
                name: reserved.into()
            }
        );
    }
}

#[test]
fn lowercase_start_and_end_are_ordinary_names() {
    let app = GraphBuilder::new()
        .add_node("start", set("a"))
        .add_node("end", set("b"))
        .set_entry_point("start")
        .add_edge("start", "end")
        .compile()
        .expect("reserved names are case-sensitive");
    assert_eq!(app.node_names(), vec!["end", "start"]);
}

#[test]
fn missing_entry_point_is_rejected() {
    let err = GraphBuilder::new()
        .add_node("worker", set("a"))
        .compile()
        .unwrap_err();
    assert_eq!(err, GraphDefinitionError::MissingEntryPoint);
}

#[test]
fn unregistered_entry_point_is_rejected() {
    let err = GraphBuilder::new()
        .add_node("worker", set("a"))
        .set_entry_point("ghost")
        .compile()
        .unwrap_err();
    assert!(matches!(
        err,
        GraphDefinitionError::UnknownNode { ref name, .. } if name == "ghost"
    ));
}

#[test]
fn edge_to_unregistered_node_is_rejected() {
    let err = GraphBuilder::new()
        .add_node("worker", set("a"))
        .set_entry_point("worker")
        .add_edge("worker", "ghost")
        .compile()
        .unwrap_err();
    assert!(matches!(
        err,
        GraphDefinitionError::UnknownNode { ref name, .. } if name == "ghost"
    ));
}

#[test]
fn conditional_target_to_unregistered_node_is_rejected() {
    let err = GraphBuilder::new()
        .add_node("classify", Classify)
        .add_node("greeting", Greeting)
        .set_entry_point("classify")
        .add_conditional_edges(
            "classify",
            classification_router,
            [("greeting", "greeting"), ("question", "ghost")],
        )
        .compile()
        .unwrap_err();
    assert!(matches!(
        err,
        GraphDefinitionError::UnknownNode { ref name, .. } if name == "ghost"
    ));
}

#[test]
fn multiple_unconditional_edges_are_ambiguous() {
    let err = GraphBuilder::new()
        .add_node("fork", set("a"))
        .add_node("left", set("b"))
        .add_node("right", set("c"))
        .set_entry_point("fork")
        .add_edge("fork", "left")
        .add_edge("fork", "right")
        .compile()
        .unwrap_err();
    assert!(matches!(
        err,
        GraphDefinitionError::AmbiguousRouting { ref source, .. } if source == "fork"
    ));
}

#[test]
fn edge_plus_conditional_set_is_ambiguous() {
    let err = GraphBuilder::new()
        .add_node("classify", Classify)
        .add_node("greeting", Greeting)
        .set_entry_point("classify")
        .add_edge("classify", "greeting")
        .add_conditional_edges(
            "classify",
            classification_router,
            [("greeting", "greeting")],
        )
        .compile()
        .unwrap_err();
    assert!(matches!(
        err,
        GraphDefinitionError::AmbiguousRouting { ref source, .. } if source == "classify"
    ));
}

#[test]
fn two_conditional_sets_on_one_node_are_ambiguous() {
    let err = GraphBuilder::new()
        .add_node("classify", Classify)
        .add_node("greeting", Greeting)
        .add_node("question", Question)
        .set_entry_point("classify")
        .add_conditional_edges(
            "classify",
            classification_router,
            [("greeting", "greeting")],
        )
        .add_conditional_edges(
            "classify",
            classification_router,
            [("question", "question")],
        )
        .compile()
        .unwrap_err();
    assert!(matches!(
        err,
        GraphDefinitionError::AmbiguousRouting { ref source, .. } if source == "classify"
    ));
}

#[test]
fn registration_errors_surface_before_structural_checks() {
    // Duplicate registration and a missing entry point: the registration
    // error was recorded first and wins.
    let err = GraphBuilder::new()
        .add_node("worker", set("a"))
        .add_node("worker", set("b"))
        .compile()
        .unwrap_err();
    assert_eq!(
        err,
        GraphDefinitionError::DuplicateNode {
            name: "worker".into()
        }
    );
}

#[test]
fn entry_point_is_checked_before_references() {
    let err = GraphBuilder::new()
        .add_node("worker", set("a"))
        .add_edge("worker", "ghost")
        .compile()
        .unwrap_err();
    assert_eq!(err, GraphDefinitionError::MissingEntryPoint);
}

#[test]
fn conditional_targets_may_include_end() {
    let app = GraphBuilder::new()
        .add_node("classify", Classify)
        .add_node("greeting", Greeting)
        .set_entry_point("classify")
        .add_conditional_edges(
            "classify",
            classification_router,
            [("greeting", "greeting"), ("question", "END")],
        )
        .compile()
        .expect("END is a valid conditional target");
    assert!(app.has_node("classify"));
}
