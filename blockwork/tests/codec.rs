use std::io::Write;

use blockwork::codec::{self, LoadError};
use blockwork::{
    Block, BlockId, Form, Graph, GraphNode, GraphViolation, KindCatalog, Link, PortRef, Program,
    Violation,
};
use serde_json::json;

fn id(s: &str) -> BlockId {
    BlockId::from(s)
}

fn violations(source: serde_json::Value) -> Vec<Violation> {
    match codec::decode(&source.to_string()) {
        Err(LoadError::MalformedProgram(v)) => v,
        other => panic!("expected MalformedProgram, got {:?}", other),
    }
}

const HELLO: &str = r#"{
  "heads": ["h"],
  "nodes": {
    "h": { "id": "h", "kind": "when_run", "form": "hat", "next": "loop" },
    "loop": {
      "id": "loop", "kind": "repeat", "form": "c",
      "slotHeads": { "DO": "say" },
      "inputs": { "TIMES": { "literal": 2 } }
    },
    "say": {
      "id": "say", "kind": "say", "form": "statement",
      "parent": "loop", "inSlot": "DO",
      "inputs": { "TEXT": { "blockId": "greeting" } }
    },
    "greeting": {
      "id": "greeting", "kind": "constant", "form": "reporter",
      "config": { "value": "hi" }
    }
  }
}"#;

#[test]
fn decodes_wire_format() {
    let program = codec::decode(HELLO).unwrap();
    assert_eq!(program.heads, vec![id("h")]);
    assert_eq!(program.len(), 4);

    let say = program.block(&id("say")).unwrap();
    assert_eq!(say.form, Form::Statement);
    assert_eq!(say.parent, Some(id("loop")));
    assert_eq!(say.inputs["TEXT"].as_reference(), Some(&id("greeting")));

    let repeat = program.block(&id("loop")).unwrap();
    assert_eq!(repeat.inputs["TIMES"].as_literal(), Some(&json!(2)));
    assert_eq!(program.block(&id("greeting")).unwrap().config, json!({"value": "hi"}));
}

#[test]
fn encode_then_decode_is_identity() {
    let program = codec::decode(HELLO).unwrap();
    let text = codec::encode(&program).unwrap();
    assert!(text.contains("\"slotHeads\""));
    assert!(text.contains("\"inSlot\""));
    assert_eq!(codec::decode(&text).unwrap(), program);
}

#[test]
fn float_literals_survive_a_round_trip() {
    let values = [
        1.0715660391465826e-75,
        0.1 + 0.2,
        -2.2250738585072014e-308,
        1.7976931348623157e308,
        5e-324,
        std::f64::consts::PI,
        123456.78901234567,
    ];
    let mut program = Program::new();
    for (i, value) in values.into_iter().enumerate() {
        let key = format!("n{}", i);
        program.heads.push(id(&key));
        program
            .nodes
            .insert(id(&key), Block::statement(key.as_str(), "say").with_literal("TEXT", value));
    }
    let decoded = codec::decode(&codec::encode(&program).unwrap()).unwrap();
    assert_eq!(decoded, program);
    for (i, value) in values.into_iter().enumerate() {
        let literal = decoded.nodes[&id(&format!("n{}", i))].inputs["TEXT"].as_literal();
        assert_eq!(literal.and_then(serde_json::Value::as_f64), Some(value));
    }
}

#[test]
fn empty_program_is_valid() {
    let program = codec::decode("{}").unwrap();
    assert!(program.is_empty());
    assert!(program.heads.is_empty());
}

#[test]
fn syntax_errors_are_reported() {
    assert!(matches!(codec::decode("{ not json"), Err(LoadError::Syntax(_))));
    assert!(matches!(
        codec::decode(r#"{"heads": [], "nodes": {"a": {"id": "a", "kind": "x", "form": "lambda"}}}"#),
        Err(LoadError::Syntax(_))
    ));
}

#[test]
fn dangling_head_and_next() {
    let v = violations(json!({
        "heads": ["ghost", "a"],
        "nodes": { "a": { "id": "a", "kind": "say", "form": "statement", "next": "gone" } }
    }));
    assert!(v.contains(&Violation::DanglingReference { from: None, to: id("ghost") }));
    assert!(v.contains(&Violation::DanglingReference {
        from: Some(id("a")),
        to: id("gone")
    }));
}

#[test]
fn next_cycle_is_detected() {
    let v = violations(json!({
        "heads": ["a"],
        "nodes": {
            "a": { "id": "a", "kind": "say", "form": "statement", "next": "b" },
            "b": { "id": "b", "kind": "say", "form": "statement", "next": "a" }
        }
    }));
    assert_eq!(v, vec![Violation::Revisited { id: id("a") }]);
}

#[test]
fn block_shared_between_two_sequences_is_detected() {
    let v = violations(json!({
        "heads": ["a", "b"],
        "nodes": {
            "a": { "id": "a", "kind": "say", "form": "statement", "next": "s" },
            "b": { "id": "b", "kind": "say", "form": "statement", "next": "s" },
            "s": { "id": "s", "kind": "say", "form": "statement" }
        }
    }));
    assert_eq!(v, vec![Violation::Revisited { id: id("s") }]);
}

#[test]
fn orphans_and_misplaced_forms() {
    let v = violations(json!({
        "heads": ["a"],
        "nodes": {
            "a": { "id": "a", "kind": "say", "form": "statement", "next": "h" },
            "h": { "id": "h", "kind": "when_run", "form": "hat", "next": "r" },
            "r": { "id": "r", "kind": "add", "form": "reporter" },
            "lost": { "id": "lost", "kind": "say", "form": "statement" }
        }
    }));
    assert!(v.iter().any(|x| matches!(x, Violation::MisplacedForm { id, form: Form::Hat, .. } if id.as_str() == "h")));
    assert!(v.iter().any(|x| matches!(x, Violation::MisplacedForm { id, form: Form::Reporter, .. } if id.as_str() == "r")));
    assert!(v.contains(&Violation::Orphan {
        id: id("lost"),
        form: Form::Statement
    }));
}

#[test]
fn parent_pointers_must_match_position() {
    let v = violations(json!({
        "heads": ["c"],
        "nodes": {
            "c": { "id": "c", "kind": "repeat", "form": "c", "slotHeads": { "DO": "s" } },
            "s": { "id": "s", "kind": "say", "form": "statement" }
        }
    }));
    assert_eq!(v.len(), 1);
    assert!(matches!(&v[0], Violation::ParentMismatch { id, found: None, .. } if id.as_str() == "s"));
}

#[test]
fn value_blocks_carry_no_sequencing() {
    let v = violations(json!({
        "heads": ["s"],
        "nodes": {
            "s": { "id": "s", "kind": "say", "form": "statement",
                   "inputs": { "TEXT": { "blockId": "t" } } },
            "t": { "id": "t", "kind": "say", "form": "statement" },
            "r": { "id": "r", "kind": "add", "form": "reporter", "next": "s" },
            "p": { "id": "p", "kind": "not", "form": "predicate", "slotHeads": { "X": null } }
        }
    }));
    assert!(v.contains(&Violation::LinkedValueBlock { id: id("r") }));
    assert!(v.contains(&Violation::SlotsOnNonC {
        id: id("p"),
        form: Form::Predicate
    }));
    assert!(v.iter().any(|x| matches!(x, Violation::InputTargetNotValue { to, .. } if to.as_str() == "t")));
}

#[test]
fn key_mismatch() {
    let v = violations(json!({
        "heads": [],
        "nodes": { "a": { "id": "b", "kind": "add", "form": "reporter" } }
    }));
    assert!(v.contains(&Violation::KeyMismatch { key: id("a"), id: id("b") }));
}

struct Kinds;

impl KindCatalog for Kinds {
    fn declared_form(&self, kind: &str) -> Option<Form> {
        match kind {
            "when_run" => Some(Form::Hat),
            "say" => Some(Form::Statement),
            "repeat" => Some(Form::C),
            "constant" => Some(Form::Reporter),
            _ => None,
        }
    }

    fn declared_slots(&self, kind: &str) -> Vec<String> {
        match kind {
            "repeat" => vec!["DO".to_string()],
            _ => Vec::new(),
        }
    }
}

#[test]
fn catalog_checks_kinds_forms_and_slots() {
    let program = codec::decode(HELLO).unwrap();
    assert!(program.validate_with(&Kinds).is_ok());

    let mut program = program;
    if let Some(b) = program.nodes.get_mut(&id("loop")) {
        b.slot_heads.insert("ELSE".to_string(), None);
    }
    if let Some(b) = program.nodes.get_mut(&id("greeting")) {
        b.form = Form::Predicate;
    }
    program
        .nodes
        .insert(id("odd"), Block::reporter("odd", "mystery"));

    let v = program.validate_with(&Kinds).unwrap_err();
    assert_eq!(v.len(), 3);
    assert!(v.contains(&Violation::UnknownKind {
        id: id("odd"),
        kind: "mystery".to_string()
    }));
    assert!(v.iter().any(|x| matches!(x, Violation::FormMismatch { declared: Form::Reporter, found: Form::Predicate, .. })));
    assert!(v.iter().any(|x| matches!(x, Violation::SlotMismatch { found, .. } if found.len() == 2)));

    let shapes = program.validate_shapes(&Kinds).unwrap_err();
    assert_eq!(shapes.len(), 2);
    assert!(!shapes.iter().any(|x| matches!(x, Violation::UnknownKind { .. })));
}

#[test]
fn load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(HELLO.as_bytes()).unwrap();
    let program = codec::load_program(file.path()).unwrap();
    assert_eq!(program.len(), 4);

    let missing = file.path().with_extension("missing");
    assert!(matches!(
        codec::load_program(&missing),
        Err(LoadError::Io { .. })
    ));
}

#[test]
fn malformed_program_points_at_offending_block() {
    let source = json!({
        "heads": ["a"],
        "nodes": {
            "a": { "id": "a", "kind": "say", "form": "statement" },
            "lost": { "id": "lost", "kind": "say", "form": "statement" }
        }
    })
    .to_string();
    let err = codec::decode(&source).unwrap_err();
    let diagnostics = err.to_diagnostics(0, &source);
    assert_eq!(diagnostics.len(), 1);
    let label = &diagnostics[0].labels[0];
    assert_eq!(&source[label.range.clone()], "\"lost\"");
}

fn graph(nodes: &[&str], links: &[(&str, &str, &str, &str, &str)]) -> Graph {
    Graph {
        nodes: nodes.iter().map(|n| GraphNode::new(*n, "constant")).collect(),
        links: links
            .iter()
            .map(|(l, a, ap, b, bp)| Link::new(*l, PortRef::new(*a, *ap), PortRef::new(*b, *bp)))
            .collect(),
    }
}

#[test]
fn graph_round_trip_and_validation() {
    let g = graph(&["a", "b"], &[("l1", "a", "value", "b", "A")]);
    assert!(g.validate().is_ok());
    let text = codec::encode_graph(&g).unwrap();
    assert!(text.contains("\"nodeId\""));
    assert_eq!(codec::decode_graph(&text).unwrap(), g);

    let bad = graph(
        &["a", "a"],
        &[
            ("l1", "a", "value", "b", "A"),
            ("l1", "a", "value", "a", "X"),
            ("l2", "a", "value", "a", "X"),
        ],
    );
    let v = bad.validate().unwrap_err();
    assert!(v.contains(&GraphViolation::DuplicateNode("a".to_string())));
    assert!(v.contains(&GraphViolation::DuplicateLink("l1".to_string())));
    assert!(v.contains(&GraphViolation::DanglingLink {
        link: "l1".to_string(),
        node: "b".to_string()
    }));
    assert!(v.iter().any(|x| matches!(x, GraphViolation::PortConflict { link, .. } if link == "l2")));
    assert!(matches!(
        codec::decode_graph(&codec::encode_graph(&bad).unwrap()),
        Err(LoadError::MalformedGraph(_))
    ));
}

#[test]
fn cycles_are_not_structural_errors() {
    let g = graph(
        &["a", "b"],
        &[("l1", "a", "value", "b", "A"), ("l2", "b", "value", "a", "A")],
    );
    assert!(g.validate().is_ok());
    assert_eq!(Program::default(), Program::new());
}
