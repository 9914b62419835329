use std::cell::RefCell;
use std::rc::Rc;

use blockwork::{Form, Graph, GraphNode, Link, PortRef, codec};
use interpreter::{
    BlockRegistry, BlockSpec, PortValues, RunError, RuntimeError, RuntimeValue, run_graph,
    standard_registry, topological_order,
};
use serde_json::json;

fn link(id: &str, from: (&str, &str), to: (&str, &str)) -> Link {
    Link::new(id, PortRef::new(from.0, from.1), PortRef::new(to.0, to.1))
}

fn constant(id: &str, value: serde_json::Value) -> GraphNode {
    GraphNode::new(id, "constant").with_config(json!({ "value": value }))
}

/// A registry whose `probe` kind logs each evaluation and passes input `in`
/// through to output `out`.
fn probing_registry() -> (BlockRegistry, Rc<RefCell<Vec<String>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let registry = standard_registry().with(
        "probe",
        BlockSpec::new(Form::Reporter)
            .with_inputs(["in"])
            .with_outputs(["out"])
            .with_node_hook(move |inputs, config| {
                let name = config["name"].as_str().unwrap_or("?").to_string();
                sink.borrow_mut().push(name);
                let value = inputs.get("in").cloned().unwrap_or(RuntimeValue::Unit);
                Ok(PortValues::from([("out".to_string(), value)]))
            }),
    );
    (registry, log)
}

fn probe(id: &str) -> GraphNode {
    GraphNode::new(id, "probe").with_config(json!({ "name": id }))
}

#[test]
fn fan_out_evaluates_source_once() {
    let (registry, log) = probing_registry();
    let graph = Graph {
        nodes: vec![probe("B"), probe("C"), probe("A")],
        links: vec![
            link("ab", ("A", "out"), ("B", "in")),
            link("ac", ("A", "out"), ("C", "in")),
        ],
    };
    run_graph(&graph, &registry).unwrap();
    let log = log.borrow();
    assert_eq!(log.len(), 3);
    assert_eq!(log[0], "A");
    assert_eq!(log.iter().filter(|n| *n == "A").count(), 1);
}

#[test]
fn arithmetic_graph() {
    let graph = Graph {
        nodes: vec![
            constant("two", json!(2)),
            constant("three", json!(3)),
            GraphNode::new("sum", "add"),
            GraphNode::new("scaled", "multiply"),
            constant("ten", json!(10)),
        ],
        links: vec![
            link("l1", ("two", "value"), ("sum", "A")),
            link("l2", ("three", "value"), ("sum", "B")),
            link("l3", ("sum", "value"), ("scaled", "A")),
            link("l4", ("ten", "value"), ("scaled", "B")),
        ],
    };
    let outputs = run_graph(&graph, &standard_registry()).unwrap();
    assert_eq!(outputs["sum"]["value"], RuntimeValue::Number(5.0));
    assert_eq!(outputs["scaled"]["value"], RuntimeValue::Number(50.0));
    assert_eq!(outputs.len(), 5);
}

#[test]
fn order_follows_declaration_among_ready_nodes() {
    let graph = Graph {
        nodes: vec![probe("x"), probe("y"), probe("z"), probe("w")],
        links: vec![
            link("l1", ("z", "out"), ("x", "in")),
            link("l2", ("w", "out"), ("y", "in")),
        ],
    };
    let order: Vec<&str> = topological_order(&graph)
        .unwrap()
        .into_iter()
        .map(|n| n.id.as_str())
        .collect();
    assert_eq!(order, ["z", "w", "x", "y"]);

    for _ in 0..5 {
        let again: Vec<&str> = topological_order(&graph)
            .unwrap()
            .into_iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(again, order);
    }
}

#[test]
fn cycle_is_rejected_before_any_evaluation() {
    let (registry, log) = probing_registry();
    let graph = Graph {
        nodes: vec![probe("free"), probe("a"), probe("b"), probe("c")],
        links: vec![
            link("ab", ("a", "out"), ("b", "in")),
            link("bc", ("b", "out"), ("c", "in")),
            link("ca", ("c", "out"), ("a", "in")),
        ],
    };
    let err = run_graph(&graph, &registry).unwrap_err();
    assert_eq!(
        err,
        RunError::CyclicGraph {
            nodes: vec!["a".to_string(), "b".to_string(), "c".to_string()]
        }
    );
    assert!(log.borrow().is_empty());
}

#[test]
fn self_loop_is_a_cycle() {
    let graph = Graph {
        nodes: vec![GraphNode::new("me", "add")],
        links: vec![link("loop", ("me", "value"), ("me", "A"))],
    };
    assert_eq!(
        topological_order(&graph).unwrap_err(),
        RunError::CyclicGraph {
            nodes: vec!["me".to_string()]
        }
    );
}

#[test]
fn first_failure_aborts_the_run() {
    let (registry, log) = probing_registry();
    let graph = Graph {
        nodes: vec![
            constant("one", json!(1)),
            constant("zero", json!(0)),
            GraphNode::new("div", "divide"),
            probe("after"),
        ],
        links: vec![
            link("l1", ("one", "value"), ("div", "A")),
            link("l2", ("zero", "value"), ("div", "B")),
            link("l3", ("div", "value"), ("after", "in")),
        ],
    };
    let err = run_graph(&graph, &registry).unwrap_err();
    assert_eq!(
        err,
        RunError::BlockExecution {
            id: "div".to_string(),
            kind: "divide".to_string(),
            error: RuntimeError::DivisionByZero
        }
    );
    assert!(log.borrow().is_empty());
}

#[test]
fn unknown_kind_fails_the_run() {
    let graph = Graph {
        nodes: vec![constant("c", json!(1)), GraphNode::new("odd", "warp")],
        links: vec![],
    };
    assert_eq!(
        run_graph(&graph, &standard_registry()).unwrap_err(),
        RunError::UnknownBlockKind {
            id: "odd".to_string(),
            kind: "warp".to_string()
        }
    );
}

#[test]
fn missing_source_port_leaves_input_absent() {
    let graph = Graph {
        nodes: vec![constant("c", json!(1)), GraphNode::new("sum", "add")],
        links: vec![
            link("l1", ("c", "nothing"), ("sum", "A")),
            link("l2", ("c", "value"), ("sum", "B")),
        ],
    };
    let err = run_graph(&graph, &standard_registry()).unwrap_err();
    assert!(matches!(
        err,
        RunError::BlockExecution { error: RuntimeError::MissingInput(ref port), .. } if port == "A"
    ));
}

#[test]
fn kind_without_evaluator_outputs_nothing() {
    let registry = BlockRegistry::new().with("sink", BlockSpec::new(Form::Statement));
    let graph = Graph {
        nodes: vec![GraphNode::new("s", "sink")],
        links: vec![],
    };
    let outputs = run_graph(&graph, &registry).unwrap();
    assert!(outputs["s"].is_empty());
}

#[test]
fn logic_nodes_evaluate_both_ports() {
    let graph = codec::decode_graph(
        &json!({
            "nodes": [
                { "id": "t", "kind": "constant", "config": { "value": true } },
                { "id": "f", "kind": "constant", "config": { "value": false } },
                { "id": "or", "kind": "or", "x": 120.0, "y": 40.0 },
                { "id": "not", "kind": "not" }
            ],
            "links": [
                { "id": "a", "from": { "nodeId": "f", "portKey": "value" }, "to": { "nodeId": "or", "portKey": "A" } },
                { "id": "b", "from": { "nodeId": "t", "portKey": "value" }, "to": { "nodeId": "or", "portKey": "B" } },
                { "id": "c", "from": { "nodeId": "or", "portKey": "value" }, "to": { "nodeId": "not", "portKey": "VALUE" } }
            ]
        })
        .to_string(),
    )
    .unwrap();
    let outputs = run_graph(&graph, &standard_registry()).unwrap();
    assert_eq!(outputs["or"]["value"], RuntimeValue::Boolean(true));
    assert_eq!(outputs["not"]["value"], RuntimeValue::Boolean(false));
}

#[test]
fn malformed_graph_is_rejected() {
    let graph = Graph {
        nodes: vec![constant("c", json!(1))],
        links: vec![link("l", ("c", "value"), ("ghost", "A"))],
    };
    assert!(matches!(
        run_graph(&graph, &standard_registry()),
        Err(RunError::MalformedGraph(_))
    ));
}
