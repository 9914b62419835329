use std::collections::{BTreeMap, HashMap, VecDeque};

use blockwork::{Graph, GraphNode};

use crate::error::RunError;
use crate::registry::{BlockRegistry, PortValues};

/// Output record of every node, keyed by node id.
pub type GraphOutputs = BTreeMap<String, PortValues>;

/// Order the nodes so every link points forward (Kahn's algorithm).
///
/// Ready nodes are taken in declaration order, so a given graph always
/// yields the same order. Fails with `CyclicGraph` if some nodes can never
/// become ready.
pub fn topological_order(graph: &Graph) -> Result<Vec<&GraphNode>, RunError> {
    let mut indegree: HashMap<&str, usize> =
        graph.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
    for link in &graph.links {
        if let Some(d) = indegree.get_mut(link.to.node_id.as_str()) {
            *d += 1;
        }
    }

    let mut ready: VecDeque<&GraphNode> = graph
        .nodes
        .iter()
        .filter(|n| indegree.get(n.id.as_str()) == Some(&0))
        .collect();
    let mut order = Vec::with_capacity(graph.nodes.len());

    while let Some(node) = ready.pop_front() {
        order.push(node);
        for link in graph.outgoing(&node.id) {
            let Some(d) = indegree.get_mut(link.to.node_id.as_str()) else {
                continue;
            };
            *d -= 1;
            if *d == 0 {
                if let Some(target) = graph.node(&link.to.node_id) {
                    ready.push_back(target);
                }
            }
        }
    }

    if order.len() < graph.nodes.len() {
        let nodes = graph
            .nodes
            .iter()
            .filter(|n| indegree.get(n.id.as_str()).is_some_and(|d| *d > 0))
            .map(|n| n.id.clone())
            .collect();
        return Err(RunError::CyclicGraph { nodes });
    }
    Ok(order)
}

/// Execute a graph: each node evaluates exactly once, in topological
/// order, with inputs gathered from the cached outputs of its sources.
///
/// Any failure aborts the whole run and no outputs are returned.
pub fn run_graph(graph: &Graph, registry: &BlockRegistry) -> Result<GraphOutputs, RunError> {
    graph.validate().map_err(RunError::MalformedGraph)?;
    let order = topological_order(graph)?;
    tracing::info!(nodes = order.len(), links = graph.links.len(), "graph run started");

    let mut outputs = GraphOutputs::new();
    for node in order {
        let spec = registry
            .get(&node.kind)
            .ok_or_else(|| RunError::UnknownBlockKind {
                id: node.id.clone(),
                kind: node.kind.clone(),
            })?;

        let mut inputs = PortValues::new();
        for link in graph.incoming(&node.id) {
            let value = outputs
                .get(&link.from.node_id)
                .and_then(|record| record.get(&link.from.port_key));
            match value {
                Some(value) => {
                    inputs.insert(link.to.port_key.clone(), value.clone());
                }
                None => tracing::debug!(
                    link = %link.id,
                    port = %link.from.port_key,
                    "source node produced no value on linked port"
                ),
            }
        }

        let record = match spec.evaluator() {
            Some(evaluator) => evaluator.evaluate(&inputs, &node.config).map_err(|error| {
                tracing::warn!(node = %node.id, kind = %node.kind, %error, "node failed");
                RunError::BlockExecution {
                    id: node.id.clone(),
                    kind: node.kind.clone(),
                    error,
                }
            })?,
            None => PortValues::new(),
        };
        tracing::debug!(node = %node.id, kind = %node.kind, ports = record.len(), "evaluated");
        outputs.insert(node.id.clone(), record);
    }

    tracing::info!("graph run completed");
    Ok(outputs)
}
