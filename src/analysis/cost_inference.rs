//! Cost inference pass.
//!
//! Traverses the layer graph in topological order, re-infers the output
//! shape of every node from its inputs' shapes and sums the per-node costs.
//! A re-inferred shape that differs from the one recorded when the node was
//! added means the graph was edited inconsistently and is reported.

use crate::complexity::Shape;
use crate::cost::Complexity;
use crate::graph::{Graph, GraphError, GraphResult, LayerKind, Node, NodeId};
use log::trace;
use std::collections::{HashMap, HashSet};

/// Structure that performs cost inference for a layer graph.
pub struct CostInference;

impl CostInference {
    /// Runs the pass over every node reachable from the graph outputs.
    ///
    /// # Arguments
    /// * `graph` - The graph to analyze.
    /// * `initial_shapes` - Shapes for all `Input` nodes, keyed by input name.
    ///
    /// Returns the summed cost and the shapes of `graph.outputs`, in order.
    pub fn run(
        graph: &Graph,
        initial_shapes: &HashMap<String, Shape>,
    ) -> GraphResult<(Complexity, Vec<Shape>)> {
        if graph.outputs.is_empty() {
            return Err(GraphError::NoOutputs);
        }
        let sorted_nodes = Self::topological_sort(graph)?;

        let mut shapes: HashMap<NodeId, Shape> = HashMap::new();
        let mut total = Complexity::new();
        for node_id in sorted_nodes {
            let node = graph.get_node(node_id)?;
            let (cx, shape) = Self::infer_node(node, &shapes, initial_shapes)?;
            if shape != node.shape {
                return Err(GraphError::ShapeMismatch {
                    node: node_id,
                    recorded: node.shape.clone(),
                    inferred: shape,
                });
            }
            trace!(
                "node {} ({}): shape {:?}, flops {}, params {}",
                node_id,
                node.kind.name(),
                shape,
                cx.flops(),
                cx.params()
            );
            total += &cx;
            shapes.insert(node_id, shape);
        }

        let outputs = graph
            .outputs
            .iter()
            .map(|id| shapes.get(id).cloned().ok_or(GraphError::MissingShapeInfo(*id)))
            .collect::<GraphResult<Vec<_>>>()?;
        Ok((total, outputs))
    }

    fn infer_node(
        node: &Node,
        shapes: &HashMap<NodeId, Shape>,
        initial_shapes: &HashMap<String, Shape>,
    ) -> GraphResult<(Complexity, Shape)> {
        if let LayerKind::Input { name } = &node.kind {
            let shape = initial_shapes
                .get(name)
                .cloned()
                .ok_or_else(|| GraphError::MissingInitialShape(name.clone()))?;
            return Ok((Complexity::new(), shape));
        }

        let input_shapes = node
            .inputs
            .iter()
            .map(|id| {
                shapes
                    .get(id)
                    .map(Vec::as_slice)
                    .ok_or(GraphError::MissingShapeInfo(*id))
            })
            .collect::<GraphResult<Vec<_>>>()?;
        Ok(node.kind.infer(&input_shapes)?)
    }

    /// Orders the nodes reachable from the outputs so that every node comes
    /// after all of its inputs.
    pub fn topological_sort(graph: &Graph) -> GraphResult<Vec<NodeId>> {
        let mut sorted = Vec::new();
        let mut visited = HashSet::new();
        for output_id in &graph.outputs {
            Self::build_sorted_graph(*output_id, graph, &mut visited, &mut sorted)?;
        }
        Ok(sorted)
    }

    fn build_sorted_graph(
        node_id: NodeId,
        graph: &Graph,
        visited: &mut HashSet<NodeId>,
        sorted: &mut Vec<NodeId>,
    ) -> GraphResult<()> {
        if visited.contains(&node_id) {
            return Ok(());
        }
        let node = graph.get_node(node_id)?;
        for &input_id in &node.inputs {
            Self::build_sorted_graph(input_id, graph, visited, sorted)?;
        }
        visited.insert(node_id);
        sorted.push(node_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complexity::{Conv2dSpec, MergeOp, Padding};

    fn residual_graph() -> Graph {
        let mut graph = Graph::new();
        let input = graph.add_input("x", vec![8, 8, 4]);
        let spec = Conv2dSpec {
            padding: Padding::Same,
            ..Conv2dSpec::new(4, (3, 3))
        };
        let conv = graph.add_node(None, LayerKind::Conv2d(spec), vec![input]).unwrap();
        let norm = graph.add_node(None, LayerKind::BatchNorm, vec![conv]).unwrap();
        let add = graph
            .add_node(None, LayerKind::Merge(MergeOp::Add), vec![norm, input])
            .unwrap();
        graph.set_output(add);
        graph
    }

    #[test]
    fn test_topological_sort_puts_inputs_first() {
        let graph = residual_graph();
        assert_eq!(CostInference::topological_sort(&graph).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_run_sums_node_costs() {
        let graph = residual_graph();
        let shapes = HashMap::from([("x".to_string(), vec![8, 8, 4])]);
        let (cx, outputs) = CostInference::run(&graph, &shapes).unwrap();

        assert_eq!(outputs, vec![vec![8, 8, 4]]);
        assert_eq!(cx.params(), 9 * 4 * 4 + 4 + 16);
        assert_eq!(cx.flops(), 64 * 144 + 256);
    }

    #[test]
    fn test_run_reports_missing_and_inconsistent_input_shapes() {
        let graph = residual_graph();
        assert_eq!(
            CostInference::run(&graph, &HashMap::new()),
            Err(GraphError::MissingInitialShape("x".to_string()))
        );

        let shapes = HashMap::from([("x".to_string(), vec![4, 4, 4])]);
        assert!(matches!(
            CostInference::run(&graph, &shapes),
            Err(GraphError::ShapeMismatch { node: 0, .. })
        ));
    }

    #[test]
    fn test_run_requires_outputs() {
        let mut graph = Graph::new();
        graph.add_input("x", vec![4]);
        assert_eq!(CostInference::run(&graph, &HashMap::new()), Err(GraphError::NoOutputs));
    }
}
