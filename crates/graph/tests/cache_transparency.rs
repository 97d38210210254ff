//! Cache transparency and eviction bound for the samples cache.

use proptest::prelude::*;
use symboost_graph::{Graph, InstanceCache, NodeId, Operator, Universe, Value, ValueType};

const OPS: [Operator; 7] = [
    Operator::Add,
    Operator::Sub,
    Operator::Mul,
    Operator::Div,
    Operator::Max,
    Operator::Log,
    Operator::Neg,
];

fn build(
    universe: &mut Universe,
    inputs: &[NodeId],
    recipe: &[(usize, usize, usize)],
) -> Vec<NodeId> {
    let mut nodes = inputs.to_vec();
    for &(op, left, right) in recipe {
        let op = OPS[op % OPS.len()];
        let left = nodes[left % nodes.len()];
        let right = nodes[right % nodes.len()];
        let children: Vec<NodeId> = if op.arity() == 1 { vec![left] } else { vec![left, right] };
        nodes.push(universe.canonicalize(op, &children).unwrap());
    }
    nodes
}

fn cell() -> impl Strategy<Value = Value> {
    prop_oneof![
        8 => (-8i32..8).prop_map(|x| Value::Num(x as f64 / 2.0)),
        1 => Just(Value::Missing),
    ]
}

/// Evaluate `node` for every example with a fresh instance cache, bypassing
/// the samples cache entirely.
fn from_scratch(graph: &Graph, columns: &[Vec<Value>], node: NodeId) -> Vec<Value> {
    let num_examples = columns[0].len();
    (0..num_examples)
        .map(|example| {
            let row: Vec<Value> = columns.iter().map(|column| column[example]).collect();
            let mut cache = InstanceCache::new(graph.universe());
            cache.seed_inputs(graph.inputs(), &row).unwrap();
            cache.compute_and_memoize(node).unwrap()
        })
        .collect()
}

fn same_column(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same(y))
}

proptest! {
    #[test]
    fn cached_columns_match_scratch_evaluation(
        recipe in prop::collection::vec((0usize..7, 0usize..32, 0usize..32), 1..25),
        columns in (1usize..12)
            .prop_flat_map(|n| prop::collection::vec(prop::collection::vec(cell(), n), 2)),
        max_entries in 0usize..5,
        accesses in prop::collection::vec(0usize..64, 1..40),
    ) {
        let mut graph = Graph::new();
        graph.add_input("x", ValueType::Double);
        graph.add_input("y", ValueType::Double);
        let inputs = graph.inputs().to_vec();
        let nodes = build(graph.universe_mut(), &inputs, &recipe);
        let mut cache = graph.bind_samples(&columns, max_entries).unwrap();

        for pick in accesses {
            let node = nodes[pick % nodes.len()];
            let (cached, _) = cache.get_or_compute(graph.universe(), node, false).unwrap();
            prop_assert!(same_column(&cached, &from_scratch(&graph, &columns, node)));

            // Eviction bound holds after every access, inputs are always retained.
            prop_assert!(cache.evictable_len() <= max_entries);
            for &input in &inputs {
                prop_assert!(cache.contains(input));
            }

            cache.invalidate(node);
            let (recomputed, _) = cache.get_or_compute(graph.universe(), node, false).unwrap();
            prop_assert!(same_column(&recomputed, &cached));
        }
    }

    #[test]
    fn sorted_index_is_ordered_and_complete(
        values in prop::collection::vec(cell(), 0..30),
    ) {
        let mut graph = Graph::new();
        let x = graph.add_input("x", ValueType::Double);
        let neg = graph.universe_mut().canonicalize(Operator::Neg, &[x]).unwrap();
        let mut cache = graph.bind_samples(&[values.clone()], 2).unwrap();

        let (column, sorted) = cache.get_or_compute(graph.universe(), neg, true).unwrap();
        let sorted = sorted.unwrap();
        let present = column.iter().filter(|v| !v.is_missing()).count();
        prop_assert_eq!(sorted.len(), present);
        for pair in sorted.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            prop_assert!(a.0 < b.0 || (a.0 == b.0 && a.1 < b.1));
        }
        for &(value, example) in sorted.iter() {
            prop_assert_eq!(column[example as usize], Value::Num(value));
        }
    }
}

#[test]
fn rebinding_to_a_new_dataset_recomputes_over_new_size() {
    let mut graph = Graph::new();
    let a = graph.add_input("a", ValueType::Boolean);
    let b = graph.add_input("b", ValueType::Boolean);
    let and = graph.universe_mut().canonicalize(Operator::And, &[a, b]).unwrap();

    let small = vec![
        vec![Value::Bool(true), Value::Bool(false)],
        vec![Value::Bool(true), Value::Bool(true)],
    ];
    let mut cache = graph.bind_samples(&small, 8).unwrap();
    let (column, _) = cache.get_or_compute(graph.universe(), and, false).unwrap();
    assert_eq!(*column, vec![Value::Bool(true), Value::Bool(false)]);

    let large = vec![
        vec![Value::Bool(false), Value::Bool(true), Value::Bool(true), Value::Missing],
        vec![Value::Bool(true), Value::Bool(true), Value::Bool(false), Value::Bool(true)],
    ];
    cache = graph.bind_samples(&large, 8).unwrap();
    assert!(!cache.contains(and));
    let (column, _) = cache.get_or_compute(graph.universe(), and, false).unwrap();
    assert_eq!(
        *column,
        vec![Value::Bool(false), Value::Bool(true), Value::Bool(false), Value::Missing]
    );
    assert_eq!(cache.num_examples(), 4);
}
