use std::collections::HashSet;
use std::rc::Rc;

use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use join_order_opt::cardinality::CardinalityEstimatorColumnStatistics;
use join_order_opt::cost::{CostModelNaive, CostModelSegmented};
use join_order_opt::expr::{ColumnRef, DataType, PredicateCondition, Value};
use join_order_opt::join_ordering::{
    DpCcp, DpCcpTopK, EnumerateCcp, JoinOrderingAlgorithm, VertexSet,
};
use join_order_opt::operator::{ColumnDefinition, JoinMode, LogicalOperator, TableScan};
use join_order_opt::optimizer::{JoinOrderingRule, Optimizer, Rule};
use join_order_opt::plan::{LogicalPlanBuilder, Plan, PlanNodeRef};
use join_order_opt::stat::{ColumnStatistics, TableStatistics};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn random_connected_graph(rng: &mut StdRng, vertex_count: usize) -> Vec<(usize, usize)> {
    let mut edges = vec![];
    for vertex in 1..vertex_count {
        edges.push((rng.gen_range(0..vertex), vertex));
    }
    let extra = rng.gen_range(0..vertex_count);
    for _ in 0..extra {
        let a = rng.gen_range(0..vertex_count);
        let b = rng.gen_range(0..vertex_count);
        if a != b && !edges.contains(&(a.min(b), a.max(b))) {
            edges.push((a.min(b), a.max(b)));
        }
    }
    edges
}

fn is_connected(set: VertexSet, edges: &[(usize, usize)]) -> bool {
    let start = match set.min_vertex() {
        Some(v) => v,
        None => return false,
    };
    let mut reached = VertexSet::single(start);
    loop {
        let mut grown = reached;
        for &(a, b) in edges {
            if set.contains(a) && set.contains(b) && (reached.contains(a) || reached.contains(b)) {
                grown.insert(a);
                grown.insert(b);
            }
        }
        if grown == reached {
            return reached == set;
        }
        reached = grown;
    }
}

fn connected_subsets(vertex_count: usize, edges: &[(usize, usize)]) -> HashSet<VertexSet> {
    VertexSet::first_n(vertex_count)
        .subsets()
        .filter(|s| s.len() >= 2 && is_connected(*s, edges))
        .collect()
}

fn table(name: &str, row_count: f64) -> PlanNodeRef {
    LogicalPlanBuilder::scan(
        TableScan::new(
            name,
            vec![
                ColumnDefinition::new("id", DataType::Int),
                ColumnDefinition::new("value", DataType::Int),
            ],
        )
        .with_statistics(TableStatistics::stored(
            row_count,
            vec![
                ColumnStatistics::numeric(DataType::Int, row_count, 1.0, row_count),
                ColumnStatistics::numeric(DataType::Int, 100.0, 1.0, 100.0),
            ],
        )),
    )
    .node()
}

fn id(node: &PlanNodeRef) -> ColumnRef {
    ColumnRef::new(node.id(), 0)
}

fn value(node: &PlanNodeRef) -> ColumnRef {
    ColumnRef::new(node.id(), 1)
}

fn count_nodes(plan: &Plan, predicate: impl Fn(&LogicalOperator) -> bool) -> usize {
    plan.bfs_iterator()
        .filter(|n| predicate(n.operator()))
        .count()
}

/// `orders ⨝ customers ⨝ nations`, written as cross products filtered on top.
fn cross_product_plan() -> (Plan, [PlanNodeRef; 4]) {
    let nations = table("nations", 25.0);
    let customers = table("customers", 1500.0);
    let orders = table("orders", 15000.0);
    let regions = table("regions", 5.0);

    let plan = LogicalPlanBuilder::from(orders.clone())
        .cross_join(nations.clone())
        .cross_join(regions.clone())
        .cross_join(customers.clone())
        .predicate(value(&orders), PredicateCondition::Equals, id(&customers))
        .predicate(value(&customers), PredicateCondition::Equals, id(&nations))
        .predicate(value(&nations), PredicateCondition::Equals, id(&regions))
        .predicate(value(&regions), PredicateCondition::LessThan, Value::from(3))
        .limit(100)
        .build();
    (plan, [nations, customers, orders, regions])
}

// ---------------------------------------------------------------------------
// EnumerateCcp
// ---------------------------------------------------------------------------

#[test]
fn test_enumerate_ccp_random_graphs() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..50 {
        let vertex_count = rng.gen_range(3..=8);
        let edges = random_connected_graph(&mut rng, vertex_count);
        let pairs = EnumerateCcp::new(vertex_count, &edges).unwrap().enumerate();

        // No unordered pair twice.
        let unordered: HashSet<_> = pairs
            .iter()
            .map(|&(a, b)| if a < b { (a, b) } else { (b, a) })
            .collect();
        assert_eq!(pairs.len(), unordered.len());

        // Every connected subset is the union of some pair.
        let unions: HashSet<_> = pairs.iter().map(|&(a, b)| a | b).collect();
        assert_eq!(connected_subsets(vertex_count, &edges), unions);

        // Both halves are built before they are used.
        let mut built = HashSet::new();
        for &(csg, cmp) in &pairs {
            assert!(!csg.intersects(cmp));
            for half in [csg, cmp] {
                assert!(is_connected(half, &edges));
                assert!(half.len() == 1 || built.contains(&half), "{} used before built", half);
            }
            built.insert(csg | cmp);
        }
    }
}

#[test]
fn test_enumerate_ccp_clique_pair_count() {
    // A clique of n vertices has (3^n - 2^(n+1) + 1) / 2 csg-cmp pairs.
    let edges: Vec<_> = (0..5).tuple_combinations().collect();
    let pairs = EnumerateCcp::new(5, &edges).unwrap().enumerate();
    assert_eq!((243 - 64 + 1) / 2, pairs.len());
}

#[test]
fn test_enumerate_ccp_rejects_invalid_edges() {
    assert!(EnumerateCcp::new(3, &[(0, 3)]).is_err());
    assert!(EnumerateCcp::new(65, &[]).is_err());
}

// ---------------------------------------------------------------------------
// JoinOrderingRule
// ---------------------------------------------------------------------------

#[test]
fn test_rule_replaces_cross_products() {
    let (plan, tables) = cross_product_plan();
    let rule = JoinOrderingRule::new(Box::new(DpCcp::new(
        Rc::new(CostModelNaive),
        Rc::new(CardinalityEstimatorColumnStatistics::new()),
    )));

    let optimized = rule.apply(plan).unwrap();
    assert!(matches!(
        optimized.root().operator(),
        LogicalOperator::Limit(_)
    ));
    assert_eq!(
        3,
        count_nodes(&optimized, |op| matches!(
            op.as_join().map(|j| j.join_mode()),
            Some(JoinMode::Inner)
        ))
    );
    assert_eq!(
        0,
        count_nodes(&optimized, |op| matches!(
            op.as_join().map(|j| j.join_mode()),
            Some(JoinMode::Cross)
        ))
    );
    // Only the filter on regions is left as a predicate node.
    assert_eq!(
        1,
        count_nodes(&optimized, |op| matches!(op, LogicalOperator::Predicate(_)))
    );
    let scan_ids: HashSet<_> = optimized
        .bfs_iterator()
        .filter(|n| matches!(n.operator(), LogicalOperator::TableScan(_)))
        .map(|n| n.id())
        .collect();
    assert_eq!(tables.iter().map(|t| t.id()).collect::<HashSet<_>>(), scan_ids);
}

#[test]
fn test_algorithms_agree_through_optimizer() {
    let algorithms: Vec<Box<dyn JoinOrderingAlgorithm>> = vec![
        Box::new(DpCcp::new(
            Rc::new(CostModelSegmented::create_current_build_type_model()),
            Rc::new(CardinalityEstimatorColumnStatistics::new()),
        )),
        Box::new(
            DpCcpTopK::new(
                3,
                Rc::new(CostModelSegmented::create_current_build_type_model()),
                Rc::new(CardinalityEstimatorColumnStatistics::new()),
            )
            .unwrap(),
        ),
    ];

    for algorithm in algorithms {
        let name = algorithm.name().to_string();
        let (plan, _) = cross_product_plan();
        let optimizer = Optimizer::new(vec![Box::new(JoinOrderingRule::new(algorithm))]);
        let optimized = optimizer.optimize(plan).unwrap();
        assert_eq!(
            0,
            count_nodes(&optimized, |op| matches!(
                op.as_join().map(|j| j.join_mode()),
                Some(JoinMode::Cross)
            )),
            "{} kept a cross product",
            name
        );
    }
}
