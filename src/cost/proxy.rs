use crate::cardinality::{Cardinality, CardinalityEstimator};
use crate::cost::{Cost, CostFeature, CostFeatureValue, CostModel, OperatorType};
use crate::error::{OptResult, OptimizerError};
use crate::expr::{ColumnRef, DataType, Operand, PredicateCondition};
use crate::join_ordering::{BaseJoinGraph, JoinPlanAtomicPredicate};
use crate::operator::{JoinMode, LogicalOperator};
use crate::plan::{PlanNode, PlanNodeRef};
use crate::stat::{derive_statistics, TableType};

/// Source of cost features.
///
/// Implementors only provide the raw features of an operator, derived features are computed from them
/// by `extract_feature`.
pub trait CostFeatureProxy {
    /// Raw feature, `MissingCostFeature` if the operator doesn't have it.
    fn extract_feature_impl(&self, feature: CostFeature) -> OptResult<CostFeatureValue>;

    fn extract_feature(&self, feature: CostFeature) -> OptResult<CostFeatureValue> {
        use CostFeature::*;

        let scalar = |f: CostFeature| -> OptResult<f64> { self.extract_feature_impl(f)?.scalar(f) };
        let boolean =
            |f: CostFeature| -> OptResult<bool> { self.extract_feature_impl(f)?.boolean(f) };
        let n_log_n = |n: f64| if n > 1.0 { n * n.log2() } else { 0.0 };
        let reference_row_count = |rows: CostFeature, is_references: CostFeature| -> OptResult<f64> {
            Ok(if boolean(is_references)? {
                scalar(rows)?
            } else {
                0.0
            })
        };
        let left_is_major =
            || -> OptResult<bool> { Ok(scalar(LeftInputRowCount)? >= scalar(RightInputRowCount)?) };

        let value = match feature {
            InputRowCountProduct => {
                CostFeatureValue::Scalar(scalar(LeftInputRowCount)? * scalar(RightInputRowCount)?)
            }
            LeftInputReferenceRowCount => CostFeatureValue::Scalar(reference_row_count(
                LeftInputRowCount,
                LeftInputIsReferences,
            )?),
            RightInputReferenceRowCount => CostFeatureValue::Scalar(reference_row_count(
                RightInputRowCount,
                RightInputIsReferences,
            )?),
            LeftInputRowCountLogN => CostFeatureValue::Scalar(n_log_n(scalar(LeftInputRowCount)?)),
            RightInputRowCountLogN => {
                CostFeatureValue::Scalar(n_log_n(scalar(RightInputRowCount)?))
            }
            LeftInputIsMajor => CostFeatureValue::Boolean(left_is_major()?),
            MajorInputRowCount | MinorInputRowCount => {
                let left = scalar(LeftInputRowCount)?;
                let right = scalar(RightInputRowCount)?;
                CostFeatureValue::Scalar(if feature == MajorInputRowCount {
                    left.max(right)
                } else {
                    left.min(right)
                })
            }
            MajorInputReferenceRowCount | MinorInputReferenceRowCount => {
                let left_side = left_is_major()? == (feature == MajorInputReferenceRowCount);
                let rows = if left_side {
                    reference_row_count(LeftInputRowCount, LeftInputIsReferences)?
                } else {
                    reference_row_count(RightInputRowCount, RightInputIsReferences)?
                };
                CostFeatureValue::Scalar(rows)
            }
            OutputReferenceRowCount => CostFeatureValue::Scalar(reference_row_count(
                OutputRowCount,
                LeftInputIsReferences,
            )?),
            raw => self.extract_feature_impl(raw)?,
        };
        Ok(value)
    }
}

fn missing(feature: CostFeature) -> anyhow::Error {
    OptimizerError::MissingCostFeature(feature).into()
}

/// Features of an operator that only exists as part of a candidate join plan.
#[derive(Clone, Debug, Default)]
pub struct JoinPlanCostFeatureProxy {
    left_input: Option<(Cardinality, bool)>,
    right_input: Option<(Cardinality, bool)>,
    output_row_count: Cardinality,
    left_data_type: Option<DataType>,
    right_data_type: Option<DataType>,
    predicate_condition: Option<PredicateCondition>,
    right_operand_is_column: Option<bool>,
}

/// Whether `graph` is produced as positions into other tables rather than as a stored table.
fn produces_references(graph: &BaseJoinGraph) -> OptResult<bool> {
    match (graph.vertices(), graph.predicates().is_empty()) {
        ([vertex], true) => Ok(derive_statistics(vertex)?.table_type() == TableType::References),
        _ => Ok(true),
    }
}

fn column_data_type(graph: &BaseJoinGraph, column: &ColumnRef) -> OptResult<DataType> {
    graph
        .find_vertex(column)
        .and_then(|v| v.column_data_type(column))
        .ok_or_else(|| OptimizerError::ColumnNotFound(*column).into())
}

impl JoinPlanCostFeatureProxy {
    fn with_predicate(
        mut self,
        graph: &BaseJoinGraph,
        predicate: &JoinPlanAtomicPredicate,
    ) -> OptResult<Self> {
        self.left_data_type = Some(column_data_type(graph, &predicate.left_operand())?);
        self.right_data_type = Some(match predicate.right_operand() {
            Operand::Column(c) => column_data_type(graph, c)?,
            Operand::Value(v) => v.data_type(),
        });
        self.predicate_condition = Some(predicate.condition());
        self.right_operand_is_column = Some(predicate.right_operand().is_column());
        Ok(self)
    }

    /// Scan of `input` applying `predicate`.
    pub fn for_table_scan(
        input: &BaseJoinGraph,
        predicate: &JoinPlanAtomicPredicate,
        estimator: &dyn CardinalityEstimator,
    ) -> OptResult<Self> {
        let output = input.with_predicate(predicate.clone().into());
        Self {
            left_input: Some((estimator.estimate_join_graph(input)?, produces_references(input)?)),
            output_row_count: estimator.estimate_join_graph(&output)?,
            ..Default::default()
        }
        .with_predicate(input, predicate)
    }

    /// Join of `left` and `right`, a product if there is no `primary_predicate`.
    pub fn for_join(
        left: &BaseJoinGraph,
        right: &BaseJoinGraph,
        primary_predicate: Option<&JoinPlanAtomicPredicate>,
        estimator: &dyn CardinalityEstimator,
    ) -> OptResult<Self> {
        let joined = BaseJoinGraph::from_joined_graphs(left, right);
        let output = match primary_predicate {
            Some(p) => joined.with_predicate(p.clone().into()),
            None => joined.clone(),
        };
        let proxy = Self {
            left_input: Some((estimator.estimate_join_graph(left)?, produces_references(left)?)),
            right_input: Some((estimator.estimate_join_graph(right)?, produces_references(right)?)),
            output_row_count: estimator.estimate_join_graph(&output)?,
            ..Default::default()
        };
        match primary_predicate {
            Some(p) => proxy.with_predicate(&joined, p),
            None => Ok(proxy),
        }
    }

    /// Positional union of two branches filtering the same input into `output`.
    pub fn for_union(
        left_branch: &BaseJoinGraph,
        right_branch: &BaseJoinGraph,
        output: &BaseJoinGraph,
        estimator: &dyn CardinalityEstimator,
    ) -> OptResult<Self> {
        Ok(Self {
            left_input: Some((estimator.estimate_join_graph(left_branch)?, true)),
            right_input: Some((estimator.estimate_join_graph(right_branch)?, true)),
            output_row_count: estimator.estimate_join_graph(output)?,
            ..Default::default()
        })
    }
}

impl CostFeatureProxy for JoinPlanCostFeatureProxy {
    fn extract_feature_impl(&self, feature: CostFeature) -> OptResult<CostFeatureValue> {
        let value = match feature {
            CostFeature::LeftInputRowCount => self.left_input.map(|(rows, _)| CostFeatureValue::Scalar(rows)),
            CostFeature::RightInputRowCount => self.right_input.map(|(rows, _)| CostFeatureValue::Scalar(rows)),
            CostFeature::LeftInputIsReferences => {
                self.left_input.map(|(_, refs)| CostFeatureValue::Boolean(refs))
            }
            CostFeature::RightInputIsReferences => {
                self.right_input.map(|(_, refs)| CostFeatureValue::Boolean(refs))
            }
            CostFeature::OutputRowCount => Some(CostFeatureValue::Scalar(self.output_row_count)),
            CostFeature::LeftDataType => self.left_data_type.map(CostFeatureValue::DataType),
            CostFeature::RightDataType => self.right_data_type.map(CostFeatureValue::DataType),
            CostFeature::PredicateCondition => {
                self.predicate_condition.map(CostFeatureValue::PredicateCondition)
            }
            CostFeature::RightOperandIsColumn => {
                self.right_operand_is_column.map(CostFeatureValue::Boolean)
            }
            _ => None,
        };
        value.ok_or_else(|| missing(feature))
    }
}

/// Features of a node of a logical plan, using derived statistics for row counts.
pub struct LqpNodeCostFeatureProxy<'a> {
    node: &'a PlanNode,
}

impl<'a> LqpNodeCostFeatureProxy<'a> {
    pub fn new(node: &'a PlanNode) -> Self {
        Self { node }
    }

    fn input(&self, idx: usize, feature: CostFeature) -> OptResult<&PlanNodeRef> {
        self.node.inputs().get(idx).ok_or_else(|| missing(feature))
    }

    fn input_column_data_type(&self, column: &ColumnRef) -> Option<DataType> {
        self.node
            .inputs()
            .iter()
            .find_map(|input| input.column_data_type(column))
    }

    /// Left column, condition and right operand of the node's predicate.
    fn predicate(&self) -> Option<(ColumnRef, PredicateCondition, Operand)> {
        match self.node.operator() {
            LogicalOperator::Predicate(p) => Some((p.column(), p.condition(), p.operand().clone())),
            LogicalOperator::Join(j) => j
                .condition()
                .map(|c| (c.left(), c.condition(), Operand::Column(c.right()))),
            _ => None,
        }
    }
}

impl<'a> CostFeatureProxy for LqpNodeCostFeatureProxy<'a> {
    fn extract_feature_impl(&self, feature: CostFeature) -> OptResult<CostFeatureValue> {
        let value = match feature {
            CostFeature::LeftInputRowCount => CostFeatureValue::Scalar(
                derive_statistics(self.input(0, feature)?)?.row_count(),
            ),
            CostFeature::RightInputRowCount => CostFeatureValue::Scalar(
                derive_statistics(self.input(1, feature)?)?.row_count(),
            ),
            CostFeature::LeftInputIsReferences => CostFeatureValue::Boolean(
                derive_statistics(self.input(0, feature)?)?.table_type() == TableType::References,
            ),
            CostFeature::RightInputIsReferences => CostFeatureValue::Boolean(
                derive_statistics(self.input(1, feature)?)?.table_type() == TableType::References,
            ),
            CostFeature::OutputRowCount => {
                CostFeatureValue::Scalar(derive_statistics(self.node)?.row_count())
            }
            CostFeature::LeftDataType => {
                let (column, _, _) = self.predicate().ok_or_else(|| missing(feature))?;
                CostFeatureValue::DataType(
                    self.input_column_data_type(&column)
                        .ok_or(OptimizerError::ColumnNotFound(column))?,
                )
            }
            CostFeature::RightDataType => {
                let (_, _, operand) = self.predicate().ok_or_else(|| missing(feature))?;
                CostFeatureValue::DataType(match operand {
                    Operand::Column(c) => self
                        .input_column_data_type(&c)
                        .ok_or(OptimizerError::ColumnNotFound(c))?,
                    Operand::Value(v) => v.data_type(),
                })
            }
            CostFeature::PredicateCondition => {
                let (_, condition, _) = self.predicate().ok_or_else(|| missing(feature))?;
                CostFeatureValue::PredicateCondition(condition)
            }
            CostFeature::RightOperandIsColumn => {
                let (_, _, operand) = self.predicate().ok_or_else(|| missing(feature))?;
                CostFeatureValue::Boolean(operand.is_column())
            }
            _ => return Err(missing(feature)),
        };
        Ok(value)
    }
}

/// Physical operator a logical plan node is priced as, `None` for nodes considered free.
pub fn lqp_node_operator_type(node: &PlanNode) -> Option<OperatorType> {
    match node.operator() {
        LogicalOperator::Predicate(_) => Some(OperatorType::TableScan),
        LogicalOperator::Join(join) => match (join.join_mode(), join.condition()) {
            (JoinMode::Inner, Some(c)) if c.condition() == PredicateCondition::Equals => {
                Some(OperatorType::JoinHash)
            }
            (JoinMode::Inner, Some(_)) => Some(OperatorType::JoinSortMerge),
            _ => Some(OperatorType::Product),
        },
        LogicalOperator::Union(_) => Some(OperatorType::UnionPositions),
        LogicalOperator::TableScan(_) | LogicalOperator::Limit(_) => None,
    }
}

/// Total cost of all nodes of a plan.
pub fn estimate_plan_cost(cost_model: &dyn CostModel, root: &PlanNodeRef) -> OptResult<Cost> {
    let mut cost = Cost::default();
    for node in root.bfs_iterator() {
        if let Some(operator_type) = lqp_node_operator_type(&node) {
            cost += cost_model.estimate_cost(operator_type, &LqpNodeCostFeatureProxy::new(&node))?;
        }
    }
    Ok(cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Value;
    use crate::operator::{ColumnDefinition, TableScan};
    use crate::plan::LogicalPlanBuilder;
    use crate::stat::{ColumnStatistics, TableStatistics};

    struct FixedProxy {
        left: f64,
        right: f64,
        left_refs: bool,
        right_refs: bool,
    }

    impl CostFeatureProxy for FixedProxy {
        fn extract_feature_impl(&self, feature: CostFeature) -> OptResult<CostFeatureValue> {
            match feature {
                CostFeature::LeftInputRowCount => Ok(CostFeatureValue::Scalar(self.left)),
                CostFeature::RightInputRowCount => Ok(CostFeatureValue::Scalar(self.right)),
                CostFeature::LeftInputIsReferences => Ok(CostFeatureValue::Boolean(self.left_refs)),
                CostFeature::RightInputIsReferences => {
                    Ok(CostFeatureValue::Boolean(self.right_refs))
                }
                CostFeature::OutputRowCount => Ok(CostFeatureValue::Scalar(5.0)),
                _ => Err(missing(feature)),
            }
        }
    }

    fn scalar(proxy: &dyn CostFeatureProxy, feature: CostFeature) -> f64 {
        proxy.extract_feature(feature).unwrap().scalar(feature).unwrap()
    }

    #[test]
    fn test_derived_features() {
        let proxy = FixedProxy {
            left: 4.0,
            right: 8.0,
            left_refs: true,
            right_refs: false,
        };
        assert_eq!(32.0, scalar(&proxy, CostFeature::InputRowCountProduct));
        assert_eq!(8.0, scalar(&proxy, CostFeature::LeftInputRowCountLogN));
        assert_eq!(24.0, scalar(&proxy, CostFeature::RightInputRowCountLogN));
        assert_eq!(8.0, scalar(&proxy, CostFeature::MajorInputRowCount));
        assert_eq!(4.0, scalar(&proxy, CostFeature::MinorInputRowCount));
        assert_eq!(4.0, scalar(&proxy, CostFeature::LeftInputReferenceRowCount));
        assert_eq!(0.0, scalar(&proxy, CostFeature::RightInputReferenceRowCount));
        assert_eq!(0.0, scalar(&proxy, CostFeature::MajorInputReferenceRowCount));
        assert_eq!(4.0, scalar(&proxy, CostFeature::MinorInputReferenceRowCount));
        assert_eq!(5.0, scalar(&proxy, CostFeature::OutputReferenceRowCount));
        assert_eq!(0.0, scalar(&proxy, CostFeature::LeftInputIsMajor));

        let error = proxy.extract_feature(CostFeature::LeftDataType).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<OptimizerError>(),
            Some(OptimizerError::MissingCostFeature(CostFeature::LeftDataType))
        ));
    }

    #[test]
    fn test_lqp_node_proxy() {
        let statistics = TableStatistics::stored(
            20.0,
            vec![ColumnStatistics::numeric(DataType::Int, 10.0, 1.0, 10.0)],
        );
        let x = LogicalPlanBuilder::scan(
            TableScan::new("x", vec![ColumnDefinition::new("a", DataType::Int)])
                .with_statistics(statistics),
        )
        .node();
        let predicate = LogicalPlanBuilder::from(x.clone())
            .predicate(
                ColumnRef::new(x.id(), 0),
                PredicateCondition::GreaterThan,
                Value::from(5),
            )
            .node();

        let proxy = LqpNodeCostFeatureProxy::new(&predicate);
        assert_eq!(20.0, scalar(&proxy, CostFeature::LeftInputRowCount));
        assert_eq!(10.0, scalar(&proxy, CostFeature::OutputRowCount));
        assert_eq!(0.0, scalar(&proxy, CostFeature::LeftInputReferenceRowCount));
        assert_eq!(
            DataType::Int,
            proxy
                .extract_feature(CostFeature::LeftDataType)
                .unwrap()
                .data_type(CostFeature::LeftDataType)
                .unwrap()
        );
        assert!(proxy.extract_feature(CostFeature::RightInputRowCount).is_err());
        assert_eq!(Some(OperatorType::TableScan), lqp_node_operator_type(&predicate));
        assert_eq!(None, lqp_node_operator_type(&x));
    }
}
