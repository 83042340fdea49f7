//! Table and column statistics, and the selectivity estimation built on them.
//!
//! Statistics are estimates, missing statistics fall back to the `DEFAULT_*` selectivities and never
//! fail an estimation.

use std::rc::Rc;

use anyhow::anyhow;

use crate::error::OptResult;
use crate::expr::{DataType, Operand, PredicateCondition, Value};
use crate::operator::LogicalOperator;
use crate::plan::PlanNode;

pub const DEFAULT_EQUALS_SELECTIVITY: f64 = 0.1;
pub const DEFAULT_OPEN_ENDED_SELECTIVITY: f64 = 1.0 / 3.0;
pub const DEFAULT_LIKE_SELECTIVITY: f64 = 0.1;
/// Weight of the right branch of a disjunction, rows qualifying for both branches are counted once.
pub const DEFAULT_DISJUNCTION_SELECTIVITY: f64 = 0.2;
/// Row count assumed for stored tables without statistics.
pub const DEFAULT_ROW_COUNT: f64 = 1000.0;

/// Whether a table holds data itself or positions into other tables.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TableType {
    Data,
    References,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ColumnStatistics {
    data_type: DataType,
    null_value_ratio: f64,
    distinct_count: f64,
    min: f64,
    max: f64,
}

/// Selectivity of a predicate on a column and the column's statistics after applying it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ColumnSelectivity {
    pub selectivity: f64,
    pub column: ColumnStatistics,
}

/// Selectivity of a predicate comparing two columns, and both columns afterwards.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ColumnPairSelectivity {
    pub selectivity: f64,
    pub left: ColumnStatistics,
    pub right: ColumnStatistics,
}

impl ColumnStatistics {
    pub fn new(data_type: DataType, null_value_ratio: f64, distinct_count: f64, min: f64, max: f64) -> Self {
        Self {
            data_type,
            null_value_ratio,
            distinct_count,
            min,
            max,
        }
    }

    /// Statistics of a non-null numeric column.
    pub fn numeric(data_type: DataType, distinct_count: f64, min: f64, max: f64) -> Self {
        Self::new(data_type, 0.0, distinct_count, min, max)
    }

    /// Statistics of a string column, only the distinct count is meaningful.
    pub fn string(distinct_count: f64) -> Self {
        Self::new(DataType::String, 0.0, distinct_count, 0.0, 0.0)
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn null_value_ratio(&self) -> f64 {
        self.null_value_ratio
    }

    pub fn distinct_count(&self) -> f64 {
        self.distinct_count
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    fn non_null_ratio(&self) -> f64 {
        1.0 - self.null_value_ratio
    }

    /// Distinct values can't outnumber rows.
    pub fn cap_distinct_count(&mut self, row_count: f64) {
        if self.distinct_count > row_count {
            self.distinct_count = row_count;
        }
    }

    /// Share of the value range `[min, max]` covered by `[lo, hi]`.
    fn range_share(&self, lo: f64, hi: f64) -> f64 {
        let lo = lo.max(self.min);
        let hi = hi.min(self.max);
        if lo > hi {
            return 0.0;
        }

        if self.data_type.is_integral() {
            (hi - lo + 1.0) / (self.max - self.min + 1.0)
        } else if self.max == self.min {
            1.0
        } else {
            (hi - lo) / (self.max - self.min)
        }
    }

    /// Value range qualifying for `column <condition> value`, `None` for non range conditions.
    fn qualifying_range(&self, condition: PredicateCondition, value: f64) -> Option<(f64, f64)> {
        let integral = self.data_type.is_integral();
        match condition {
            PredicateCondition::LessThan if integral => Some((self.min, value.ceil() - 1.0)),
            PredicateCondition::LessThan | PredicateCondition::LessThanEquals if !integral => {
                Some((self.min, value))
            }
            PredicateCondition::LessThanEquals => Some((self.min, value.floor())),
            PredicateCondition::GreaterThan if integral => Some((value.floor() + 1.0, self.max)),
            PredicateCondition::GreaterThan | PredicateCondition::GreaterThanEquals if !integral => {
                Some((value, self.max))
            }
            PredicateCondition::GreaterThanEquals => Some((value.ceil(), self.max)),
            _ => None,
        }
    }

    fn filtered(&self, selectivity: f64) -> ColumnSelectivity {
        ColumnSelectivity {
            selectivity: selectivity * self.non_null_ratio(),
            column: *self,
        }
    }

    /// Estimates `self <condition> value`.
    pub fn estimate_predicate_with_value(
        &self,
        condition: PredicateCondition,
        value: &Value,
    ) -> ColumnSelectivity {
        let numeric_value = value.as_f64().filter(|_| self.data_type.is_numeric());
        let numeric_value = match numeric_value {
            Some(v) => v,
            None => return self.estimate_non_numeric(condition),
        };

        let in_range = numeric_value >= self.min && numeric_value <= self.max;
        match condition {
            PredicateCondition::Equals => {
                if !in_range || self.distinct_count <= 0.0 {
                    return ColumnSelectivity {
                        selectivity: 0.0,
                        column: ColumnStatistics {
                            distinct_count: 0.0,
                            null_value_ratio: 0.0,
                            ..*self
                        },
                    };
                }
                ColumnSelectivity {
                    selectivity: self.non_null_ratio() / self.distinct_count,
                    column: ColumnStatistics {
                        distinct_count: 1.0,
                        null_value_ratio: 0.0,
                        min: numeric_value,
                        max: numeric_value,
                        ..*self
                    },
                }
            }
            PredicateCondition::NotEquals => {
                if !in_range || self.distinct_count <= 0.0 {
                    return self.filtered(1.0);
                }
                ColumnSelectivity {
                    selectivity: self.non_null_ratio() * (self.distinct_count - 1.0)
                        / self.distinct_count,
                    column: ColumnStatistics {
                        distinct_count: self.distinct_count - 1.0,
                        null_value_ratio: 0.0,
                        ..*self
                    },
                }
            }
            PredicateCondition::Like => self.filtered(DEFAULT_LIKE_SELECTIVITY),
            PredicateCondition::NotLike => self.filtered(1.0 - DEFAULT_LIKE_SELECTIVITY),
            range_condition => {
                let (lo, hi) = self
                    .qualifying_range(range_condition, numeric_value)
                    .unwrap_or((self.min, self.max));
                let share = self.range_share(lo, hi);
                ColumnSelectivity {
                    selectivity: share * self.non_null_ratio(),
                    column: ColumnStatistics {
                        distinct_count: self.distinct_count * share,
                        null_value_ratio: 0.0,
                        min: lo.max(self.min),
                        max: hi.min(self.max),
                        ..*self
                    },
                }
            }
        }
    }

    fn estimate_non_numeric(&self, condition: PredicateCondition) -> ColumnSelectivity {
        let equals = if self.distinct_count > 0.0 {
            1.0 / self.distinct_count
        } else {
            DEFAULT_EQUALS_SELECTIVITY
        };
        let selectivity = match condition {
            PredicateCondition::Equals => equals,
            PredicateCondition::NotEquals => 1.0 - equals,
            PredicateCondition::Like => DEFAULT_LIKE_SELECTIVITY,
            PredicateCondition::NotLike => 1.0 - DEFAULT_LIKE_SELECTIVITY,
            _ => DEFAULT_OPEN_ENDED_SELECTIVITY,
        };
        let mut estimate = self.filtered(selectivity);
        if condition == PredicateCondition::Equals {
            estimate.column.distinct_count = self.distinct_count.min(1.0);
        }
        estimate
    }

    /// Estimates `self <condition> other`.
    pub fn estimate_predicate_with_column(
        &self,
        condition: PredicateCondition,
        other: &ColumnStatistics,
    ) -> ColumnPairSelectivity {
        let null_factor = self.non_null_ratio() * other.non_null_ratio();
        let unchanged = |selectivity: f64| ColumnPairSelectivity {
            selectivity: selectivity * null_factor,
            left: *self,
            right: *other,
        };

        if !self.data_type.is_numeric() || !other.data_type.is_numeric() {
            let max_distinct = self.distinct_count.max(other.distinct_count);
            let equals = if max_distinct > 0.0 {
                1.0 / max_distinct
            } else {
                DEFAULT_EQUALS_SELECTIVITY
            };
            return match condition {
                PredicateCondition::Equals => unchanged(equals),
                PredicateCondition::NotEquals => unchanged(1.0 - equals),
                PredicateCondition::Like => unchanged(DEFAULT_LIKE_SELECTIVITY),
                PredicateCondition::NotLike => unchanged(1.0 - DEFAULT_LIKE_SELECTIVITY),
                _ => unchanged(DEFAULT_OPEN_ENDED_SELECTIVITY),
            };
        }

        let lo = self.min.max(other.min);
        let hi = self.max.min(other.max);
        let overlapping = lo <= hi;

        match condition {
            PredicateCondition::Equals | PredicateCondition::NotEquals => {
                let (selectivity, distinct_count) = if overlapping {
                    let left_ratio = self.range_share(lo, hi);
                    let right_ratio = other.range_share(lo, hi);
                    let left_distinct = self.distinct_count * left_ratio;
                    let right_distinct = other.distinct_count * right_ratio;
                    let max_distinct = left_distinct.max(right_distinct);
                    let selectivity = if max_distinct > 0.0 {
                        left_ratio * right_ratio / max_distinct
                    } else {
                        0.0
                    };
                    (selectivity, left_distinct.min(right_distinct))
                } else {
                    (0.0, 0.0)
                };

                if condition == PredicateCondition::NotEquals {
                    return unchanged(1.0 - selectivity);
                }
                let joined = |column: &ColumnStatistics| ColumnStatistics {
                    null_value_ratio: 0.0,
                    distinct_count,
                    min: lo,
                    max: hi,
                    ..*column
                };
                ColumnPairSelectivity {
                    selectivity: selectivity * null_factor,
                    left: joined(self),
                    right: joined(other),
                }
            }
            PredicateCondition::LessThan | PredicateCondition::LessThanEquals => {
                if self.max < other.min {
                    unchanged(1.0)
                } else if self.min > other.max {
                    unchanged(0.0)
                } else {
                    unchanged(DEFAULT_OPEN_ENDED_SELECTIVITY)
                }
            }
            PredicateCondition::GreaterThan | PredicateCondition::GreaterThanEquals => {
                if self.min > other.max {
                    unchanged(1.0)
                } else if self.max < other.min {
                    unchanged(0.0)
                } else {
                    unchanged(DEFAULT_OPEN_ENDED_SELECTIVITY)
                }
            }
            PredicateCondition::Like => unchanged(DEFAULT_LIKE_SELECTIVITY),
            PredicateCondition::NotLike => unchanged(1.0 - DEFAULT_LIKE_SELECTIVITY),
        }
    }
}

/// Default selectivity of `column <condition> value` when the column has no statistics.
pub fn default_selectivity(condition: PredicateCondition) -> f64 {
    match condition {
        PredicateCondition::Equals => DEFAULT_EQUALS_SELECTIVITY,
        PredicateCondition::NotEquals => 1.0 - DEFAULT_EQUALS_SELECTIVITY,
        PredicateCondition::Like => DEFAULT_LIKE_SELECTIVITY,
        PredicateCondition::NotLike => 1.0 - DEFAULT_LIKE_SELECTIVITY,
        _ => DEFAULT_OPEN_ENDED_SELECTIVITY,
    }
}

/// Statistics of the output of a plan node.
///
/// `column_statistics` is aligned with the node's output columns, `None` marks a column without
/// statistics.
#[derive(Clone, Debug, PartialEq)]
pub struct TableStatistics {
    table_type: TableType,
    row_count: f64,
    column_statistics: Vec<Option<ColumnStatistics>>,
}

impl TableStatistics {
    pub fn new(
        table_type: TableType,
        row_count: f64,
        column_statistics: Vec<Option<ColumnStatistics>>,
    ) -> Self {
        Self {
            table_type,
            row_count,
            column_statistics,
        }
    }

    /// Statistics of a stored table with statistics for every column.
    pub fn stored(row_count: f64, column_statistics: Vec<ColumnStatistics>) -> Self {
        Self::new(
            TableType::Data,
            row_count,
            column_statistics.into_iter().map(Some).collect(),
        )
    }

    pub fn table_type(&self) -> TableType {
        self.table_type
    }

    pub fn row_count(&self) -> f64 {
        self.row_count
    }

    pub fn column_statistics(&self) -> &[Option<ColumnStatistics>] {
        &self.column_statistics
    }

    fn column(&self, column_id: usize) -> OptResult<Option<ColumnStatistics>> {
        self.column_statistics
            .get(column_id)
            .copied()
            .ok_or_else(|| anyhow!("no statistics slot for column {}", column_id))
    }

    fn with_row_count(mut self, row_count: f64) -> Self {
        self.row_count = row_count;
        self.table_type = TableType::References;
        for column in self.column_statistics.iter_mut().flatten() {
            column.cap_distinct_count(row_count);
        }
        self
    }

    /// Statistics after filtering `column_id <condition> operand`, where a column operand is given by
    /// its position in this table.
    pub fn predicate_statistics(
        &self,
        column_id: usize,
        condition: PredicateCondition,
        operand: &PredicateOperandStatistics,
    ) -> OptResult<TableStatistics> {
        let mut result = self.clone();
        let left = self.column(column_id)?;
        let selectivity = match (left, operand) {
            (Some(left), PredicateOperandStatistics::Value(value)) => {
                let estimate = left.estimate_predicate_with_value(condition, value);
                result.column_statistics[column_id] = Some(estimate.column);
                estimate.selectivity
            }
            (Some(left), PredicateOperandStatistics::Column(right_id)) => {
                match self.column(*right_id)? {
                    Some(right) => {
                        let estimate = left.estimate_predicate_with_column(condition, &right);
                        result.column_statistics[column_id] = Some(estimate.left);
                        result.column_statistics[*right_id] = Some(estimate.right);
                        estimate.selectivity
                    }
                    None => default_selectivity(condition),
                }
            }
            (None, _) => default_selectivity(condition),
        };

        let row_count = self.row_count * selectivity;
        Ok(result.with_row_count(row_count))
    }

    /// Cartesian product of both inputs.
    pub fn cross_join_statistics(&self, right: &TableStatistics) -> TableStatistics {
        let mut column_statistics = self.column_statistics.clone();
        column_statistics.extend(right.column_statistics.iter().copied());
        Self::new(
            TableType::References,
            self.row_count * right.row_count,
            column_statistics,
        )
    }

    /// Inner join of both inputs on `left_column <condition> right_column`, with column ids relative
    /// to their own input.
    pub fn join_statistics(
        &self,
        right: &TableStatistics,
        left_column: usize,
        condition: PredicateCondition,
        right_column: usize,
    ) -> OptResult<TableStatistics> {
        let right_column = self.column_statistics.len() + right_column;
        self.cross_join_statistics(right).predicate_statistics(
            left_column,
            condition,
            &PredicateOperandStatistics::Column(right_column),
        )
    }

    /// Positional union of two filtered versions of the same input, keeping the left column statistics.
    pub fn disjunction_statistics(&self, right: &TableStatistics) -> TableStatistics {
        let row_count = self.row_count + right.row_count * DEFAULT_DISJUNCTION_SELECTIVITY;
        self.clone().with_row_count(row_count)
    }

    pub fn limit_statistics(&self, limit: usize) -> TableStatistics {
        let row_count = self.row_count.min(limit as f64);
        self.clone().with_row_count(row_count)
    }
}

pub enum PredicateOperandStatistics {
    Value(Value),
    Column(usize),
}

/// Derives the output statistics of a plan node from its inputs.
///
/// Stored tables without statistics report `DEFAULT_ROW_COUNT` rows and no column statistics.
pub fn derive_statistics(node: &PlanNode) -> OptResult<Rc<TableStatistics>> {
    let input_statistics = |idx: usize| -> OptResult<Rc<TableStatistics>> {
        let input = node
            .inputs()
            .get(idx)
            .ok_or_else(|| anyhow!("plan node #{} misses input {}", node.id(), idx))?;
        derive_statistics(input)
    };

    let statistics = match node.operator() {
        LogicalOperator::TableScan(scan) => {
            return Ok(scan.statistics().cloned().unwrap_or_else(|| {
                Rc::new(TableStatistics::new(
                    TableType::Data,
                    DEFAULT_ROW_COUNT,
                    vec![None; scan.columns().len()],
                ))
            }))
        }
        LogicalOperator::Predicate(predicate) => {
            let input = node
                .left_input()
                .ok_or_else(|| anyhow!("predicate #{} has no input", node.id()))?;
            let column_id = input
                .find_output_column_id(&predicate.column())
                .ok_or_else(|| anyhow!("column {} not found below #{}", predicate.column(), node.id()))?;
            let operand = match predicate.operand() {
                Operand::Value(v) => PredicateOperandStatistics::Value(v.clone()),
                Operand::Column(c) => PredicateOperandStatistics::Column(
                    input
                        .find_output_column_id(c)
                        .ok_or_else(|| anyhow!("column {} not found below #{}", c, node.id()))?,
                ),
            };
            input_statistics(0)?.predicate_statistics(column_id, predicate.condition(), &operand)?
        }
        LogicalOperator::Join(join) => {
            let left = input_statistics(0)?;
            let right = input_statistics(1)?;
            match join.condition() {
                Some(condition) => {
                    let missing = || anyhow!("join condition of #{} can't be resolved", node.id());
                    let left_column = node
                        .left_input()
                        .and_then(|i| i.find_output_column_id(&condition.left()))
                        .ok_or_else(missing)?;
                    let right_column = node
                        .right_input()
                        .and_then(|i| i.find_output_column_id(&condition.right()))
                        .ok_or_else(missing)?;
                    left.join_statistics(&right, left_column, condition.condition(), right_column)?
                }
                None => left.cross_join_statistics(&right),
            }
        }
        LogicalOperator::Union(_) => {
            input_statistics(0)?.disjunction_statistics(&*input_statistics(1)?)
        }
        LogicalOperator::Limit(limit) => input_statistics(0)?.limit_statistics(limit.row_count()),
    };

    Ok(Rc::new(statistics))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(expected: f64, actual: f64) {
        assert!(
            (expected - actual).abs() < 1e-9,
            "expected {}, actual {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_integral_range_is_discrete() {
        let column = ColumnStatistics::numeric(DataType::Int, 10.0, 1.0, 10.0);
        let estimate =
            column.estimate_predicate_with_value(PredicateCondition::GreaterThan, &Value::from(5));
        assert_close(0.5, estimate.selectivity);
        assert_close(6.0, estimate.column.min());
        assert_close(5.0, estimate.column.distinct_count());

        let estimate =
            column.estimate_predicate_with_value(PredicateCondition::LessThan, &Value::from(4));
        assert_close(0.3, estimate.selectivity);
    }

    #[test]
    fn test_float_range_is_continuous() {
        let column = ColumnStatistics::numeric(DataType::Double, 100.0, 0.0, 10.0);
        let estimate = column
            .estimate_predicate_with_value(PredicateCondition::LessThanEquals, &Value::from(2.5));
        assert_close(0.25, estimate.selectivity);
    }

    #[test]
    fn test_equals_and_nulls() {
        let column = ColumnStatistics::new(DataType::Int, 0.5, 4.0, 1.0, 8.0);
        let estimate = column.estimate_predicate_with_value(PredicateCondition::Equals, &Value::from(3));
        assert_close(0.125, estimate.selectivity);
        assert_close(1.0, estimate.column.distinct_count());

        let outside = column.estimate_predicate_with_value(PredicateCondition::Equals, &Value::from(9));
        assert_close(0.0, outside.selectivity);

        let not_equals =
            column.estimate_predicate_with_value(PredicateCondition::NotEquals, &Value::from(3));
        assert_close(0.375, not_equals.selectivity);
    }

    #[test]
    fn test_column_equals_column() {
        let x = ColumnStatistics::numeric(DataType::Int, 10.0, 1.0, 10.0);
        let y = ColumnStatistics::numeric(DataType::Int, 3.0, 5.0, 7.0);
        let estimate = x.estimate_predicate_with_column(PredicateCondition::Equals, &y);
        assert_close(0.1, estimate.selectivity);
        assert_close(5.0, estimate.left.min());
        assert_close(7.0, estimate.right.max());
        assert_close(3.0, estimate.left.distinct_count());

        let disjoint = ColumnStatistics::numeric(DataType::Int, 3.0, 20.0, 30.0);
        let estimate = x.estimate_predicate_with_column(PredicateCondition::Equals, &disjoint);
        assert_close(0.0, estimate.selectivity);
        let estimate = x.estimate_predicate_with_column(PredicateCondition::LessThan, &disjoint);
        assert_close(1.0, estimate.selectivity);
    }

    #[test]
    fn test_defaults_without_statistics() {
        let statistics = TableStatistics::new(TableType::Data, 300.0, vec![None]);
        let filtered = statistics
            .predicate_statistics(
                0,
                PredicateCondition::GreaterThan,
                &PredicateOperandStatistics::Value(Value::from(1)),
            )
            .unwrap();
        assert_close(100.0, filtered.row_count());
        assert_eq!(TableType::References, filtered.table_type());

        let string = ColumnStatistics::string(0.0);
        let estimate = string.estimate_predicate_with_value(PredicateCondition::Equals, &Value::from("a"));
        assert_close(DEFAULT_EQUALS_SELECTIVITY, estimate.selectivity);
    }

    #[test]
    fn test_distinct_count_capped_by_row_count() {
        let statistics = TableStatistics::stored(
            3.0,
            vec![ColumnStatistics::numeric(DataType::Int, 10.0, 1.0, 10.0)],
        );
        let filtered = statistics
            .predicate_statistics(
                0,
                PredicateCondition::GreaterThan,
                &PredicateOperandStatistics::Value(Value::from(8)),
            )
            .unwrap();
        assert_close(0.6, filtered.row_count());
        let column = filtered.column_statistics()[0].unwrap();
        assert_close(0.6, column.distinct_count());
    }

    #[test]
    fn test_disjunction_and_limit() {
        let left = TableStatistics::stored(6.0, vec![]);
        let right = TableStatistics::stored(4.0, vec![]);
        assert_close(6.8, left.disjunction_statistics(&right).row_count());
        assert_close(2.0, left.limit_statistics(2).row_count());
    }
}
