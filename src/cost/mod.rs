//! Cost models.
//!
//! A cost model turns the features of an operator into a cost. Features come from a
//! [`CostFeatureProxy`], so the same model can price a logical plan node or a candidate join plan that
//! doesn't exist as a plan yet.

use std::fmt::{Display, Formatter};

use derive_more::{Add, AddAssign};
use enum_dispatch::enum_dispatch;
use strum_macros::{Display as StrumDisplay, EnumIter};

use crate::error::OptResult;
use crate::expr::PredicateCondition;

mod feature;
pub use feature::*;
mod proxy;
pub use proxy::*;
mod naive;
pub use naive::*;
mod linear;
pub use linear::*;
mod segmented;
pub use segmented::*;

#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd, Add, AddAssign)]
pub struct Cost(f64);

impl Cost {
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl From<f64> for Cost {
    fn from(c: f64) -> Self {
        Cost(c)
    }
}

impl Display for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Physical operators a cost model can price.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, StrumDisplay, EnumIter)]
pub enum OperatorType {
    TableScan,
    JoinHash,
    JoinSortMerge,
    Product,
    UnionPositions,
}

/// Flavors of table scans with distinct cost characteristics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TableScanCategory {
    ColumnValueNumeric,
    ColumnColumnNumeric,
    ColumnValueString,
    ColumnColumnString,
    Like,
}

impl TableScanCategory {
    pub fn of(proxy: &dyn CostFeatureProxy) -> OptResult<Self> {
        let condition = proxy
            .extract_feature(CostFeature::PredicateCondition)?
            .predicate_condition(CostFeature::PredicateCondition)?;
        if matches!(condition, PredicateCondition::Like | PredicateCondition::NotLike) {
            return Ok(TableScanCategory::Like);
        }

        let numeric = proxy
            .extract_feature(CostFeature::LeftDataType)?
            .data_type(CostFeature::LeftDataType)?
            .is_numeric();
        let column_column = proxy
            .extract_feature(CostFeature::RightOperandIsColumn)?
            .boolean(CostFeature::RightOperandIsColumn)?;

        Ok(match (numeric, column_column) {
            (true, false) => TableScanCategory::ColumnValueNumeric,
            (true, true) => TableScanCategory::ColumnColumnNumeric,
            (false, false) => TableScanCategory::ColumnValueString,
            (false, true) => TableScanCategory::ColumnColumnString,
        })
    }
}

#[enum_dispatch]
pub trait CostModel {
    fn name(&self) -> &'static str;

    /// Cost of running `operator_type` on the inputs described by `proxy`.
    fn estimate_cost(
        &self,
        operator_type: OperatorType,
        proxy: &dyn CostFeatureProxy,
    ) -> OptResult<Cost>;
}

#[enum_dispatch(CostModel)]
pub enum CostModelImpl {
    CostModelNaive,
    CostModelLinear,
    CostModelSegmented,
}

/// Dot product of `weights` with the features of `proxy`.
pub(crate) fn weighted_sum(
    weights: &[(CostFeature, f64)],
    proxy: &dyn CostFeatureProxy,
) -> OptResult<f64> {
    let mut sum = 0.0;
    for (feature, weight) in weights {
        sum += weight * proxy.extract_feature(*feature)?.scalar(*feature)?;
    }
    Ok(sum)
}
