use crate::cost::{Cost, CostFeature, CostFeatureProxy, CostModel, OperatorType};
use crate::error::OptResult;

/// Closed form cost formulas over row counts.
#[derive(Clone, Debug, Default)]
pub struct CostModelNaive;

impl CostModel for CostModelNaive {
    fn name(&self) -> &'static str {
        "CostModelNaive"
    }

    fn estimate_cost(
        &self,
        operator_type: OperatorType,
        proxy: &dyn CostFeatureProxy,
    ) -> OptResult<Cost> {
        let scalar = |f: CostFeature| -> OptResult<f64> { proxy.extract_feature(f)?.scalar(f) };

        let cost = match operator_type {
            OperatorType::JoinHash => scalar(CostFeature::MajorInputRowCount)? * 1.2,
            OperatorType::TableScan => scalar(CostFeature::LeftInputRowCount)?,
            OperatorType::JoinSortMerge | OperatorType::UnionPositions => {
                scalar(CostFeature::LeftInputRowCountLogN)?
                    + scalar(CostFeature::RightInputRowCountLogN)?
            }
            OperatorType::Product => scalar(CostFeature::InputRowCountProduct)?,
        };
        Ok(Cost::from(cost))
    }
}
