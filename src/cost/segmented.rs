use log::trace;

use crate::cost::{
    weighted_sum, Cost, CostFeature, CostFeatureProxy, CostModel, OperatorType, TableScanCategory,
};
use crate::error::OptResult;

/// Features of the table scan model, in coefficient order.
const TABLE_SCAN_FEATURES: [CostFeature; 4] = [
    CostFeature::LeftInputRowCount,
    CostFeature::LeftInputReferenceRowCount,
    CostFeature::OutputRowCount,
    CostFeature::OutputReferenceRowCount,
];

/// Features of the hash join model, in coefficient order.
const JOIN_HASH_FEATURES: [CostFeature; 5] = [
    CostFeature::MajorInputRowCount,
    CostFeature::MajorInputReferenceRowCount,
    CostFeature::MinorInputRowCount,
    CostFeature::MinorInputReferenceRowCount,
    CostFeature::OutputRowCount,
];

const UNION_POSITIONS_FEATURES: [CostFeature; 3] = [
    CostFeature::LeftInputRowCountLogN,
    CostFeature::RightInputRowCountLogN,
    CostFeature::OutputRowCount,
];

const SORT_MERGE_FEATURES: [CostFeature; 3] = [
    CostFeature::LeftInputRowCountLogN,
    CostFeature::RightInputRowCountLogN,
    CostFeature::OutputRowCount,
];

pub(crate) struct SegmentedCoefficients {
    pub(crate) column_value_numeric: [f64; 4],
    pub(crate) column_column_numeric: [f64; 4],
    pub(crate) column_value_string: [f64; 4],
    pub(crate) like: [f64; 4],
    /// Rows are the materialization, clustering, build and probe phases.
    pub(crate) join_hash: [[f64; 5]; 4],
    pub(crate) product: f64,
    /// Rows are the sort, merge and output writing phases.
    pub(crate) union_positions: [[f64; 3]; 3],
    pub(crate) sort_merge: [f64; 3],
}

impl SegmentedCoefficients {
    fn table_scan(&self, category: TableScanCategory) -> &[f64; 4] {
        match category {
            TableScanCategory::ColumnValueNumeric => &self.column_value_numeric,
            TableScanCategory::ColumnColumnNumeric => &self.column_column_numeric,
            // No dedicated calibration for string column comparisons.
            TableScanCategory::ColumnValueString | TableScanCategory::ColumnColumnString => {
                &self.column_value_string
            }
            TableScanCategory::Like => &self.like,
        }
    }
}

pub(crate) static RELEASE_COEFFICIENTS: SegmentedCoefficients = SegmentedCoefficients {
    column_value_numeric: [0.00357555320143, 0.0189155666155, 0.00185955501541, 0.0],
    column_column_numeric: [2.30772081893e-15, 0.0262691992411, 0.0, 0.0],
    column_value_string: [0.0122686866294, 0.0183285792719, 0.00602195854223, 0.0325447573152],
    like: [1.96376974778, 0.0, 11.2450352145, 0.0],
    join_hash: [
        [0.0103009953807, 0.0229193016843, 0.0207545157144, 0.00649976207153, 0.00349376958911],
        [0.00418425435483, -0.000142189284019, 0.00755619815574, -0.000414539011173, 0.000766298349721],
        [0.00482515927315, -0.0018375842829, 0.229990179639, 0.00506143915308, -0.00242361359393],
        [0.0359717530683, -0.00227851496324, 0.154465463074, -0.00436081773056, 0.0035045973279],
    ],
    product: 0.0136870174701,
    union_positions: [
        [0.000238876475788, 0.000247689759188, 0.0],
        [0.00178812744648, 0.00182670264568, 0.000323476902142],
        [0.000732239993574, 0.000390231877899, 0.0021468294427],
    ],
    sort_merge: [0.4391338428178249, 0.4391338428178249, 0.09476596343484817],
};

pub(crate) static DEBUG_COEFFICIENTS: SegmentedCoefficients = SegmentedCoefficients {
    column_value_numeric: [0.151131599208, 0.15565695035, 0.112082904016, 0.0248249284018],
    column_column_numeric: [4.36373080703e-13, 0.265919959986, 0.0, 0.0],
    column_value_string: [0.389646092813, 0.150529434248, 0.140562838787, 0.0576460191188],
    like: [8.0548057056, 0.0, 0.0, 0.0],
    join_hash: [
        [0.236218521822, 0.159532133258, 0.335379374947, 0.0112769794937, 0.0110738685879],
        [0.0276370834782, 0.0012261035992, 0.042467333437, -0.00343449419895, 0.00204183088907],
        [0.0124246779124, -0.00289462813578, 1.06357321626, -0.00464682141054, -0.00778809474253],
        [0.174016568831, -0.00136720303356, 0.204186038348, -0.0182493905997, 0.215731049808],
    ],
    product: 0.0493615676317,
    union_positions: [
        [0.00361414884244, 0.00366948928481, 0.0],
        [0.17550233854, 0.173866054327, 0.236154285219],
        [0.0176795823411, 0.00400452890858, 0.166886875874],
    ],
    sort_merge: [0.4391338428178249, 0.4391338428178249, 0.09476596343484817],
};

/// Cost model splitting operators into phases, each priced by its own small regression.
pub struct CostModelSegmented {
    coefficients: &'static SegmentedCoefficients,
}

fn zip_weights<const N: usize>(
    features: &[CostFeature; N],
    coefficients: &[f64; N],
) -> Vec<(CostFeature, f64)> {
    features
        .iter()
        .copied()
        .zip(coefficients.iter().copied())
        .collect()
}

impl CostModelSegmented {
    pub fn create_debug_build_model() -> Self {
        Self {
            coefficients: &DEBUG_COEFFICIENTS,
        }
    }

    pub fn create_release_build_model() -> Self {
        Self {
            coefficients: &RELEASE_COEFFICIENTS,
        }
    }

    /// Model calibrated for the kind of build this crate is compiled as.
    pub fn create_current_build_type_model() -> Self {
        if cfg!(debug_assertions) {
            Self::create_debug_build_model()
        } else {
            Self::create_release_build_model()
        }
    }

    fn phased_cost<const N: usize>(
        &self,
        operator_type: OperatorType,
        features: &[CostFeature; N],
        phases: &[[f64; N]],
        proxy: &dyn CostFeatureProxy,
    ) -> OptResult<f64> {
        let mut total = 0.0;
        for (idx, phase) in phases.iter().enumerate() {
            let cost = weighted_sum(&zip_weights(features, phase), proxy)?;
            trace!("{} phase {} costs {}", operator_type, idx, cost);
            total += cost;
        }
        Ok(total)
    }
}

impl CostModel for CostModelSegmented {
    fn name(&self) -> &'static str {
        "CostModelSegmented"
    }

    fn estimate_cost(
        &self,
        operator_type: OperatorType,
        proxy: &dyn CostFeatureProxy,
    ) -> OptResult<Cost> {
        let c = self.coefficients;
        let cost = match operator_type {
            OperatorType::TableScan => {
                let category = TableScanCategory::of(proxy)?;
                weighted_sum(&zip_weights(&TABLE_SCAN_FEATURES, c.table_scan(category)), proxy)?
            }
            OperatorType::JoinHash => {
                self.phased_cost(operator_type, &JOIN_HASH_FEATURES, &c.join_hash, proxy)?
            }
            OperatorType::JoinSortMerge => {
                weighted_sum(&zip_weights(&SORT_MERGE_FEATURES, &c.sort_merge), proxy)?
            }
            OperatorType::Product => {
                weighted_sum(&[(CostFeature::InputRowCountProduct, c.product)], proxy)?
            }
            OperatorType::UnionPositions => self.phased_cost(
                operator_type,
                &UNION_POSITIONS_FEATURES,
                &c.union_positions,
                proxy,
            )?,
        };
        Ok(Cost::from(cost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::CostFeatureValue;
    use crate::error::OptimizerError;
    use crate::expr::{DataType, PredicateCondition};

    struct ScanProxy {
        data_type: DataType,
        condition: PredicateCondition,
    }

    impl CostFeatureProxy for ScanProxy {
        fn extract_feature_impl(&self, feature: CostFeature) -> OptResult<CostFeatureValue> {
            Ok(match feature {
                CostFeature::LeftInputRowCount => CostFeatureValue::Scalar(1000.0),
                CostFeature::RightInputRowCount => CostFeatureValue::Scalar(10.0),
                CostFeature::LeftInputIsReferences => CostFeatureValue::Boolean(false),
                CostFeature::RightInputIsReferences => CostFeatureValue::Boolean(true),
                CostFeature::OutputRowCount => CostFeatureValue::Scalar(100.0),
                CostFeature::LeftDataType => CostFeatureValue::DataType(self.data_type),
                CostFeature::PredicateCondition => {
                    CostFeatureValue::PredicateCondition(self.condition)
                }
                CostFeature::RightOperandIsColumn => CostFeatureValue::Boolean(false),
                _ => return Err(OptimizerError::MissingCostFeature(feature).into()),
            })
        }
    }

    fn assert_close(expected: f64, actual: f64) {
        assert!((expected - actual).abs() < 1e-9, "{} != {}", expected, actual);
    }

    #[test]
    fn test_table_scan_categories() {
        let model = CostModelSegmented::create_release_build_model();
        let numeric = ScanProxy {
            data_type: DataType::Int,
            condition: PredicateCondition::Equals,
        };
        let cost = model.estimate_cost(OperatorType::TableScan, &numeric).unwrap();
        assert_close(1000.0 * 0.00357555320143 + 100.0 * 0.00185955501541, cost.value());

        let like = ScanProxy {
            data_type: DataType::String,
            condition: PredicateCondition::Like,
        };
        let cost = model.estimate_cost(OperatorType::TableScan, &like).unwrap();
        assert_close(1000.0 * 1.96376974778 + 100.0 * 11.2450352145, cost.value());
    }

    #[test]
    fn test_join_hash_sums_phases() {
        let model = CostModelSegmented::create_debug_build_model();
        let proxy = ScanProxy {
            data_type: DataType::Int,
            condition: PredicateCondition::Equals,
        };
        let features = [1000.0, 0.0, 10.0, 10.0, 100.0];
        let expected: f64 = DEBUG_COEFFICIENTS
            .join_hash
            .iter()
            .map(|row| row.iter().zip(features.iter()).map(|(c, f)| c * f).sum::<f64>())
            .sum();
        let cost = model.estimate_cost(OperatorType::JoinHash, &proxy).unwrap();
        assert_close(expected, cost.value());
    }

    #[test]
    fn test_product() {
        let model = CostModelSegmented::create_release_build_model();
        let proxy = ScanProxy {
            data_type: DataType::Int,
            condition: PredicateCondition::Equals,
        };
        let cost = model.estimate_cost(OperatorType::Product, &proxy).unwrap();
        assert_close(10000.0 * 0.0136870174701, cost.value());
    }
}
