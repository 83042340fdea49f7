use std::collections::HashMap;

use anyhow::ensure;

use crate::cost::{
    weighted_sum, Cost, CostFeatureProxy, CostFeatureWeights, CostModel, OperatorType,
    TableScanCategory, NUMERICAL_FEATURES,
};
use crate::cost::CostFeature::*;
use crate::error::OptResult;

/// Feature weights of every operator.
#[derive(Clone, Debug, Default)]
pub struct LinearWeights {
    table_scans: HashMap<TableScanCategory, CostFeatureWeights>,
    operators: HashMap<OperatorType, CostFeatureWeights>,
}

impl LinearWeights {
    pub fn with_table_scan(mut self, category: TableScanCategory, weights: CostFeatureWeights) -> Self {
        self.table_scans.insert(category, weights);
        self
    }

    /// Weights of any operator but `TableScan`, which is weighted per category.
    pub fn with_operator(mut self, operator_type: OperatorType, weights: CostFeatureWeights) -> Self {
        self.operators.insert(operator_type, weights);
        self
    }

    fn all_weights(&self) -> impl Iterator<Item = &CostFeatureWeights> {
        self.table_scans.values().chain(self.operators.values())
    }
}

fn table_scan_weights(scan: [f64; 4]) -> CostFeatureWeights {
    vec![
        (LeftInputRowCount, scan[0]),
        (LeftInputReferenceRowCount, scan[1]),
        (OutputRowCount, scan[2]),
        (OutputReferenceRowCount, scan[3]),
    ]
}

lazy_static! {
    static ref RELEASE_WEIGHTS: LinearWeights = {
        let string_scan = [0.0122686866294, 0.0183285792719, 0.00602195854223, 0.0325447573152];
        LinearWeights::default()
            .with_table_scan(
                TableScanCategory::ColumnValueNumeric,
                table_scan_weights([0.00357555320143, 0.0189155666155, 0.00185955501541, 0.0]),
            )
            .with_table_scan(
                TableScanCategory::ColumnColumnNumeric,
                table_scan_weights([2.30772081893e-15, 0.0262691992411, 0.0, 0.0]),
            )
            .with_table_scan(TableScanCategory::ColumnValueString, table_scan_weights(string_scan))
            .with_table_scan(TableScanCategory::ColumnColumnString, table_scan_weights(string_scan))
            .with_table_scan(
                TableScanCategory::Like,
                table_scan_weights([1.96376974778, 0.0, 11.2450352145, 0.0]),
            )
            .with_operator(
                OperatorType::JoinHash,
                vec![
                    (MajorInputRowCount, 0.05528220207698),
                    (MajorInputReferenceRowCount, 0.018661013154141),
                    (MinorInputRowCount, 0.41276635658314),
                    (MinorInputReferenceRowCount, 0.006785844482877),
                    (OutputRowCount, 0.005341051672801),
                ],
            )
            .with_operator(
                OperatorType::JoinSortMerge,
                vec![
                    (LeftInputRowCountLogN, 0.4391338428178249),
                    (RightInputRowCountLogN, 0.4391338428178249),
                    (OutputRowCount, 0.09476596343484817),
                ],
            )
            .with_operator(OperatorType::Product, vec![(InputRowCountProduct, 0.0136870174701)])
            .with_operator(
                OperatorType::UnionPositions,
                vec![
                    (LeftInputRowCountLogN, 0.002759243915842),
                    (RightInputRowCountLogN, 0.002464624282767),
                    (OutputRowCount, 0.002470306344842),
                ],
            )
    };

    static ref DEBUG_WEIGHTS: LinearWeights = {
        let string_scan = [0.389646092813, 0.150529434248, 0.140562838787, 0.0576460191188];
        LinearWeights::default()
            .with_table_scan(
                TableScanCategory::ColumnValueNumeric,
                table_scan_weights([0.151131599208, 0.15565695035, 0.112082904016, 0.0248249284018]),
            )
            .with_table_scan(
                TableScanCategory::ColumnColumnNumeric,
                table_scan_weights([4.36373080703e-13, 0.265919959986, 0.0, 0.0]),
            )
            .with_table_scan(TableScanCategory::ColumnValueString, table_scan_weights(string_scan))
            .with_table_scan(TableScanCategory::ColumnColumnString, table_scan_weights(string_scan))
            .with_table_scan(
                TableScanCategory::Like,
                table_scan_weights([8.0548057056, 0.0, 0.0, 0.0]),
            )
            .with_operator(
                OperatorType::JoinHash,
                vec![
                    (MajorInputRowCount, 0.4502968520436),
                    (MajorInputReferenceRowCount, 0.15649640568786),
                    (MinorInputRowCount, 1.645605962992),
                    (MinorInputReferenceRowCount, -0.01505372671549),
                    (OutputRowCount, 0.22105865454244),
                ],
            )
            .with_operator(
                OperatorType::JoinSortMerge,
                vec![
                    (LeftInputRowCountLogN, 0.4391338428178249),
                    (RightInputRowCountLogN, 0.4391338428178249),
                    (OutputRowCount, 0.09476596343484817),
                ],
            )
            .with_operator(OperatorType::Product, vec![(InputRowCountProduct, 0.0493615676317)])
            .with_operator(
                OperatorType::UnionPositions,
                vec![
                    (LeftInputRowCountLogN, 0.19679606972354),
                    (RightInputRowCountLogN, 0.18154007252039),
                    (OutputRowCount, 0.403041161093),
                ],
            )
    };
}

/// Cost model computing a weighted sum of the numerical features of an operator.
#[derive(Clone, Debug)]
pub struct CostModelLinear {
    weights: LinearWeights,
}

impl CostModelLinear {
    /// Fails if a weight refers to a non numerical feature.
    pub fn new(weights: LinearWeights) -> OptResult<Self> {
        for (feature, _) in weights.all_weights().flatten() {
            ensure!(
                NUMERICAL_FEATURES.contains(*feature),
                "{} is not a numerical feature and can't be weighted",
                feature
            );
        }
        Ok(Self { weights })
    }

    pub fn create_debug_build_model() -> Self {
        Self {
            weights: DEBUG_WEIGHTS.clone(),
        }
    }

    pub fn create_release_build_model() -> Self {
        Self {
            weights: RELEASE_WEIGHTS.clone(),
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
}

impl CostModel for CostModelLinear {
    fn name(&self) -> &'static str {
        "CostModelLinear"
    }

    fn estimate_cost(
        &self,
        operator_type: OperatorType,
        proxy: &dyn CostFeatureProxy,
    ) -> OptResult<Cost> {
        let weights = match operator_type {
            OperatorType::TableScan => self.weights.table_scans.get(&TableScanCategory::of(proxy)?),
            other => self.weights.operators.get(&other),
        };
        // Operators without weights are free.
        match weights {
            Some(weights) => Ok(Cost::from(weighted_sum(weights, proxy)?)),
            None => Ok(Cost::default()),
        }
    }
}
