use enumset::{enum_set, EnumSet, EnumSetType};
use strum_macros::{Display, EnumIter};

use crate::error::{OptResult, OptimizerError};
use crate::expr::{DataType, PredicateCondition};

/// Named inputs of a cost model.
#[derive(EnumSetType, Debug, Hash, Display, EnumIter)]
pub enum CostFeature {
    LeftInputRowCount,
    RightInputRowCount,
    InputRowCountProduct,
    LeftInputReferenceRowCount,
    RightInputReferenceRowCount,
    LeftInputRowCountLogN,
    RightInputRowCountLogN,
    MajorInputRowCount,
    MinorInputRowCount,
    MajorInputReferenceRowCount,
    MinorInputReferenceRowCount,
    OutputRowCount,
    OutputReferenceRowCount,
    LeftDataType,
    RightDataType,
    PredicateCondition,
    LeftInputIsReferences,
    RightInputIsReferences,
    RightOperandIsColumn,
    LeftInputIsMajor,
}

/// Features usable as weights of a linear model.
pub const NUMERICAL_FEATURES: EnumSet<CostFeature> = enum_set!(
    CostFeature::LeftInputRowCount
        | CostFeature::RightInputRowCount
        | CostFeature::InputRowCountProduct
        | CostFeature::LeftInputReferenceRowCount
        | CostFeature::RightInputReferenceRowCount
        | CostFeature::LeftInputRowCountLogN
        | CostFeature::RightInputRowCountLogN
        | CostFeature::MajorInputRowCount
        | CostFeature::MinorInputRowCount
        | CostFeature::MajorInputReferenceRowCount
        | CostFeature::MinorInputReferenceRowCount
        | CostFeature::OutputRowCount
        | CostFeature::OutputReferenceRowCount
);

pub type CostFeatureWeights = Vec<(CostFeature, f64)>;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CostFeatureValue {
    Scalar(f64),
    DataType(DataType),
    PredicateCondition(PredicateCondition),
    Boolean(bool),
}

impl CostFeatureValue {
    fn kind(&self) -> &'static str {
        match self {
            CostFeatureValue::Scalar(_) => "scalar",
            CostFeatureValue::DataType(_) => "data type",
            CostFeatureValue::PredicateCondition(_) => "predicate condition",
            CostFeatureValue::Boolean(_) => "boolean",
        }
    }

    fn mismatch(&self, feature: CostFeature, expected: &'static str) -> anyhow::Error {
        OptimizerError::CostFeatureTypeMismatch {
            feature,
            expected,
            actual: self.kind(),
        }
        .into()
    }

    /// Numeric value, booleans count as `0` or `1`.
    pub fn scalar(&self, feature: CostFeature) -> OptResult<f64> {
        match self {
            CostFeatureValue::Scalar(v) => Ok(*v),
            CostFeatureValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            other => Err(other.mismatch(feature, "scalar")),
        }
    }

    pub fn boolean(&self, feature: CostFeature) -> OptResult<bool> {
        match self {
            CostFeatureValue::Boolean(b) => Ok(*b),
            other => Err(other.mismatch(feature, "boolean")),
        }
    }

    pub fn data_type(&self, feature: CostFeature) -> OptResult<DataType> {
        match self {
            CostFeatureValue::DataType(t) => Ok(*t),
            other => Err(other.mismatch(feature, "data type")),
        }
    }

    pub fn predicate_condition(&self, feature: CostFeature) -> OptResult<PredicateCondition> {
        match self {
            CostFeatureValue::PredicateCondition(c) => Ok(*c),
            other => Err(other.mismatch(feature, "predicate condition")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        let feature = CostFeature::LeftInputIsReferences;
        assert_eq!(1.0, CostFeatureValue::Boolean(true).scalar(feature).unwrap());
        assert!(CostFeatureValue::Boolean(true).boolean(feature).unwrap());

        let error = CostFeatureValue::DataType(DataType::Int)
            .scalar(CostFeature::LeftDataType)
            .unwrap_err();
        assert!(matches!(
            error.downcast_ref::<OptimizerError>(),
            Some(OptimizerError::CostFeatureTypeMismatch {
                feature: CostFeature::LeftDataType,
                ..
            })
        ));
    }

    #[test]
    fn test_numerical_features() {
        assert!(NUMERICAL_FEATURES.contains(CostFeature::OutputRowCount));
        assert!(!NUMERICAL_FEATURES.contains(CostFeature::LeftDataType));
        assert!(!NUMERICAL_FEATURES.contains(CostFeature::LeftInputIsMajor));
    }
}
