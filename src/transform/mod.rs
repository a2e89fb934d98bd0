//! Schema normalization of the combined table
//!
//! The normalizer renames the two known measurement columns to unit-bearing
//! names and derives metric columns from them. It is a pure function: the
//! input table is consumed and a new table returned.

mod normalize;

pub use normalize::{
    HEIGHT_INCHES_TO_METERS, Normalizer, RenameRule, UnitConversion, WEIGHT_POUNDS_TO_KG,
    normalize,
};
