//! Typed errors the caller has to branch on.
//!
//! Network and file failures stay in `anyhow`; these cover the cases a
//! front end reports to the user instead of bailing out.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// A table arrived without a column the pipeline cannot work without.
    #[error("{table} table is missing required column `{field}`")]
    MissingField { table: &'static str, field: &'static str },

    /// Neither the weekly stats nor the roster carry a position column.
    #[error("position column not found after merging weekly stats with rosters")]
    UnresolvedPosition,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("`{0}` is not a number")]
    NotANumber(String),
}
