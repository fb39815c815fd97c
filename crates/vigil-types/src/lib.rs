//! Core nomenclature shared across vigil.
//!
//! - `Value`: live, mutable, possibly cyclic state owned by the program being
//!   diagnosed. Tables are shared handles compared by identity.
//! - `Captured`: an isolated, owned copy of a `Value` taken at one instant.
//! - `DiffEntry`: one structural difference between two captures.
//! - `Report`: a message emitted by the dispatcher once its window closes.
//!
//! In short: values are captured, captures are diffed, and anything worth
//! telling a human becomes a report.

mod captured;
mod errors;
mod ids;
mod report;
mod value;

pub use captured::*;
pub use errors::*;
pub use ids::*;
pub use report::*;
pub use value::*;
