//! Translation of stage-three query descriptors into native store requests,
//! and of native results back into canonical records.

pub mod aggregate;
pub mod builder;
pub mod cursor;
pub mod identifier;
pub mod normalize;
pub mod parse;
pub mod results;
pub mod types;

pub use cursor::{RecordStream, StreamEvent};
pub use normalize::CriteriaNormalizer;
pub use parse::{parse_criteria_json, parse_descriptor_json, parse_values_json};
pub use results::ResultNormalizer;
pub use types::{GroupSpec, InsertInput, QueryDescriptor, SortClause};
