//! From oracle text to browser input: validate, resolve, execute.

pub mod descriptor;
pub mod executor;
pub mod resolver;

pub use descriptor::{
    extract_payload, parse_oracle_response, ActionDescriptor, ActionKind, OracleResponse,
    ResponseError, ResponseErrorKind, ScrollDirection, ScrollDistance,
};
pub use executor::{scroll_delta, ActionExecutor, ExecutedAction};
pub use resolver::{resolve, ResolveError};
