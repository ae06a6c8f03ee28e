//! The pass's fail-fast error surface.
//!
//! Most remediable situations (a missing singleton, a record returned by
//! value) are logged and the pass keeps going; only genuine programming
//! errors - the scheduler asking the stub synthesizer for a field that
//! does not exist, or the default-value constructor hitting a type it does
//! not understand - produce one of these.

use crate::commons::ValidationError;
use crate::middle_end::lir::{StructId, Type};

#[derive(Clone, Debug)]
pub enum InstrumentError {
    NoSuchFunctionPointerField { struct_id: StructId, index: usize },
    UnknownDefaultType { typ: Type },
    Invalid { source: ValidationError },
}

impl std::fmt::Display for InstrumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstrumentError::NoSuchFunctionPointerField { struct_id, index } => write!(
                f,
                "struct {struct_id} has no function-pointer field at index {index}"
            ),
            InstrumentError::UnknownDefaultType { typ } => {
                write!(f, "cannot construct a default value for type {typ:?}")
            }
            InstrumentError::Invalid { source } => {
                write!(f, "rewritten module failed validation: {source}")
            }
        }
    }
}

impl std::error::Error for InstrumentError {}

impl From<ValidationError> for InstrumentError {
    fn from(source: ValidationError) -> Self {
        InstrumentError::Invalid { source }
    }
}
