//! Error kinds surfaced by the core (§7).
//!
//! `Empty` — the sentinel meaning "this special method is not defined" — is
//! deliberately **not** a variant here. It is internal-only and must never
//! reach a caller (§4.A.1, §7); see [`crate::special_method::Empty`].

use std::fmt;

use crate::factory::Clash;

pub type PyCoreResult<T> = Result<T, PyCoreError>;

/// The catalogue of externally-visible failures the core can produce.
#[derive(Debug, thiserror::Error)]
pub enum PyCoreError {
    /// Wrong argument shape, metaclass conflict, layout conflict, bad
    /// operand types, or a non-`BASETYPE` base used in `bases=`.
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Read/write/delete of an absent or read-only attribute.
    #[error("AttributeError: {0}")]
    AttributeError(String),

    /// An integer conversion (e.g. a size argument) did not fit.
    #[error("OverflowError: {0}")]
    Overflow(String),

    /// A broken invariant: a [`Clash`] that reached publication, or any
    /// other condition that signals a bug in the runtime itself rather
    /// than in the Python program it is running. Not meant to be caught
    /// by Python code — there is no Python-exception layer in this core.
    #[error("InterpreterError (fatal): {0}")]
    Interpreter(#[source] InterpreterFault),
}

impl PyCoreError {
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::TypeError(msg.into())
    }

    pub fn attribute_error(msg: impl Into<String>) -> Self {
        Self::AttributeError(msg.into())
    }

    pub fn fatal(fault: InterpreterFault) -> Self {
        Self::Interpreter(fault)
    }
}

/// The fatal faults the factory/registry can detect. Carried by
/// [`PyCoreError::Interpreter`].
#[derive(Debug, thiserror::Error)]
pub enum InterpreterFault {
    /// A [`Clash`] (§4.F) reached the point of publication. During
    /// bootstrap this is always fatal; during a normal `from_spec` call
    /// the workshop is cleared and the clash is surfaced as this fault
    /// before it ever publishes (see [`crate::factory::TypeFactory`]).
    #[error("clash publishing batch: {0}")]
    Clash(Clash),
    /// A shared representation's `python_type` was asked about an object
    /// that doesn't carry the `WithClass` capability — the registry should
    /// never have produced that binding.
    #[error("shared representation probed an object with no WithClass capability")]
    UnprobableShared,
}

impl fmt::Display for Clash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} clash for {} while building '{}'",
            self.mode, self.class_name, self.spec_name
        )
    }
}
