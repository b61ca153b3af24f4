// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// Failures surfaced by expression construction and evaluation.
///
/// These abort the evaluation of the tree that raised them; there are no
/// partial results. A deferred answer is not an error, it is
/// [`EvaluationResult::NotLoaded`](crate::EvaluationResult::NotLoaded).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// No property tester contribution exists under the namespace at all.
    #[error("no property tester is registered under namespace '{namespace}'")]
    UnknownNamespace { namespace: String },

    /// The namespace is known, but nothing along the receiver's type
    /// hierarchy declares the property.
    #[error("namespace '{namespace}' does not declare a property named '{property}'")]
    UnknownProperty { namespace: String, property: String },

    /// Count/Iterate subject is neither a list nor adaptable to one.
    #[error("value of type '{type_name}' is not a collection and cannot be counted or iterated")]
    NotACollection { type_name: String },

    #[error("malformed argument string: {reason}")]
    MalformedArgument { reason: String },

    /// Variable lookup or resolution found nothing anywhere in the context chain.
    #[error("variable '{name}' is not defined in the evaluation context")]
    UndefinedVariable { name: String },

    /// Construction-time violation: bad arity, missing attribute, malformed
    /// count specification or operator.
    #[error("invalid expression definition: {reason}")]
    InvalidExpression { reason: String },
}

impl EvalError {
    pub(crate) fn invalid(reason: impl Into<String>) -> EvalError {
        EvalError::InvalidExpression {
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> EvalError {
        EvalError::MalformedArgument {
            reason: reason.into(),
        }
    }
}
