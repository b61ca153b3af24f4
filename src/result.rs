// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;

/// Tri-state outcome of expression evaluation.
///
/// `NotLoaded` means the answer depends on a property tester whose owning
/// module has not been activated yet. It is not an error: a caller may force
/// activation and re-evaluate. Combination is false-dominant for `and` and
/// true-dominant for `or`; `NotLoaded` is absorbed only when no dominant
/// value is seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvaluationResult {
    False,
    True,
    NotLoaded,
}

impl EvaluationResult {
    pub fn and(self, other: EvaluationResult) -> EvaluationResult {
        use EvaluationResult::*;
        match (self, other) {
            (False, _) | (_, False) => False,
            (NotLoaded, _) | (_, NotLoaded) => NotLoaded,
            (True, True) => True,
        }
    }

    pub fn or(self, other: EvaluationResult) -> EvaluationResult {
        use EvaluationResult::*;
        match (self, other) {
            (True, _) | (_, True) => True,
            (NotLoaded, _) | (_, NotLoaded) => NotLoaded,
            (False, False) => False,
        }
    }

    pub fn not(self) -> EvaluationResult {
        match self {
            EvaluationResult::True => EvaluationResult::False,
            EvaluationResult::False => EvaluationResult::True,
            EvaluationResult::NotLoaded => EvaluationResult::NotLoaded,
        }
    }

    /// `Some(bool)` for definite answers, `None` for `NotLoaded`.
    pub fn as_bool(self) -> Option<bool> {
        match self {
            EvaluationResult::True => Some(true),
            EvaluationResult::False => Some(false),
            EvaluationResult::NotLoaded => None,
        }
    }
}

impl From<bool> for EvaluationResult {
    fn from(b: bool) -> Self {
        if b {
            EvaluationResult::True
        } else {
            EvaluationResult::False
        }
    }
}

impl fmt::Display for EvaluationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationResult::True => f.write_str("true"),
            EvaluationResult::False => f.write_str("false"),
            EvaluationResult::NotLoaded => f.write_str("not loaded"),
        }
    }
}
