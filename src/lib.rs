// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

mod args;
mod context;
mod errors;
mod expressions;
mod extensions;
mod info;
mod result;
mod system;
mod types;
mod value;

pub use args::{parse_argument, parse_arguments};
pub use context::{EvaluationContext, VariableResolver};
pub use errors::EvalError;
pub use expressions::{CountSpec, Expression, IterateOperator, NodeKind};
pub use extensions::{Module, Property, PropertyTester, TesterDescriptor, TypeExtensionManager};
pub use info::ExpressionInfo;
pub use result::EvaluationResult;
pub use system::ExpressionSystem;
pub use types::{AdapterFn, AdapterRegistry, TypeModel};
pub use value::{Literal, Receiver, Value};

#[cfg(test)]
mod tests;
