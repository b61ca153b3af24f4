// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::EvalError;
use crate::system::ExpressionSystem;
use crate::value::Value;

/// External callback that can produce variable values on demand, e.g. from
/// window state or a selection service.
pub trait VariableResolver: Send + Sync {
    fn resolve(&self, name: &str, args: &[Value]) -> Option<Value>;
}

/// Per-evaluation container of the implicit subject (`default_variable`),
/// named variables and the plugin-activation policy.
///
/// Contexts are cheap and short-lived: build one per evaluation (or per UI
/// state snapshot), evaluate, discard. Composite expressions derive child
/// scopes via [`new_scope`](EvaluationContext::new_scope); the derived scope
/// chains back to its parent for variable lookup and resolver delegation, so
/// no state leaks between independent evaluations of a shared tree.
pub struct EvaluationContext<'a> {
    system: &'a ExpressionSystem,
    parent: Option<&'a EvaluationContext<'a>>,
    default_variable: Value,
    variables: HashMap<String, Value>,
    resolvers: Vec<Arc<dyn VariableResolver>>,
    allow_plugin_activation: bool,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(system: &'a ExpressionSystem, default_variable: Value) -> EvaluationContext<'a> {
        EvaluationContext {
            system,
            parent: None,
            default_variable,
            variables: HashMap::new(),
            resolvers: vec![],
            allow_plugin_activation: false,
        }
    }

    /// Derive a child scope with a new subject. Shares the session and the
    /// activation policy; variable lookups fall back to this context.
    pub fn new_scope(&self, default_variable: Value) -> EvaluationContext<'_> {
        EvaluationContext {
            system: self.system,
            parent: Some(self),
            default_variable,
            variables: HashMap::new(),
            resolvers: vec![],
            allow_plugin_activation: self.allow_plugin_activation,
        }
    }

    pub fn system(&self) -> &ExpressionSystem {
        self.system
    }

    pub fn default_variable(&self) -> &Value {
        &self.default_variable
    }

    pub fn add_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn remove_variable(&mut self, name: &str) -> Option<Value> {
        self.variables.remove(name)
    }

    /// Look up a variable in this context, then along the parent chain.
    ///
    /// A stored [`Value::Undefined`] is returned as-is: the name is known but
    /// currently carries no value, which callers treat as a soft miss rather
    /// than an error. A name absent from the whole chain fails with
    /// [`EvalError::UndefinedVariable`].
    pub fn get_variable(&self, name: &str) -> Result<&Value, EvalError> {
        self.find_variable(name).ok_or_else(|| EvalError::UndefinedVariable {
            name: name.to_string(),
        })
    }

    fn find_variable(&self, name: &str) -> Option<&Value> {
        match self.variables.get(name) {
            Some(value) => Some(value),
            None => self.parent.and_then(|p| p.find_variable(name)),
        }
    }

    pub fn add_resolver(&mut self, resolver: Arc<dyn VariableResolver>) {
        self.resolvers.push(resolver);
    }

    /// Resolve a variable through the registered resolver callbacks, in
    /// registration order; the first non-`None` answer wins. Falls back to
    /// the parent chain's resolvers before failing.
    pub fn resolve_variable(&self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        for resolver in &self.resolvers {
            if let Some(value) = resolver.resolve(name, args) {
                return Ok(value);
            }
        }
        match self.parent {
            Some(parent) => parent.resolve_variable(name, args),
            None => Err(EvalError::UndefinedVariable {
                name: name.to_string(),
            }),
        }
    }

    /// Whether evaluation may trigger module activation to instantiate a
    /// not-yet-loaded property tester. Off by default so speculative
    /// evaluations stay cheap.
    pub fn allows_plugin_activation(&self) -> bool {
        self.allow_plugin_activation
    }

    pub fn set_allow_plugin_activation(&mut self, allow: bool) {
        self.allow_plugin_activation = allow;
    }
}
