// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use crate::extensions::{Module, TesterDescriptor, TypeExtensionManager};
use crate::types::{AdapterRegistry, TypeModel};
use crate::value::Value;

/// Session-scoped owner of the shared dispatch state: the declared type
/// hierarchy, the adapter table and the property-tester cache.
///
/// One instance per process session, constructed explicitly and passed to
/// every root [`EvaluationContext`](crate::EvaluationContext); there are no
/// global singletons. Expression trees themselves stay independent of the
/// system and can be shared across sessions.
pub struct ExpressionSystem {
    types: Arc<TypeModel>,
    adapters: AdapterRegistry,
    extensions: TypeExtensionManager,
}

impl Default for ExpressionSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionSystem {
    pub fn new() -> ExpressionSystem {
        let types = Arc::new(TypeModel::new());
        ExpressionSystem {
            adapters: AdapterRegistry::new(),
            extensions: TypeExtensionManager::new(types.clone()),
            types,
        }
    }

    pub fn types(&self) -> &TypeModel {
        &self.types
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    pub fn extensions(&self) -> &TypeExtensionManager {
        &self.extensions
    }

    pub fn declare_type(&self, name: &str, supertype: Option<&str>, interfaces: &[&str]) {
        self.types.declare(name, supertype, interfaces);
    }

    pub fn register_adapter<F>(&self, source_type: &str, target_type: &str, adapter: F)
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.adapters.register(source_type, target_type, adapter);
    }

    pub fn register_tester(&self, descriptor: TesterDescriptor) -> Arc<TesterDescriptor> {
        self.extensions.register(descriptor)
    }

    /// Mark a module as loaded, making its not-yet-instantiated testers
    /// invocable without an activation permission.
    pub fn activate_module(&self, module: &Module) {
        module.activate();
    }

    /// External "contribution set changed" notification for a module going
    /// away: drops its testers and any cached resolution they produced.
    pub fn remove_module(&self, module: &Arc<Module>) {
        self.extensions.remove_module(module);
    }

    /// Adapt `value` to the `target` type: direct instanceof check first,
    /// then the value's own capability lookup, then the adapter table.
    /// `Null` and `Undefined` adapt to nothing.
    pub fn adapt(&self, value: &Value, target: &str) -> Option<Value> {
        if matches!(value, Value::Undefined | Value::Null) {
            return None;
        }
        if self.types.is_subtype(value.type_name(), target) {
            return Some(value.clone());
        }
        if let Value::Object(receiver) = value {
            if let Some(adapted) = receiver.adapt_to(target) {
                return Some(adapted);
            }
        }
        self.adapters
            .lookup(value.type_name(), target)
            .and_then(|adapter| adapter(value))
    }
}
