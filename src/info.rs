// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashSet;

use crate::expressions::NodeKind;

/// Static summary of the state an expression reads: the implicit subject,
/// host system properties, named variables and tester properties.
///
/// Lets a caller decide, without evaluating, whether a given state change
/// ("selection changed" vs. "preference changed") can affect an expression's
/// result. Computed fresh per analysis pass; merging infos of several
/// expressions is field-wise union and therefore commutative and idempotent.
#[derive(Debug, Default, Clone)]
pub struct ExpressionInfo {
    default_variable_accessed: bool,
    system_property_accessed: bool,
    accessed_variable_names: HashSet<String>,
    accessed_property_names: HashSet<String>,
    misbehaving_kinds: HashSet<NodeKind>,
}

impl ExpressionInfo {
    pub fn new() -> ExpressionInfo {
        ExpressionInfo::default()
    }

    pub fn has_default_variable_access(&self) -> bool {
        self.default_variable_accessed
    }

    pub fn mark_default_variable_accessed(&mut self) {
        self.default_variable_accessed = true;
    }

    pub fn has_system_property_access(&self) -> bool {
        self.system_property_accessed
    }

    pub fn mark_system_property_accessed(&mut self) {
        self.system_property_accessed = true;
    }

    pub fn accessed_variable_names(&self) -> &HashSet<String> {
        &self.accessed_variable_names
    }

    pub fn add_variable_name_access(&mut self, name: impl Into<String>) {
        self.accessed_variable_names.insert(name.into());
    }

    /// Qualified `namespace.property` names read through property testers.
    pub fn accessed_property_names(&self) -> &HashSet<String> {
        &self.accessed_property_names
    }

    pub fn add_accessed_property_name(&mut self, name: impl Into<String>) {
        self.accessed_property_names.insert(name.into());
    }

    /// Opt-in diagnostic set of node kinds whose dependencies could not be
    /// described. Never populated automatically; `None` when empty.
    pub fn misbehaving_kinds(&self) -> Option<&HashSet<NodeKind>> {
        if self.misbehaving_kinds.is_empty() {
            None
        } else {
            Some(&self.misbehaving_kinds)
        }
    }

    pub fn add_misbehaving_kind(&mut self, kind: NodeKind) {
        self.misbehaving_kinds.insert(kind);
    }

    /// Field-wise union of `other` into `self`.
    pub fn merge(&mut self, other: &ExpressionInfo) {
        self.default_variable_accessed |= other.default_variable_accessed;
        self.merge_except_default_variable(other);
    }

    /// Union of everything except the default-variable flag. Used by nodes
    /// that rebind the subject (With, Resolve, Adapt, Iterate): their
    /// children read the rebound value, not the caller's default variable.
    pub fn merge_except_default_variable(&mut self, other: &ExpressionInfo) {
        self.system_property_accessed |= other.system_property_accessed;
        self.accessed_variable_names
            .extend(other.accessed_variable_names.iter().cloned());
        self.accessed_property_names
            .extend(other.accessed_property_names.iter().cloned());
        self.misbehaving_kinds
            .extend(other.misbehaving_kinds.iter().cloned());
    }
}
