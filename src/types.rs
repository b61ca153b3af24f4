// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::value::Value;

#[derive(Debug, Clone, Default)]
struct TypeDef {
    supertype: Option<String>,
    interfaces: Vec<String>,
}

/// Declared runtime-type hierarchy for dispatch and instanceof checks.
///
/// Host applications declare named types with an optional supertype and any
/// number of interfaces (which may themselves extend interfaces, declared the
/// same way). Undeclared names are valid leaf types with a trivial hierarchy.
/// Subtype answers are cached, positive and negative; redeclaring a type
/// drops the cache.
pub struct TypeModel {
    defs: RwLock<HashMap<String, TypeDef>>,
    subtype_cache: DashMap<(String, String), bool>,
}

impl Default for TypeModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeModel {
    pub fn new() -> TypeModel {
        TypeModel {
            defs: RwLock::new(HashMap::new()),
            subtype_cache: DashMap::new(),
        }
    }

    /// Declare `name` with an optional supertype and implemented interfaces.
    pub fn declare(&self, name: &str, supertype: Option<&str>, interfaces: &[&str]) {
        let def = TypeDef {
            supertype: supertype.map(str::to_string),
            interfaces: interfaces.iter().map(|s| s.to_string()).collect(),
        };
        self.defs.write().insert(name.to_string(), def);
        self.subtype_cache.clear();
    }

    /// Linearized ancestor walk for `name`: the type itself, its supertype
    /// chain, then interfaces most-derived-first (each type's direct
    /// interfaces before transitively extended ones). Duplicates keep their
    /// first position. This is the resolution order for property testers.
    pub fn hierarchy(&self, name: &str) -> Vec<String> {
        let defs = self.defs.read();

        let mut order: Vec<String> = vec![];
        let mut current = Some(name.to_string());
        while let Some(ty) = current {
            if order.contains(&ty) {
                break; // defensive against declaration cycles
            }
            current = defs.get(&ty).and_then(|d| d.supertype.clone());
            order.push(ty);
        }

        // Breadth-first over interfaces, seeded from the most-derived type.
        let mut queue: Vec<String> = order
            .iter()
            .flat_map(|ty| defs.get(ty).map(|d| d.interfaces.clone()).unwrap_or_default())
            .collect();
        let mut i = 0;
        while i < queue.len() {
            let iface = queue[i].clone();
            i += 1;
            if order.contains(&iface) {
                continue;
            }
            if let Some(def) = defs.get(&iface) {
                queue.extend(def.interfaces.iter().cloned());
                if let Some(sup) = &def.supertype {
                    queue.push(sup.clone());
                }
            }
            order.push(iface);
        }
        order
    }

    /// Whether `sub` equals `sup` or reaches it through the declared
    /// superclass/interface closure.
    pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        if sub == sup {
            return true;
        }
        let key = (sub.to_string(), sup.to_string());
        if let Some(answer) = self.subtype_cache.get(&key) {
            return *answer;
        }
        let answer = self.hierarchy(sub).iter().any(|t| t == sup);
        self.subtype_cache.insert(key, answer);
        answer
    }
}

/// Adapter callback converting a value to a target capability.
pub type AdapterFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Table of registered adapter functions keyed by
/// (concrete source type, target type).
///
/// This is step three of adaptation; a value's own
/// [`Receiver::adapt_to`](crate::Receiver::adapt_to) hook runs first.
pub struct AdapterRegistry {
    table: RwLock<HashMap<(String, String), AdapterFn>>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterRegistry {
    pub fn new() -> AdapterRegistry {
        AdapterRegistry {
            table: RwLock::new(HashMap::new()),
        }
    }

    pub fn register<F>(&self, source_type: &str, target_type: &str, adapter: F)
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.table.write().insert(
            (source_type.to_string(), target_type.to_string()),
            Arc::new(adapter),
        );
    }

    pub fn lookup(&self, source_type: &str, target_type: &str) -> Option<AdapterFn> {
        self.table
            .read()
            .get(&(source_type.to_string(), target_type.to_string()))
            .cloned()
    }
}
