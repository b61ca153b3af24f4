// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::errors::EvalError;
use crate::result::EvaluationResult;
use crate::types::TypeModel;
use crate::value::{Literal, Value};

/// Externally supplied predicate answering a named boolean question about a
/// receiver.
///
/// One tester may serve several property names in its namespace; `property`
/// identifies which one is being asked. Implementations are expected to be
/// fast and non-blocking; that contract is not enforced here.
pub trait PropertyTester: Send + Sync {
    fn test(
        &self,
        receiver: &Value,
        property: &str,
        args: &[Literal],
        expected: Option<&Literal>,
    ) -> bool;
}

/// The module (plugin/bundle) owning one or more tester contributions.
///
/// A tester whose module is inactive is resolvable but not invocable;
/// invoking it either activates the module (when the evaluation permits) or
/// yields [`EvaluationResult::NotLoaded`].
#[derive(Debug)]
pub struct Module {
    name: String,
    active: AtomicBool,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Arc<Module> {
        Arc::new(Module {
            name: name.into(),
            active: AtomicBool::new(false),
        })
    }

    pub fn active(name: impl Into<String>) -> Arc<Module> {
        let module = Module::new(name);
        module.activate();
        module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn activate(&self) {
        self.active.store(true, Ordering::Release);
    }
}

type TesterFactory = Box<dyn Fn() -> Arc<dyn PropertyTester> + Send + Sync>;

/// One contribution from the external registry: a namespace, the property
/// names it declares, the receiver type it targets and a factory that
/// instantiates the tester on first use.
pub struct TesterDescriptor {
    namespace: String,
    target_type: String,
    properties: Vec<String>,
    module: Arc<Module>,
    factory: TesterFactory,
}

impl TesterDescriptor {
    pub fn new<F>(
        namespace: impl Into<String>,
        target_type: impl Into<String>,
        properties: &[&str],
        module: Arc<Module>,
        factory: F,
    ) -> TesterDescriptor
    where
        F: Fn() -> Arc<dyn PropertyTester> + Send + Sync + 'static,
    {
        TesterDescriptor {
            namespace: namespace.into(),
            target_type: target_type.into(),
            properties: properties.iter().map(|s| s.to_string()).collect(),
            module,
            factory: Box::new(factory),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    fn declares(&self, property: &str) -> bool {
        self.properties.iter().any(|p| p == property)
    }
}

/// A resolved (namespace, property, receiver type) binding.
///
/// Holds the contribution that won the hierarchy walk and memoizes the
/// instantiated tester once the owning module allows it.
pub struct Property {
    namespace: String,
    name: String,
    descriptor: Arc<TesterDescriptor>,
    tester: RwLock<Option<Arc<dyn PropertyTester>>>,
}

impl Property {
    fn new(namespace: &str, name: &str, descriptor: Arc<TesterDescriptor>) -> Property {
        Property {
            namespace: namespace.to_string(),
            name: name.to_string(),
            descriptor,
            tester: RwLock::new(None),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_instantiated(&self) -> bool {
        self.tester.read().is_some()
    }

    /// Invoke the tester against `receiver`.
    ///
    /// Instantiates the tester on first use. When the owning module is not
    /// active and `allow_activation` is false the answer is `NotLoaded`;
    /// with `allow_activation` the module is activated first (which may run
    /// arbitrary first-use initialization in the factory).
    pub fn test(
        &self,
        receiver: &Value,
        args: &[Literal],
        expected: Option<&Literal>,
        allow_activation: bool,
    ) -> EvaluationResult {
        // take the guard in its own statement, instantiation needs the write lock
        let cached = self.tester.read().clone();
        let tester = match cached {
            Some(tester) => tester,
            None => {
                if !self.descriptor.module.is_active() && !allow_activation {
                    return EvaluationResult::NotLoaded;
                }
                self.descriptor.module.activate();
                let tester = (self.descriptor.factory)();
                *self.tester.write() = Some(tester.clone());
                tester
            }
        };
        tester.test(receiver, &self.name, args, expected).into()
    }
}

#[derive(Clone)]
enum Resolution {
    Found(Arc<Property>),
    UnknownProperty,
    UnknownNamespace,
}

/// Resolves and memoizes, per (receiver type, namespace, property), the
/// tester contribution that answers a query.
///
/// Resolution walks the receiver's type hierarchy (the type, its supertype
/// chain, then interfaces most-derived-first) and takes the first
/// contribution declaring the property: a subtype's tester shadows its
/// supertype's. Among contributions targeting the *same* type the first
/// registered wins; registration order is caller-visible and deliberately
/// not canonicalized. Positive and negative answers are both cached and
/// dropped only by the explicit change notifications below, never by
/// polling.
pub struct TypeExtensionManager {
    types: Arc<TypeModel>,
    contributions: RwLock<Vec<Arc<TesterDescriptor>>>,
    cache: DashMap<(String, String, String), Resolution>,
}

impl TypeExtensionManager {
    pub fn new(types: Arc<TypeModel>) -> TypeExtensionManager {
        TypeExtensionManager {
            types,
            contributions: RwLock::new(vec![]),
            cache: DashMap::new(),
        }
    }

    /// Register a tester contribution. Cached resolutions in the same
    /// namespace (including cached negatives) are dropped, since the new
    /// contribution could now win or satisfy them.
    pub fn register(&self, descriptor: TesterDescriptor) -> Arc<TesterDescriptor> {
        let descriptor = Arc::new(descriptor);
        let namespace = descriptor.namespace.clone();
        self.contributions.write().push(descriptor.clone());
        self.invalidate_namespace(&namespace);
        descriptor
    }

    /// Drop every contribution owned by `module` and the cache entries whose
    /// resolution could have come from it. Stale `Property` handles are never
    /// served afterwards.
    pub fn remove_module(&self, module: &Arc<Module>) {
        let mut removed_namespaces = vec![];
        self.contributions.write().retain(|d| {
            if Arc::ptr_eq(&d.module, module) {
                removed_namespaces.push(d.namespace.clone());
                false
            } else {
                true
            }
        });
        for namespace in removed_namespaces {
            self.invalidate_namespace(&namespace);
        }
    }

    fn invalidate_namespace(&self, namespace: &str) {
        self.cache.retain(|(_, ns, _), _| ns != namespace);
    }

    /// Resolve the property binding answering (`namespace`, `property`) for
    /// `receiver`'s runtime type.
    pub fn get_property(
        &self,
        receiver: &Value,
        namespace: &str,
        property: &str,
    ) -> Result<Arc<Property>, EvalError> {
        let type_name = receiver.type_name().to_string();
        let key = (type_name.clone(), namespace.to_string(), property.to_string());

        if let Some(resolution) = self.cache.get(&key) {
            return Self::unpack(resolution.value().clone(), namespace, property);
        }

        let resolution = self.resolve(&type_name, namespace, property);
        self.cache.insert(key, resolution.clone());
        Self::unpack(resolution, namespace, property)
    }

    fn resolve(&self, type_name: &str, namespace: &str, property: &str) -> Resolution {
        let contributions = self.contributions.read();
        for ancestor in self.types.hierarchy(type_name) {
            for descriptor in contributions.iter() {
                if descriptor.target_type == ancestor
                    && descriptor.namespace == namespace
                    && descriptor.declares(property)
                {
                    let found = Property::new(namespace, property, descriptor.clone());
                    return Resolution::Found(Arc::new(found));
                }
            }
        }
        if contributions.iter().any(|d| d.namespace == namespace) {
            Resolution::UnknownProperty
        } else {
            Resolution::UnknownNamespace
        }
    }

    fn unpack(
        resolution: Resolution,
        namespace: &str,
        property: &str,
    ) -> Result<Arc<Property>, EvalError> {
        match resolution {
            Resolution::Found(property) => Ok(property),
            Resolution::UnknownProperty => Err(EvalError::UnknownProperty {
                namespace: namespace.to_string(),
                property: property.to_string(),
            }),
            Resolution::UnknownNamespace => Err(EvalError::UnknownNamespace {
                namespace: namespace.to_string(),
            }),
        }
    }
}
