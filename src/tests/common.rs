// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Shared receivers and testers for the engine tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::*;

/// Receiver with a declared type name and nothing else.
#[derive(Debug)]
pub struct Typed(pub &'static str);

impl Receiver for Typed {
    fn type_name(&self) -> &str {
        self.0
    }
}

/// Countable/iterable receiver that is not a list.
#[derive(Debug)]
pub struct Bag(pub Vec<Value>);

impl Receiver for Bag {
    fn type_name(&self) -> &str {
        "bag"
    }

    fn countable(&self) -> Option<usize> {
        Some(self.0.len())
    }

    fn iterable(&self) -> Option<Vec<Value>> {
        Some(self.0.clone())
    }
}

/// Tester that always gives the same answer.
#[derive(Debug)]
pub struct ConstTester(pub bool);

impl PropertyTester for ConstTester {
    fn test(
        &self,
        _receiver: &Value,
        _property: &str,
        _args: &[Literal],
        _expected: Option<&Literal>,
    ) -> bool {
        self.0
    }
}

/// Tester that answers true only when the expected value names its tag.
/// Used to observe which contribution won dispatch.
#[derive(Debug)]
pub struct TagTester(pub &'static str);

impl PropertyTester for TagTester {
    fn test(
        &self,
        _receiver: &Value,
        _property: &str,
        _args: &[Literal],
        expected: Option<&Literal>,
    ) -> bool {
        matches!(expected, Some(Literal::String(tag)) if tag == self.0)
    }
}

/// Tester that counts invocations.
#[derive(Debug)]
pub struct CountingTester {
    pub calls: AtomicUsize,
    pub answer: bool,
}

impl CountingTester {
    pub fn new(answer: bool) -> Arc<CountingTester> {
        Arc::new(CountingTester {
            calls: AtomicUsize::new(0),
            answer,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PropertyTester for CountingTester {
    fn test(
        &self,
        _receiver: &Value,
        _property: &str,
        _args: &[Literal],
        _expected: Option<&Literal>,
    ) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

/// Register a constant-answer tester under an already-active module.
pub fn register_const(
    system: &ExpressionSystem,
    namespace: &str,
    target_type: &str,
    property: &str,
    answer: bool,
) -> Arc<Module> {
    let module = Module::active(format!("{namespace}.{target_type}"));
    system.register_tester(TesterDescriptor::new(
        namespace,
        target_type,
        &[property],
        module.clone(),
        move || Arc::new(ConstTester(answer)) as Arc<dyn PropertyTester>,
    ));
    module
}

pub fn test_expr(qualified_property: &str) -> Expression {
    Expression::build(NodeKind::Test, &[("property", qualified_property)], vec![])
        .expect("valid test expression")
}

pub fn list_of_strings(items: &[&str]) -> Value {
    Value::from(items.iter().map(|s| Value::from(*s)).collect::<Vec<_>>())
}
