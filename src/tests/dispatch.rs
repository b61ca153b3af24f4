// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use crate::tests::common::*;
use crate::*;

use anyhow::Result;

fn tag_descriptor(
    namespace: &str,
    target_type: &str,
    property: &str,
    tag: &'static str,
) -> TesterDescriptor {
    TesterDescriptor::new(
        namespace,
        target_type,
        &[property],
        Module::active(format!("module.{tag}")),
        move || Arc::new(TagTester(tag)) as Arc<dyn PropertyTester>,
    )
}

fn tag_test(qualified_property: &str, tag: &str) -> Expression {
    Expression::build(
        NodeKind::Test,
        &[("property", qualified_property), ("value", tag)],
        vec![],
    )
    .expect("valid test expression")
}

#[test]
fn subtype_tester_shadows_supertype_tester() -> Result<()> {
    let system = ExpressionSystem::new();
    system.declare_type("a", None, &[]);
    system.declare_type("b", Some("a"), &[]);
    system.register_tester(tag_descriptor("shapes", "a", "visible", "from-a"));
    system.register_tester(tag_descriptor("shapes", "b", "visible", "from-b"));

    let b = Value::object(Typed("b"));
    let ctx = EvaluationContext::new(&system, b);

    // dispatch is by runtime type: the b contribution answers
    assert_eq!(
        tag_test("shapes.visible", "from-b").evaluate(&ctx)?,
        EvaluationResult::True
    );
    assert_eq!(
        tag_test("shapes.visible", "from-a").evaluate(&ctx)?,
        EvaluationResult::False
    );

    // an a receiver still gets the a contribution
    let a = Value::object(Typed("a"));
    let ctx = EvaluationContext::new(&system, a);
    assert_eq!(
        tag_test("shapes.visible", "from-a").evaluate(&ctx)?,
        EvaluationResult::True
    );
    Ok(())
}

#[test]
fn interface_contribution_is_reachable() -> Result<()> {
    let system = ExpressionSystem::new();
    system.declare_type("saveable", None, &[]);
    system.declare_type("editor", None, &["saveable"]);
    system.declare_type("text_editor", Some("editor"), &[]);
    system.register_tester(tag_descriptor("workbench", "saveable", "dirty", "iface"));

    let ctx = EvaluationContext::new(&system, Value::object(Typed("text_editor")));
    assert_eq!(
        tag_test("workbench.dirty", "iface").evaluate(&ctx)?,
        EvaluationResult::True
    );
    Ok(())
}

#[test]
fn same_type_ties_resolve_by_registration_order() -> Result<()> {
    let system = ExpressionSystem::new();
    system.register_tester(tag_descriptor("ns", "widget", "enabled", "first"));
    system.register_tester(tag_descriptor("ns", "widget", "enabled", "second"));

    let ctx = EvaluationContext::new(&system, Value::object(Typed("widget")));
    assert_eq!(
        tag_test("ns.enabled", "first").evaluate(&ctx)?,
        EvaluationResult::True
    );
    Ok(())
}

#[test]
fn unknown_property_and_namespace_errors() {
    let system = ExpressionSystem::new();
    register_const(&system, "known", "widget", "enabled", true);

    let widget = Value::object(Typed("widget"));
    let ctx = EvaluationContext::new(&system, widget);

    assert_eq!(
        test_expr("known.missing").evaluate(&ctx),
        Err(EvalError::UnknownProperty {
            namespace: "known".to_string(),
            property: "missing".to_string(),
        })
    );
    assert_eq!(
        test_expr("stranger.enabled").evaluate(&ctx),
        Err(EvalError::UnknownNamespace {
            namespace: "stranger".to_string(),
        })
    );
}

#[test]
fn resolution_is_cached_per_runtime_type() -> Result<()> {
    let system = ExpressionSystem::new();
    register_const(&system, "ns", "widget", "enabled", true);

    let widget = Value::object(Typed("widget"));
    let first = system.extensions().get_property(&widget, "ns", "enabled")?;
    let second = system.extensions().get_property(&widget, "ns", "enabled")?;
    assert!(Arc::ptr_eq(&first, &second));
    Ok(())
}

#[test]
fn removing_a_module_invalidates_its_resolutions() -> Result<()> {
    let system = ExpressionSystem::new();
    system.declare_type("a", None, &[]);
    system.declare_type("b", Some("a"), &[]);

    let module_b = Module::active("module.b");
    system.register_tester(TesterDescriptor::new(
        "shapes",
        "b",
        &["visible"],
        module_b.clone(),
        || Arc::new(TagTester("from-b")) as Arc<dyn PropertyTester>,
    ));
    system.register_tester(tag_descriptor("shapes", "a", "visible", "from-a"));

    let b = Value::object(Typed("b"));
    let ctx = EvaluationContext::new(&system, b);
    assert_eq!(
        tag_test("shapes.visible", "from-b").evaluate(&ctx)?,
        EvaluationResult::True
    );

    // after removal the supertype contribution must win; nothing stale
    system.remove_module(&module_b);
    assert_eq!(
        tag_test("shapes.visible", "from-b").evaluate(&ctx)?,
        EvaluationResult::False
    );
    assert_eq!(
        tag_test("shapes.visible", "from-a").evaluate(&ctx)?,
        EvaluationResult::True
    );
    Ok(())
}

#[test]
fn late_registration_invalidates_cached_negatives() -> Result<()> {
    let system = ExpressionSystem::new();
    let widget = Value::object(Typed("widget"));
    let ctx = EvaluationContext::new(&system, widget);

    assert!(matches!(
        test_expr("late.enabled").evaluate(&ctx),
        Err(EvalError::UnknownNamespace { .. })
    ));

    register_const(&system, "late", "widget", "enabled", true);
    assert_eq!(
        test_expr("late.enabled").evaluate(&ctx)?,
        EvaluationResult::True
    );
    Ok(())
}

#[test]
fn inactive_module_defers_until_activation_is_allowed() -> Result<()> {
    let system = ExpressionSystem::new();
    let module = Module::new("lazy.module");
    let tester = CountingTester::new(true);
    let shared = tester.clone();
    system.register_tester(TesterDescriptor::new(
        "lazy",
        "widget",
        &["ready"],
        module.clone(),
        move || shared.clone() as Arc<dyn PropertyTester>,
    ));

    let widget = Value::object(Typed("widget"));
    let force = Expression::build(
        NodeKind::Test,
        &[("property", "lazy.ready"), ("forcePluginActivation", "true")],
        vec![],
    )?;

    // no activation permission: deferred, tester never runs
    let ctx = EvaluationContext::new(&system, widget.clone());
    assert_eq!(test_expr("lazy.ready").evaluate(&ctx)?, EvaluationResult::NotLoaded);
    assert_eq!(force.evaluate(&ctx)?, EvaluationResult::NotLoaded);
    assert_eq!(tester.calls(), 0);
    assert!(!module.is_active());

    // permission alone is not enough, the test must opt in
    let mut ctx = EvaluationContext::new(&system, widget.clone());
    ctx.set_allow_plugin_activation(true);
    assert_eq!(
        test_expr("lazy.ready").evaluate(&ctx)?,
        EvaluationResult::NotLoaded
    );

    // permission + forcePluginActivation: activates and answers
    assert_eq!(force.evaluate(&ctx)?, EvaluationResult::True);
    assert!(module.is_active());
    assert_eq!(tester.calls(), 1);

    // once instantiated, later evaluations answer without permission
    let ctx = EvaluationContext::new(&system, widget);
    assert_eq!(test_expr("lazy.ready").evaluate(&ctx)?, EvaluationResult::True);
    assert_eq!(tester.calls(), 2);
    Ok(())
}

#[test]
fn activating_a_module_unblocks_its_testers() -> Result<()> {
    let system = ExpressionSystem::new();
    let module = Module::new("sleepy.module");
    system.register_tester(TesterDescriptor::new(
        "sleepy",
        "widget",
        &["ready"],
        module.clone(),
        || Arc::new(ConstTester(true)) as Arc<dyn PropertyTester>,
    ));

    let ctx = EvaluationContext::new(&system, Value::object(Typed("widget")));
    assert_eq!(
        test_expr("sleepy.ready").evaluate(&ctx)?,
        EvaluationResult::NotLoaded
    );

    system.activate_module(&module);
    assert_eq!(test_expr("sleepy.ready").evaluate(&ctx)?, EvaluationResult::True);
    Ok(())
}

#[test]
fn active_module_instantiates_without_force() -> Result<()> {
    let system = ExpressionSystem::new();
    let module = Module::active("eager.module");
    system.register_tester(TesterDescriptor::new(
        "eager",
        "widget",
        &["ready"],
        module,
        || Arc::new(ConstTester(true)) as Arc<dyn PropertyTester>,
    ));

    let ctx = EvaluationContext::new(&system, Value::object(Typed("widget")));
    assert_eq!(test_expr("eager.ready").evaluate(&ctx)?, EvaluationResult::True);
    Ok(())
}
