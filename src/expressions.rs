// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use crate::args::{parse_argument, parse_arguments};
use crate::context::EvaluationContext;
use crate::errors::EvalError;
use crate::info::ExpressionInfo;
use crate::result::EvaluationResult;
use crate::value::{Literal, Value};

/// Node kind, used by the declarative-converter factory and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ast", derive(serde::Serialize))]
pub enum NodeKind {
    Instanceof,
    Equals,
    Count,
    SystemTest,
    Test,
    Adapt,
    And,
    Or,
    Not,
    Iterate,
    With,
    Resolve,
    Enablement,
}

/// Size specification of a Count node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ast", derive(serde::Serialize))]
pub enum CountSpec {
    /// `*`: any number of elements, including zero.
    AnyNumber,
    /// `!`: exactly zero elements.
    None,
    /// `?`: zero or one element.
    NoneOrOne,
    /// `+`: one or more elements.
    OneOrMore,
    /// An integer literal: exactly that many elements.
    Exact(usize),
}

impl CountSpec {
    pub fn parse(spec: &str) -> Result<CountSpec, EvalError> {
        Ok(match spec {
            "*" => CountSpec::AnyNumber,
            "!" => CountSpec::None,
            "?" => CountSpec::NoneOrOne,
            "+" => CountSpec::OneOrMore,
            _ => match spec.parse::<usize>() {
                Ok(n) => CountSpec::Exact(n),
                Err(_) => {
                    return Err(EvalError::invalid(format!(
                        "'{spec}' is not a valid count specification"
                    )))
                }
            },
        })
    }

    pub fn matches(self, size: usize) -> bool {
        match self {
            CountSpec::AnyNumber => true,
            CountSpec::None => size == 0,
            CountSpec::NoneOrOne => size <= 1,
            CountSpec::OneOrMore => size >= 1,
            CountSpec::Exact(n) => size == n,
        }
    }
}

/// Element combination operator of an Iterate node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ast", derive(serde::Serialize))]
pub enum IterateOperator {
    And,
    Or,
}

/// Immutable boolean-expression node.
///
/// A tree is built once (directly or through [`Expression::build`]) and then
/// evaluated repeatedly against fresh [`EvaluationContext`] instances as
/// application state changes. Trees are `Send + Sync` and safe to share;
/// every evaluation derives its own child scopes, so a definition referenced
/// from several enablement sites never leaks state between them.
///
/// Equality and hashing are structural (same variant, same literal
/// arguments, recursively equal children in order), which makes repeated
/// sub-definitions deduplicable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ast", derive(serde::Serialize))]
pub enum Expression {
    /// True when the subject's runtime type is, or reaches through the
    /// declared hierarchy, `type_name`.
    Instanceof { type_name: String },

    /// True when the subject equals the literal by value.
    Equals { expected: Literal },

    /// True when the subject's element count matches the specification.
    Count { spec: CountSpec },

    /// Compares a host system property; never touches the subject.
    SystemTest { property: String, expected: String },

    /// Asks a registered property tester about the subject.
    Test {
        namespace: String,
        property: String,
        args: Vec<Literal>,
        expected: Option<Literal>,
        /// Marks this test as worth activating the tester's module for,
        /// provided the context allows activation at all.
        force_plugin_activation: bool,
    },

    /// Adapts the subject to another type and evaluates the child against
    /// the adapted value; failure to adapt is `False`, not an error.
    Adapt {
        type_name: String,
        child: Option<Box<Expression>>,
    },

    And { children: Vec<Expression> },
    Or { children: Vec<Expression> },
    Not { child: Box<Expression> },

    /// Evaluates the child once per element of the subject collection,
    /// combining per `operator`.
    Iterate {
        operator: IterateOperator,
        /// Overrides the result on an empty collection.
        if_empty: Option<bool>,
        child: Option<Box<Expression>>,
    },

    /// Rebinds the subject to a named context variable.
    With {
        variable: String,
        child: Option<Box<Expression>>,
    },

    /// Rebinds the subject to a resolver-produced value.
    Resolve {
        variable: String,
        args: Vec<Literal>,
        child: Option<Box<Expression>>,
    },

    /// Container produced for enablement/reference definitions; an AND over
    /// its children.
    Enablement { children: Vec<Expression> },
}

impl Expression {
    pub fn kind(&self) -> NodeKind {
        match self {
            Expression::Instanceof { .. } => NodeKind::Instanceof,
            Expression::Equals { .. } => NodeKind::Equals,
            Expression::Count { .. } => NodeKind::Count,
            Expression::SystemTest { .. } => NodeKind::SystemTest,
            Expression::Test { .. } => NodeKind::Test,
            Expression::Adapt { .. } => NodeKind::Adapt,
            Expression::And { .. } => NodeKind::And,
            Expression::Or { .. } => NodeKind::Or,
            Expression::Not { .. } => NodeKind::Not,
            Expression::Iterate { .. } => NodeKind::Iterate,
            Expression::With { .. } => NodeKind::With,
            Expression::Resolve { .. } => NodeKind::Resolve,
            Expression::Enablement { .. } => NodeKind::Enablement,
        }
    }

    /// Factory used by the external declarative converter.
    ///
    /// `attributes` are the raw string attributes of the declarative element
    /// (`value`, `property`, `args`, `operator`, `ifEmpty`, `variable`,
    /// `type`, `forcePluginActivation`). Performs the variant-specific arity
    /// checks: leaves reject children, `Not` takes exactly one child,
    /// `Adapt`/`Iterate`/`With`/`Resolve` at most one, the container kinds
    /// any number.
    pub fn build(
        kind: NodeKind,
        attributes: &[(&str, &str)],
        children: Vec<Expression>,
    ) -> Result<Expression, EvalError> {
        let attr = |name| find_attr(attributes, name);
        let require = |name| require_attr(attributes, kind, name);

        Ok(match kind {
            NodeKind::Instanceof => {
                Self::no_children(kind, &children)?;
                Expression::Instanceof {
                    type_name: require("value")?.to_string(),
                }
            }
            NodeKind::Equals => {
                Self::no_children(kind, &children)?;
                Expression::Equals {
                    expected: parse_argument(require("value")?)?,
                }
            }
            NodeKind::Count => {
                Self::no_children(kind, &children)?;
                Expression::Count {
                    spec: CountSpec::parse(attr("value").unwrap_or("*"))?,
                }
            }
            NodeKind::SystemTest => {
                Self::no_children(kind, &children)?;
                Expression::SystemTest {
                    property: require("property")?.to_string(),
                    expected: require("value")?.to_string(),
                }
            }
            NodeKind::Test => {
                Self::no_children(kind, &children)?;
                let qualified = require("property")?;
                let (namespace, property) = qualified.rsplit_once('.').ok_or_else(|| {
                    EvalError::invalid(format!(
                        "test property '{qualified}' must be qualified as 'namespace.name'"
                    ))
                })?;
                Expression::Test {
                    namespace: namespace.to_string(),
                    property: property.to_string(),
                    args: match attr("args") {
                        Some(raw) => parse_arguments(raw)?,
                        None => vec![],
                    },
                    expected: attr("value").map(parse_argument).transpose()?,
                    force_plugin_activation: attr("forcePluginActivation") == Some("true"),
                }
            }
            NodeKind::Adapt => Expression::Adapt {
                type_name: require("type")?.to_string(),
                child: Self::optional_child(kind, children)?,
            },
            NodeKind::And => Expression::And { children },
            NodeKind::Or => Expression::Or { children },
            NodeKind::Not => Expression::Not {
                child: Self::single_child(kind, children)?,
            },
            NodeKind::Iterate => Expression::Iterate {
                operator: match attr("operator").unwrap_or("and") {
                    "and" => IterateOperator::And,
                    "or" => IterateOperator::Or,
                    other => {
                        return Err(EvalError::invalid(format!(
                            "'{other}' is not a valid iterate operator"
                        )))
                    }
                },
                if_empty: match attr("ifEmpty") {
                    None => None,
                    Some("true") => Some(true),
                    Some("false") => Some(false),
                    Some(other) => {
                        return Err(EvalError::invalid(format!(
                            "'{other}' is not a valid ifEmpty value"
                        )))
                    }
                },
                child: Self::optional_child(kind, children)?,
            },
            NodeKind::With => Expression::With {
                variable: require("variable")?.to_string(),
                child: Self::optional_child(kind, children)?,
            },
            NodeKind::Resolve => Expression::Resolve {
                variable: require("variable")?.to_string(),
                args: match attr("args") {
                    Some(raw) => parse_arguments(raw)?,
                    None => vec![],
                },
                child: Self::optional_child(kind, children)?,
            },
            NodeKind::Enablement => Expression::Enablement { children },
        })
    }

    fn no_children(kind: NodeKind, children: &[Expression]) -> Result<(), EvalError> {
        if children.is_empty() {
            Ok(())
        } else {
            Err(EvalError::invalid(format!("{kind:?} takes no children")))
        }
    }

    fn optional_child(
        kind: NodeKind,
        mut children: Vec<Expression>,
    ) -> Result<Option<Box<Expression>>, EvalError> {
        match children.len() {
            0 => Ok(None),
            1 => Ok(Some(Box::new(children.remove(0)))),
            n => Err(EvalError::invalid(format!(
                "{kind:?} takes at most one child, got {n}"
            ))),
        }
    }

    fn single_child(
        kind: NodeKind,
        mut children: Vec<Expression>,
    ) -> Result<Box<Expression>, EvalError> {
        if children.len() == 1 {
            Ok(Box::new(children.remove(0)))
        } else {
            Err(EvalError::invalid(format!(
                "{kind:?} takes exactly one child, got {}",
                children.len()
            )))
        }
    }

    /// Evaluate this expression against `ctx`.
    pub fn evaluate(&self, ctx: &EvaluationContext) -> Result<EvaluationResult, EvalError> {
        match self {
            Expression::Instanceof { type_name } => {
                let subject = ctx.default_variable();
                if matches!(subject, Value::Undefined | Value::Null) {
                    return Ok(EvaluationResult::False);
                }
                Ok(ctx
                    .system()
                    .types()
                    .is_subtype(subject.type_name(), type_name)
                    .into())
            }
            Expression::Equals { expected } => {
                Ok((*ctx.default_variable() == expected.to_value()).into())
            }
            Expression::Count { spec } => {
                let size = collection_size(ctx)?;
                Ok(spec.matches(size).into())
            }
            Expression::SystemTest { property, expected } => match std::env::var(property) {
                Ok(actual) => Ok((actual == *expected).into()),
                Err(_) => Ok(EvaluationResult::False),
            },
            Expression::Test {
                namespace,
                property,
                args,
                expected,
                force_plugin_activation,
            } => {
                let subject = ctx.default_variable();
                // Tolerate holes in heterogeneous collections.
                if matches!(subject, Value::Undefined | Value::Null) {
                    return Ok(EvaluationResult::False);
                }
                let binding = ctx
                    .system()
                    .extensions()
                    .get_property(subject, namespace, property)?;
                let allow = ctx.allows_plugin_activation() && *force_plugin_activation;
                Ok(binding.test(subject, args, expected.as_ref(), allow))
            }
            Expression::Adapt { type_name, child } => {
                match ctx.system().adapt(ctx.default_variable(), type_name) {
                    Some(adapted) => {
                        let scope = ctx.new_scope(adapted);
                        evaluate_optional(child, &scope)
                    }
                    None => Ok(EvaluationResult::False),
                }
            }
            Expression::And { children } => evaluate_and(children, ctx),
            Expression::Or { children } => evaluate_or(children, ctx),
            Expression::Not { child } => Ok(child.evaluate(ctx)?.not()),
            Expression::Iterate {
                operator,
                if_empty,
                child,
            } => evaluate_iterate(*operator, *if_empty, child, ctx),
            Expression::With { variable, child } => {
                let value = ctx.get_variable(variable)?.clone();
                let scope = ctx.new_scope(value);
                evaluate_optional(child, &scope)
            }
            Expression::Resolve {
                variable,
                args,
                child,
            } => {
                let arg_values: Vec<Value> = args.iter().map(Literal::to_value).collect();
                let value = ctx.resolve_variable(variable, &arg_values)?;
                let scope = ctx.new_scope(value);
                evaluate_optional(child, &scope)
            }
            Expression::Enablement { children } => evaluate_and(children, ctx),
        }
    }

    /// Accumulate into `info` the variables, tester properties and system
    /// properties this expression reads.
    pub fn collect_info(&self, info: &mut ExpressionInfo) {
        match self {
            Expression::Instanceof { .. } | Expression::Equals { .. } | Expression::Count { .. } => {
                info.mark_default_variable_accessed();
            }
            Expression::SystemTest { .. } => info.mark_system_property_accessed(),
            Expression::Test {
                namespace,
                property,
                ..
            } => {
                info.mark_default_variable_accessed();
                info.add_accessed_property_name(format!("{namespace}.{property}"));
            }
            Expression::And { children }
            | Expression::Or { children }
            | Expression::Enablement { children } => {
                for child in children {
                    child.collect_info(info);
                }
            }
            Expression::Not { child } => child.collect_info(info),

            // These rebind the subject: the node itself reads the default
            // variable, the child's default-variable access is masked.
            Expression::Adapt { child, .. } | Expression::Iterate { child, .. } => {
                if let Some(child) = child {
                    info.mark_default_variable_accessed();
                    let mut inner = ExpressionInfo::new();
                    child.collect_info(&mut inner);
                    info.merge_except_default_variable(&inner);
                }
            }
            Expression::With {
                variable, child, ..
            }
            | Expression::Resolve {
                variable, child, ..
            } => {
                if let Some(child) = child {
                    let mut inner = ExpressionInfo::new();
                    child.collect_info(&mut inner);
                    info.merge_except_default_variable(&inner);
                    info.add_variable_name_access(variable.clone());
                }
            }
        }
    }

    pub fn compute_expression_info(&self) -> ExpressionInfo {
        let mut info = ExpressionInfo::new();
        self.collect_info(&mut info);
        info
    }
}

fn find_attr<'a>(attributes: &[(&str, &'a str)], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| *v)
}

fn require_attr<'a>(
    attributes: &[(&str, &'a str)],
    kind: NodeKind,
    name: &str,
) -> Result<&'a str, EvalError> {
    find_attr(attributes, name)
        .ok_or_else(|| EvalError::invalid(format!("{kind:?} requires a '{name}' attribute")))
}

fn evaluate_optional(
    child: &Option<Box<Expression>>,
    ctx: &EvaluationContext,
) -> Result<EvaluationResult, EvalError> {
    match child {
        Some(child) => child.evaluate(ctx),
        None => Ok(EvaluationResult::True),
    }
}

// Short-circuits on the first False; NotLoaded keeps folding since a later
// False still dominates it.
fn evaluate_and(
    children: &[Expression],
    ctx: &EvaluationContext,
) -> Result<EvaluationResult, EvalError> {
    let mut result = EvaluationResult::True;
    for child in children {
        result = result.and(child.evaluate(ctx)?);
        if result == EvaluationResult::False {
            break;
        }
    }
    Ok(result)
}

fn evaluate_or(
    children: &[Expression],
    ctx: &EvaluationContext,
) -> Result<EvaluationResult, EvalError> {
    let mut result = EvaluationResult::False;
    for child in children {
        result = result.or(child.evaluate(ctx)?);
        if result == EvaluationResult::True {
            break;
        }
    }
    Ok(result)
}

fn evaluate_iterate(
    operator: IterateOperator,
    if_empty: Option<bool>,
    child: &Option<Box<Expression>>,
    ctx: &EvaluationContext,
) -> Result<EvaluationResult, EvalError> {
    let items = collection_items(ctx)?;
    if items.is_empty() {
        let result = match (operator, if_empty) {
            (IterateOperator::And, Some(false)) => EvaluationResult::False,
            (IterateOperator::And, _) => EvaluationResult::True,
            (IterateOperator::Or, Some(true)) => EvaluationResult::True,
            (IterateOperator::Or, _) => EvaluationResult::False,
        };
        return Ok(result);
    }

    let mut result = match operator {
        IterateOperator::And => EvaluationResult::True,
        IterateOperator::Or => EvaluationResult::False,
    };
    for item in items.iter() {
        let scope = ctx.new_scope(item.clone());
        let element = evaluate_optional(child, &scope)?;
        result = match operator {
            IterateOperator::And => result.and(element),
            IterateOperator::Or => result.or(element),
        };
        match (operator, result) {
            (IterateOperator::And, EvaluationResult::False)
            | (IterateOperator::Or, EvaluationResult::True) => break,
            _ => {}
        }
    }
    Ok(result)
}

/// The subject as a list of elements: a list directly, an object through its
/// iterable capability, anything else through one adapter attempt to `list`.
fn collection_items(ctx: &EvaluationContext) -> Result<Arc<Vec<Value>>, EvalError> {
    let subject = ctx.default_variable();
    match subject {
        Value::List(items) => Ok(items.clone()),
        Value::Object(receiver) => {
            if let Some(items) = receiver.iterable() {
                return Ok(Arc::new(items));
            }
            adapt_to_list(ctx, subject)
        }
        _ => adapt_to_list(ctx, subject),
    }
}

fn collection_size(ctx: &EvaluationContext) -> Result<usize, EvalError> {
    let subject = ctx.default_variable();
    match subject {
        Value::List(items) => Ok(items.len()),
        Value::Object(receiver) => {
            if let Some(size) = receiver.countable() {
                return Ok(size);
            }
            if let Some(items) = receiver.iterable() {
                return Ok(items.len());
            }
            adapt_to_list(ctx, subject).map(|items| items.len())
        }
        _ => adapt_to_list(ctx, subject).map(|items| items.len()),
    }
}

fn adapt_to_list(ctx: &EvaluationContext, subject: &Value) -> Result<Arc<Vec<Value>>, EvalError> {
    if let Some(Value::List(items)) = ctx.system().adapt(subject, "list") {
        return Ok(items);
    }
    Err(EvalError::NotACollection {
        type_name: subject.type_name().to_string(),
    })
}
