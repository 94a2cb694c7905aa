//! Validation rules derived from constraint keywords.
//!
//! Expressions are written in the target language and use `{v}` for the
//! checked value. Every list returned here is sorted by rule name.

use schemaforge_core::{BuiltinKind, Schema, TypeId};
use serde_json::Value;

use crate::errors::{PlanError, Result};
use crate::model::{Rule, RuleInit, RuleName};
use crate::options::PlanOptions;

/// Placeholder for the checked value inside rule expressions.
pub const VALUE: &str = "{v}";

/// Rules for a single value of type `ty` described by `schema`.
///
/// Named values get a `subschema` rule; built-ins get the constraint rules
/// that apply to their kind. `scope` prefixes initializer variables.
pub fn derive_value_rules(
    schema: &Schema,
    ty: &TypeId,
    scope: &str,
    options: &PlanOptions,
) -> Result<Vec<Rule>> {
    if !options.validates(schema) {
        return Ok(Vec::new());
    }

    let builtin = match ty {
        TypeId::Named { .. } => return Ok(vec![subschema_rule(ty)]),
        TypeId::Builtin { builtin, .. } => *builtin,
    };

    let constraints = &schema.constraints;
    let mut rules = Vec::new();

    match builtin {
        BuiltinKind::String => {
            if let Some(pattern) = &constraints.pattern {
                rules.push(pattern_rule(schema, pattern, scope)?);
            }
            if let Some(min) = constraints.min_length {
                rules.push(Rule {
                    name: RuleName::MinLength,
                    init: None,
                    test: format!("len([]rune({VALUE})) < {min}"),
                    message: quote(&format!("must be at least {min} characters long")),
                    dependencies: Vec::new(),
                });
            }
            if let Some(max) = constraints.max_length {
                rules.push(Rule {
                    name: RuleName::MaxLength,
                    init: None,
                    test: format!("len([]rune({VALUE})) > {max}"),
                    message: quote(&format!("must be at most {max} characters long")),
                    dependencies: Vec::new(),
                });
            }
        }
        BuiltinKind::Int | BuiltinKind::Float => {
            let integer = builtin == BuiltinKind::Int;
            if let Some(minimum) = constraints.minimum {
                let (minimum, exclusive) =
                    integer_bound(minimum, constraints.exclusive_minimum, integer, f64::ceil);
                let (op, text) = if exclusive {
                    ("<=", "greater than")
                } else {
                    ("<", "at least")
                };
                let bound = number_literal(minimum, integer);
                rules.push(Rule {
                    name: RuleName::Minimum,
                    init: None,
                    test: format!("{VALUE} {op} {bound}"),
                    message: quote(&format!("must be {text} {bound}")),
                    dependencies: Vec::new(),
                });
            }
            if let Some(maximum) = constraints.maximum {
                let (maximum, exclusive) =
                    integer_bound(maximum, constraints.exclusive_maximum, integer, f64::floor);
                let (op, text) = if exclusive {
                    (">=", "less than")
                } else {
                    (">", "at most")
                };
                let bound = number_literal(maximum, integer);
                rules.push(Rule {
                    name: RuleName::Maximum,
                    init: None,
                    test: format!("{VALUE} {op} {bound}"),
                    message: quote(&format!("must be {text} {bound}")),
                    dependencies: Vec::new(),
                });
            }
            if let Some(multiple_of) = constraints.multiple_of {
                let step = number_literal(multiple_of, integer);
                let test = if integer && multiple_of.fract() == 0.0 {
                    format!("{VALUE}%{step} != 0")
                } else {
                    format!("float64(int64(float64({VALUE})/{step}))*{step} != float64({VALUE})")
                };
                rules.push(Rule {
                    name: RuleName::MultipleOf,
                    init: None,
                    test,
                    message: quote(&format!("must be a multiple of {step}")),
                    dependencies: Vec::new(),
                });
            }
        }
        BuiltinKind::Bool | BuiltinKind::Any => {}
    }

    if builtin.is_comparable() && !schema.enum_values.is_empty() {
        rules.push(enum_rule(&schema.enum_values));
    }

    sort_rules(&mut rules);
    Ok(rules)
}

/// Rules for the list itself: length bounds and uniqueness.
///
/// Uniqueness over an open element type cannot be checked and is an error.
pub fn derive_list_rules(
    schema: &Schema,
    element: &TypeId,
    options: &PlanOptions,
) -> Result<Vec<Rule>> {
    let constraints = &schema.constraints;
    if constraints.unique_items && element.is_any() {
        return Err(PlanError::NonComparable {
            schema: schema.id.clone(),
            element: element.to_string(),
        });
    }
    if !options.validates(schema) {
        return Ok(Vec::new());
    }

    let mut rules = Vec::new();
    if let Some(min) = constraints.min_items {
        rules.push(Rule {
            name: RuleName::MinItems,
            init: None,
            test: format!("len({VALUE}) < {min}"),
            message: quote(&format!("must contain at least {min} items")),
            dependencies: Vec::new(),
        });
    }
    if let Some(max) = constraints.max_items {
        rules.push(Rule {
            name: RuleName::MaxItems,
            init: None,
            test: format!("len({VALUE}) > {max}"),
            message: quote(&format!("must contain at most {max} items")),
            dependencies: Vec::new(),
        });
    }
    if constraints.unique_items {
        let dependencies = if element.is_named() {
            vec![element.clone()]
        } else {
            Vec::new()
        };
        rules.push(Rule {
            name: RuleName::UniqueItems,
            init: None,
            test: format!(
                "func() bool {{ seen := make(map[{element}]struct{{}}, len({VALUE})); \
                 for _, item := range {VALUE} {{ if _, ok := seen[item]; ok {{ return true }}; \
                 seen[item] = struct{{}}{{}} }}; return false }}()"
            ),
            message: quote("items must be unique"),
            dependencies,
        });
    }

    sort_rules(&mut rules);
    Ok(rules)
}

/// Rules for a string-keyed map: property count bounds.
pub fn derive_object_rules(schema: &Schema, options: &PlanOptions) -> Vec<Rule> {
    if !options.validates(schema) {
        return Vec::new();
    }

    let constraints = &schema.constraints;
    let mut rules = Vec::new();
    if let Some(min) = constraints.min_properties {
        rules.push(Rule {
            name: RuleName::MinProperties,
            init: None,
            test: format!("len({VALUE}) < {min}"),
            message: quote(&format!("must contain at least {min} properties")),
            dependencies: Vec::new(),
        });
    }
    if let Some(max) = constraints.max_properties {
        rules.push(Rule {
            name: RuleName::MaxProperties,
            init: None,
            test: format!("len({VALUE}) > {max}"),
            message: quote(&format!("must contain at most {max} properties")),
            dependencies: Vec::new(),
        });
    }
    sort_rules(&mut rules);
    rules
}

/// Run the named type's own validation on the value.
pub fn subschema_rule(ty: &TypeId) -> Rule {
    Rule {
        name: RuleName::Subschema,
        init: None,
        test: format!("{VALUE}.Validate() != nil"),
        message: format!("{VALUE}.Validate().Error()"),
        dependencies: vec![ty.clone()],
    }
}

/// Reject values outside `values`.
pub fn enum_rule(values: &[Value]) -> Rule {
    let literals: Vec<String> = values.iter().map(literal).collect();
    let test = literals
        .iter()
        .map(|literal| format!("{VALUE} == {literal}"))
        .collect::<Vec<_>>()
        .join(" || ");
    let listed = values
        .iter()
        .map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ");

    Rule {
        name: RuleName::Enum,
        init: None,
        test: format!("!({test})"),
        message: quote(&format!("must be one of: {listed}")),
        dependencies: Vec::new(),
    }
}

fn pattern_rule(schema: &Schema, pattern: &str, scope: &str) -> Result<Rule> {
    regex::Regex::new(pattern).map_err(|source| PlanError::InvalidPattern {
        schema: schema.id.clone(),
        pattern: pattern.to_string(),
        source,
    })?;

    let var = format!("{}Pattern", lower_first(scope));
    let source = if pattern.contains('`') {
        quote(pattern)
    } else {
        format!("`{pattern}`")
    };

    Ok(Rule {
        name: RuleName::Pattern,
        init: Some(RuleInit {
            var: var.clone(),
            expr: format!("regexp.MustCompile({source})"),
        }),
        test: format!("!{var}.MatchString({VALUE})"),
        message: quote(&format!("must match pattern {pattern}")),
        dependencies: vec![TypeId::named("regexp", "Regexp")],
    })
}

fn sort_rules(rules: &mut [Rule]) {
    rules.sort_by(|left, right| left.name.cmp(&right.name));
}

/// Target-language literal for a JSON scalar.
fn literal(value: &Value) -> String {
    match value {
        Value::String(text) => quote(text),
        other => other.to_string(),
    }
}

/// Double-quoted string literal.
pub(crate) fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch.is_control() => out.push_str(&format!("\\u{:04x}", ch as u32)),
            ch => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// Fractional bounds on an integer become the nearest inclusive whole bound.
fn integer_bound(value: f64, exclusive: bool, integer: bool, round: fn(f64) -> f64) -> (f64, bool) {
    if integer && value.fract() != 0.0 {
        (round(value), false)
    } else {
        (value, exclusive)
    }
}

fn number_literal(value: f64, integer: bool) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        let whole = format!("{}", value as i64);
        if integer { whole } else { format!("{whole}.0") }
    } else {
        format!("{value}")
    }
}

fn lower_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => "value".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemaforge_core::Constraints;
    use serde_json::json;

    fn names(rules: &[Rule]) -> Vec<&'static str> {
        rules.iter().map(|rule| rule.name.as_str()).collect()
    }

    #[test]
    fn string_rules_are_sorted_and_compile_patterns() {
        let schema = Schema {
            id: "file:///w.json#/properties/code".to_string(),
            constraints: Constraints {
                pattern: Some("^[A-Z]{3}$".to_string()),
                min_length: Some(3),
                max_length: Some(3),
                ..Constraints::default()
            },
            ..Schema::default()
        };
        let rules = derive_value_rules(
            &schema,
            &TypeId::builtin(BuiltinKind::String),
            "WidgetCode",
            &PlanOptions::default(),
        )
        .expect("rules");

        assert_eq!(names(&rules), vec!["maxLength", "minLength", "pattern"]);
        let pattern = &rules[2];
        let init = pattern.init.as_ref().expect("initializer");
        assert_eq!(init.var, "widgetCodePattern");
        assert_eq!(init.expr, "regexp.MustCompile(`^[A-Z]{3}$`)");
        assert_eq!(pattern.test, "!widgetCodePattern.MatchString({v})");
    }

    #[test]
    fn invalid_pattern_is_fatal() {
        let schema = Schema {
            constraints: Constraints {
                pattern: Some("([a-z".to_string()),
                ..Constraints::default()
            },
            ..Schema::default()
        };
        let err = derive_value_rules(
            &schema,
            &TypeId::builtin(BuiltinKind::String),
            "X",
            &PlanOptions::default(),
        )
        .expect_err("invalid pattern");
        assert!(matches!(err, PlanError::InvalidPattern { .. }));
    }

    #[test]
    fn exclusive_bounds_switch_operators() {
        let schema = Schema {
            constraints: Constraints {
                minimum: Some(0.0),
                exclusive_minimum: true,
                maximum: Some(10.0),
                multiple_of: Some(2.0),
                ..Constraints::default()
            },
            ..Schema::default()
        };
        let rules = derive_value_rules(
            &schema,
            &TypeId::builtin(BuiltinKind::Int),
            "Count",
            &PlanOptions::default(),
        )
        .expect("rules");

        assert_eq!(names(&rules), vec!["maximum", "minimum", "multipleOf"]);
        assert_eq!(rules[0].test, "{v} > 10");
        assert_eq!(rules[1].test, "{v} <= 0");
        assert_eq!(rules[2].test, "{v}%2 != 0");
    }

    #[test]
    fn fractional_bounds_on_integers_round_inward() {
        let schema = Schema {
            constraints: Constraints {
                minimum: Some(1.5),
                exclusive_minimum: true,
                maximum: Some(9.5),
                ..Constraints::default()
            },
            ..Schema::default()
        };
        let int_rules = derive_value_rules(
            &schema,
            &TypeId::builtin(BuiltinKind::Int),
            "Count",
            &PlanOptions::default(),
        )
        .expect("rules");
        assert_eq!(int_rules[0].test, "{v} > 9");
        assert_eq!(int_rules[0].message, "\"must be at most 9\"");
        assert_eq!(int_rules[1].test, "{v} < 2");

        let float_rules = derive_value_rules(
            &schema,
            &TypeId::builtin(BuiltinKind::Float),
            "Ratio",
            &PlanOptions::default(),
        )
        .expect("rules");
        assert_eq!(float_rules[0].test, "{v} > 9.5");
        assert_eq!(float_rules[1].test, "{v} <= 1.5");
    }

    #[test]
    fn named_values_get_subschema_unless_disabled() {
        let schema = Schema::default();
        let ty = TypeId::named("pkg", "Widget");
        let rules =
            derive_value_rules(&schema, &ty, "W", &PlanOptions::default()).expect("rules");
        assert_eq!(names(&rules), vec!["subschema"]);
        assert_eq!(rules[0].dependencies, vec![ty.clone()]);

        let options = PlanOptions {
            validate: false,
            ..PlanOptions::default()
        };
        assert!(derive_value_rules(&schema, &ty, "W", &options)
            .expect("rules")
            .is_empty());
    }

    #[test]
    fn unique_items_needs_comparable_elements() {
        let schema = Schema {
            constraints: Constraints {
                unique_items: true,
                min_items: Some(1),
                ..Constraints::default()
            },
            ..Schema::default()
        };
        let rules = derive_list_rules(
            &schema,
            &TypeId::builtin(BuiltinKind::String),
            &PlanOptions::default(),
        )
        .expect("rules");
        assert_eq!(names(&rules), vec!["minItems", "uniqueItems"]);

        let err = derive_list_rules(&schema, &TypeId::any(), &PlanOptions::default())
            .expect_err("open element");
        assert!(matches!(err, PlanError::NonComparable { .. }));
    }

    #[test]
    fn enum_rule_lists_literals() {
        let rule = enum_rule(&[json!("a"), json!("b\"c")]);
        assert_eq!(rule.test, r#"!({v} == "a" || {v} == "b\"c")"#);
        assert_eq!(rule.message, r#""must be one of: a, b\"c""#);
    }

    #[test]
    fn object_rules_bound_property_counts() {
        let schema = Schema {
            constraints: Constraints {
                min_properties: Some(1),
                max_properties: Some(5),
                ..Constraints::default()
            },
            ..Schema::default()
        };
        let rules = derive_object_rules(&schema, &PlanOptions::default());
        assert_eq!(names(&rules), vec!["maxProperties", "minProperties"]);
    }
}
