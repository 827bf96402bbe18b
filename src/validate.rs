//! Validate a resolved descriptor graph before generation.
//!
//! One walk, collecting every problem instead of stopping at the first, so a
//! user sees all errors in one pass. Each message is prefixed with the file
//! and qualified message path. A non-empty result is a hard stop: the
//! generator is never invoked with an invalid descriptor.

use crate::descriptor::*;
use crate::wire::{MAX_FIELD_NUMBER, RESERVED_FIELD_NUMBER_MAX, RESERVED_FIELD_NUMBER_MIN};
use std::collections::{HashMap, HashSet};

/// Validate `unit` (and transitively its imports) in `set`. Returns the
/// collected error list; empty means the descriptor may be generated.
pub fn validate(set: &UnitSet, unit: usize) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = vec![false; set.units.len()];
    let mut stack = vec![unit];
    while let Some(id) = stack.pop() {
        if seen[id] {
            continue;
        }
        seen[id] = true;
        stack.extend(set.units[id].imports.iter().copied());
        validate_one(&set.units[id], &mut errors);
    }
    errors
}

fn validate_one(unit: &ProtoUnit, errors: &mut Vec<String>) {
    check_scope_names(
        unit,
        None,
        &unit.root_messages,
        &unit.root_enums,
        &[],
        errors,
    );

    for (index, message) in unit.messages.iter().enumerate() {
        let context = format!("{}: {}", unit.file_name, unit.qualified_name(index));
        validate_message(unit, index, message, &context, errors);
    }

    for e in &unit.enums {
        let context = format!("{}: {}", unit.file_name, e.name);
        if e.values.is_empty() {
            errors.push(format!("{}: enum must declare at least one value", context));
        }
        let mut names = HashSet::new();
        for value in &e.values {
            if !names.insert(value.name.as_str()) {
                errors.push(format!(
                    "{}: duplicate enum symbol '{}'",
                    context, value.name
                ));
            }
        }
    }
}

fn validate_message(
    unit: &ProtoUnit,
    index: usize,
    message: &MessageType,
    context: &str,
    errors: &mut Vec<String>,
) {
    check_scope_names(
        unit,
        Some(context),
        &message.nested_messages,
        &message.nested_enums,
        &message.fields,
        errors,
    );

    let mut tags: HashMap<u32, &str> = HashMap::new();
    let mut field_names = HashSet::new();
    for field in &message.fields {
        if !field_names.insert(field.name.as_str()) {
            errors.push(format!("{}: duplicate field name '{}'", context, field.name));
        }
        if let Some(&previous) = tags.get(&field.tag) {
            errors.push(format!(
                "{}: field '{}' reuses tag {} already assigned to '{}'",
                context, field.name, field.tag, previous
            ));
        } else {
            tags.insert(field.tag, &field.name);
        }
        if field.tag == 0 || field.tag > MAX_FIELD_NUMBER {
            errors.push(format!(
                "{}: field '{}' tag {} outside the valid range 1..{}",
                context, field.name, field.tag, MAX_FIELD_NUMBER
            ));
        } else if (RESERVED_FIELD_NUMBER_MIN..=RESERVED_FIELD_NUMBER_MAX).contains(&field.tag) {
            errors.push(format!(
                "{}: field '{}' tag {} falls in the reserved range {}-{}",
                context,
                field.name,
                field.tag,
                RESERVED_FIELD_NUMBER_MIN,
                RESERVED_FIELD_NUMBER_MAX
            ));
        }
        match &field.field_type {
            FieldType::Scalar(_) => {}
            FieldType::Named { name, resolved } => {
                if resolved.is_none() {
                    errors.push(format!(
                        "{}: field '{}' references unresolved type '{}'",
                        context, field.name, name
                    ));
                }
            }
            FieldType::Group(body) => {
                // A group must resolve to a message-shaped body owned by
                // this message.
                if *body >= unit.messages.len() || unit.messages[*body].parent != Some(index) {
                    errors.push(format!(
                        "{}: group field '{}' has no well-formed message body",
                        context, field.name
                    ));
                }
            }
        }
    }
}

/// Names of messages, enums and group bodies sharing one scope must be unique.
fn check_scope_names(
    unit: &ProtoUnit,
    context: Option<&str>,
    messages: &[usize],
    enums: &[usize],
    fields: &[Field],
    errors: &mut Vec<String>,
) {
    let mut names = HashSet::new();
    let scope = context.unwrap_or(&unit.file_name);
    for &m in messages {
        if !names.insert(unit.messages[m].name.as_str()) {
            errors.push(format!(
                "{}: duplicate type name '{}' in one scope",
                scope, unit.messages[m].name
            ));
        }
    }
    for field in fields {
        if let FieldType::Group(body) = field.field_type {
            if body < unit.messages.len() && !names.insert(unit.messages[body].name.as_str()) {
                errors.push(format!(
                    "{}: duplicate type name '{}' in one scope",
                    scope, unit.messages[body].name
                ));
            }
        }
    }
    for &e in enums {
        if !names.insert(unit.enums[e].name.as_str()) {
            errors.push(format!(
                "{}: duplicate type name '{}' in one scope",
                scope, unit.enums[e].name
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn check(source: &str) -> Vec<String> {
        let unit = parse(source, "test.proto").expect("parse");
        let mut set = UnitSet::new();
        let id = set.insert_anonymous(unit);
        set.resolve_unit(id);
        validate(&set, id)
    }

    #[test]
    fn clean_schema_passes() {
        let errors = check(
            r#"
message Point {
  required int32 x = 1;
  required int32 y = 2;
}
"#,
        );
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn collects_all_errors_in_one_pass() {
        let errors = check(
            r#"
message Broken {
  required int32 a = 1;
  optional int32 b = 1;
  optional Missing c = 19005;
}
"#,
        );
        assert_eq!(errors.len(), 3, "{:?}", errors);
        assert!(errors[0].contains("reuses tag 1"));
        assert!(errors[1].contains("reserved range"));
        assert!(errors[2].contains("unresolved type 'Missing'"));
    }

    #[test]
    fn rejects_zero_and_oversized_tags() {
        let errors = check("message M { optional int32 a = 0; }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("outside the valid range"));

        let errors = check("message M { optional int32 a = 536870912; }");
        assert_eq!(errors.len(), 1, "{:?}", errors);
    }

    #[test]
    fn group_tag_shares_the_message_tag_space() {
        let errors = check(
            r#"
message M {
  optional int32 a = 2;
  optional group Extra = 2 {
    optional int32 b = 1;
  }
}
"#,
        );
        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert!(errors[0].contains("reuses tag 2"));
    }

    #[test]
    fn duplicate_names_within_a_scope() {
        let errors = check(
            r#"
message Twin {
  optional int32 a = 1;
}
message Twin {
  optional int32 b = 1;
}
"#,
        );
        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert!(errors[0].contains("duplicate type name 'Twin'"));
    }

    #[test]
    fn duplicate_enum_symbols_are_errors_but_shared_values_are_not() {
        let errors = check(
            r#"
enum E {
  A = 0;
  B = 0;
  A = 1;
}
"#,
        );
        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert!(errors[0].contains("duplicate enum symbol 'A'"));
    }
}
