//! Build a generation plan from a validated descriptor graph.
//!
//! The plan is a flat, ordered list of declarations; the renderer walks it
//! and emits Rust without consulting the descriptors again. Nested messages,
//! enums and group bodies become top-level items with underscore-joined
//! names (`Track_Sample`), so a type reference is always a single identifier
//! and cross-file references are `super::<module>::<Name>` between sibling
//! generated modules.
//!
//! Ordering is fixed: top-level enums in declaration order, then top-level
//! messages depth-first, each message followed by its nested enums, nested
//! messages and group bodies. The same descriptors always produce the same
//! plan, so generated output is byte-stable across runs.

use crate::descriptor::*;

#[derive(Debug)]
pub struct GeneratedUnit {
    /// Wrapper name for the unit, from the `outer_name` option or the file
    /// stem.
    pub outer_name: String,
    /// Snake-case module/file stem the output is written as.
    pub module_name: String,
    pub package: Option<String>,
    pub source_file: String,
    pub decls: Vec<Decl>,
}

#[derive(Debug)]
pub enum Decl {
    Enum(EnumDecl),
    Message(MessageDecl),
}

#[derive(Debug)]
pub struct EnumDecl {
    pub rust_name: String,
    pub values: Vec<EnumValueDecl>,
}

#[derive(Debug)]
pub struct EnumValueDecl {
    pub name: String,
    pub number: i32,
    /// First-declared symbol for its number; the only decode target when
    /// several symbols share a value.
    pub canonical: bool,
}

#[derive(Debug)]
pub struct MessageDecl {
    pub rust_name: String,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug)]
pub struct FieldDecl {
    pub proto_name: String,
    /// Snake-case accessor/slot name, keyword-escaped.
    pub rust_name: String,
    pub tag: u32,
    pub label: Label,
    pub kind: GenKind,
}

#[derive(Debug)]
pub enum GenKind {
    Scalar(ScalarType),
    Enum {
        rust_path: String,
        /// First declared symbol, what the getter reports when unset.
        default_variant: String,
    },
    Message {
        rust_path: String,
        /// Singular slot stored as `Option<Box<T>>` because the target can
        /// reach back to the containing message through singular fields;
        /// an inline slot would make the struct infinitely sized.
        boxed: bool,
    },
    Group {
        rust_path: String,
        boxed: bool,
    },
}

/// Build the generation plan for `unit`. The graph must already be resolved
/// and validated; an unresolved reference here is reported, not generated
/// around.
pub fn generate(set: &UnitSet, unit: usize) -> Result<GeneratedUnit, String> {
    let module_names: Vec<String> = set
        .units
        .iter()
        .map(|u| snake_case(&unit_outer_name(u)))
        .collect();
    let u = &set.units[unit];
    let outer_name = unit_outer_name(u);

    let mut decls = Vec::new();
    for &e in &u.root_enums {
        decls.push(Decl::Enum(enum_decl(u, e)));
    }
    for &m in &u.root_messages {
        push_message(set, unit, &module_names, m, &mut decls)?;
    }

    Ok(GeneratedUnit {
        module_name: module_names[unit].clone(),
        outer_name,
        package: u.package.clone(),
        source_file: u.file_name.clone(),
        decls,
    })
}

fn push_message(
    set: &UnitSet,
    unit: usize,
    module_names: &[String],
    index: usize,
    decls: &mut Vec<Decl>,
) -> Result<(), String> {
    let u = &set.units[unit];
    let message = &u.messages[index];

    let mut fields = Vec::with_capacity(message.fields.len());
    for field in &message.fields {
        fields.push(FieldDecl {
            proto_name: field.name.clone(),
            rust_name: field_name(&field.name),
            tag: field.tag,
            label: field.label,
            kind: field_kind(set, unit, index, module_names, field)?,
        });
    }
    decls.push(Decl::Message(MessageDecl {
        rust_name: message_rust_name(u, index),
        fields,
    }));

    for &e in &message.nested_enums {
        decls.push(Decl::Enum(enum_decl(u, e)));
    }
    for &m in &message.nested_messages {
        push_message(set, unit, module_names, m, decls)?;
    }
    for field in &u.messages[index].fields {
        if let FieldType::Group(body) = field.field_type {
            push_message(set, unit, module_names, body, decls)?;
        }
    }
    Ok(())
}

fn field_kind(
    set: &UnitSet,
    unit: usize,
    container: usize,
    module_names: &[String],
    field: &Field,
) -> Result<GenKind, String> {
    // Repeated slots are `Vec`s, which already give the struct a finite
    // size; only singular slots can close a type cycle.
    let singular = field.label != Label::Repeated;
    Ok(match &field.field_type {
        FieldType::Scalar(scalar) => GenKind::Scalar(*scalar),
        FieldType::Group(body) => GenKind::Group {
            rust_path: message_rust_name(&set.units[unit], *body),
            boxed: singular
                && reaches_through_singular(set, (unit, *body), (unit, container), &mut Vec::new()),
        },
        FieldType::Named { name, resolved } => match resolved {
            Some(TypeRef::Message {
                unit: target_unit,
                index,
            }) => GenKind::Message {
                rust_path: cross_unit_path(
                    unit,
                    *target_unit,
                    module_names,
                    &message_rust_name(&set.units[*target_unit], *index),
                ),
                boxed: singular
                    && reaches_through_singular(
                        set,
                        (*target_unit, *index),
                        (unit, container),
                        &mut Vec::new(),
                    ),
            },
            Some(TypeRef::Enum {
                unit: target_unit,
                index,
            }) => {
                let target = &set.units[*target_unit].enums[*index];
                let default_variant = target
                    .values
                    .first()
                    .map(|v| v.name.clone())
                    .ok_or_else(|| format!("enum '{}' has no values", target.name))?;
                GenKind::Enum {
                    rust_path: cross_unit_path(
                        unit,
                        *target_unit,
                        module_names,
                        &enum_rust_name(&set.units[*target_unit], *index),
                    ),
                    default_variant,
                }
            }
            None => {
                return Err(format!(
                    "field '{}' references unresolved type '{}'",
                    field.name, name
                ))
            }
        },
    })
}

/// Walk singular message and group edges from `from`, looking for `target`.
/// A hit means a slot of `from`'s type inside `target` would nest `target`
/// inline within itself.
fn reaches_through_singular(
    set: &UnitSet,
    from: (usize, usize),
    target: (usize, usize),
    visited: &mut Vec<(usize, usize)>,
) -> bool {
    if from == target {
        return true;
    }
    if visited.contains(&from) {
        return false;
    }
    visited.push(from);
    for field in &set.units[from.0].messages[from.1].fields {
        if field.label == Label::Repeated {
            continue;
        }
        let next = match &field.field_type {
            FieldType::Group(body) => Some((from.0, *body)),
            FieldType::Named {
                resolved: Some(TypeRef::Message { unit, index }),
                ..
            } => Some((*unit, *index)),
            _ => None,
        };
        if let Some(next) = next {
            if reaches_through_singular(set, next, target, visited) {
                return true;
            }
        }
    }
    false
}

fn cross_unit_path(current: usize, target: usize, module_names: &[String], name: &str) -> String {
    if current == target {
        name.to_string()
    } else {
        // Generated modules are assumed to be siblings under one parent.
        format!("super::{}::{}", module_names[target], name)
    }
}

fn enum_decl(unit: &ProtoUnit, index: usize) -> EnumDecl {
    let e = &unit.enums[index];
    let mut seen_numbers = Vec::new();
    let values = e
        .values
        .iter()
        .map(|v| {
            let canonical = !seen_numbers.contains(&v.number);
            if canonical {
                seen_numbers.push(v.number);
            }
            EnumValueDecl {
                name: v.name.clone(),
                number: v.number,
                canonical,
            }
        })
        .collect();
    EnumDecl {
        rust_name: enum_rust_name(unit, index),
        values,
    }
}

/// `Outer.Inner` becomes `Outer_Inner`, each segment upper-camel.
fn message_rust_name(unit: &ProtoUnit, index: usize) -> String {
    let parts: Vec<String> = unit
        .qualified_name(index)
        .split('.')
        .map(upper_camel)
        .collect();
    parts.join("_")
}

fn enum_rust_name(unit: &ProtoUnit, index: usize) -> String {
    match unit.enums[index].parent {
        Some(parent) => format!(
            "{}_{}",
            message_rust_name(unit, parent),
            upper_camel(&unit.enums[index].name)
        ),
        None => upper_camel(&unit.enums[index].name),
    }
}

fn unit_outer_name(unit: &ProtoUnit) -> String {
    if let Some(name) = unit.get_option("outer_name") {
        return name.to_string();
    }
    let stem = unit
        .file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(&unit.file_name);
    let stem = stem.strip_suffix(".proto").unwrap_or(stem);
    upper_camel(stem)
}

pub fn upper_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for c in name.chars() {
        if c == '_' || c == '-' || c == '.' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
            out.push(c);
        }
    }
    out
}

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "box", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "static", "struct", "super", "trait", "true", "type",
    "typeof", "unsafe", "use", "where", "while", "yield",
];

/// Snake-case the field name and sidestep Rust keywords with a trailing
/// underscore (`type` becomes `type_`).
pub fn field_name(name: &str) -> String {
    let snake = snake_case(name);
    if RUST_KEYWORDS.contains(&snake.as_str()) {
        format!("{}_", snake)
    } else {
        snake
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    const SAMPLE: &str = r#"
package acme.tracker;
option outer_name = "Tracker";

enum Phase {
  IDLE = 0;
  ACTIVE = 1;
  LEGACY_ACTIVE = 1;
}

message Point {
  required int32 x = 1;
  required int32 y = 2;
}

message Track {
  optional Point origin = 1;
  optional Phase phase = 2;
  repeated group Sample = 3 {
    optional sint64 delta = 1;
  }
  message Meta {
    optional string type = 1;
  }
  optional Meta meta = 4;
}
"#;

    fn plan(source: &str) -> GeneratedUnit {
        let unit = parse(source, "tracker.proto").expect("parse");
        let mut set = UnitSet::new();
        let id = set.insert_anonymous(unit);
        set.resolve_unit(id);
        generate(&set, id).expect("generate")
    }

    #[test]
    fn names_and_order_are_deterministic() {
        let plan = plan(SAMPLE);
        assert_eq!(plan.outer_name, "Tracker");
        assert_eq!(plan.module_name, "tracker");
        assert_eq!(plan.package.as_deref(), Some("acme.tracker"));

        let names: Vec<&str> = plan
            .decls
            .iter()
            .map(|d| match d {
                Decl::Enum(e) => e.rust_name.as_str(),
                Decl::Message(m) => m.rust_name.as_str(),
            })
            .collect();
        assert_eq!(
            names,
            vec!["Phase", "Point", "Track", "Track_Meta", "Track_Sample"]
        );
    }

    #[test]
    fn field_kinds_carry_paths_and_defaults() {
        let plan = plan(SAMPLE);
        let track = match &plan.decls[2] {
            Decl::Message(m) => m,
            other => panic!("expected message, got {:?}", other),
        };
        match &track.fields[0].kind {
            GenKind::Message { rust_path, boxed } => {
                assert_eq!(rust_path, "Point");
                assert!(!*boxed);
            }
            other => panic!("unexpected kind {:?}", other),
        }
        match &track.fields[1].kind {
            GenKind::Enum {
                rust_path,
                default_variant,
            } => {
                assert_eq!(rust_path, "Phase");
                assert_eq!(default_variant, "IDLE");
            }
            other => panic!("unexpected kind {:?}", other),
        }
        match &track.fields[2].kind {
            GenKind::Group { rust_path, boxed } => {
                assert_eq!(rust_path, "Track_Sample");
                assert!(!*boxed);
            }
            other => panic!("unexpected kind {:?}", other),
        }
        match &track.fields[3].kind {
            GenKind::Message { rust_path, boxed } => {
                assert_eq!(rust_path, "Track_Meta");
                assert!(!*boxed);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn keyword_field_names_are_escaped() {
        let plan = plan(SAMPLE);
        let meta = match &plan.decls[3] {
            Decl::Message(m) => m,
            other => panic!("expected message, got {:?}", other),
        };
        assert_eq!(meta.fields[0].proto_name, "type");
        assert_eq!(meta.fields[0].rust_name, "type_");
    }

    #[test]
    fn duplicate_enum_numbers_keep_first_as_canonical() {
        let plan = plan(SAMPLE);
        let phase = match &plan.decls[0] {
            Decl::Enum(e) => e,
            other => panic!("expected enum, got {:?}", other),
        };
        assert!(phase.values[1].canonical);
        assert!(!phase.values[2].canonical, "LEGACY_ACTIVE shares value 1");
    }

    #[test]
    fn cross_file_references_go_through_sibling_modules() {
        let lib = parse("package acme.base; message Shared { optional int32 id = 1; }", "base.proto")
            .expect("parse lib");
        let main = parse(
            "import \"base.proto\"; message User { optional acme.base.Shared shared = 1; }",
            "main.proto",
        )
        .expect("parse main");

        let mut set = UnitSet::new();
        let lib_id = set.insert_anonymous(lib);
        let main_id = set.insert_anonymous(main);
        set.units[main_id].imports.push(lib_id);
        set.resolve_unit(main_id);

        let plan = generate(&set, main_id).expect("generate");
        let user = match &plan.decls[0] {
            Decl::Message(m) => m,
            other => panic!("expected message, got {:?}", other),
        };
        match &user.fields[0].kind {
            GenKind::Message { rust_path, boxed } => {
                assert_eq!(rust_path, "super::base::Shared");
                assert!(!*boxed);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    fn kind_of<'a>(plan: &'a GeneratedUnit, decl: usize, field: usize) -> &'a GenKind {
        match &plan.decls[decl] {
            Decl::Message(m) => &m.fields[field].kind,
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[test]
    fn self_referential_singular_fields_are_boxed() {
        let plan = plan("message Node { optional Node next = 1; optional int32 value = 2; }");
        match kind_of(&plan, 0, 0) {
            GenKind::Message { boxed, .. } => assert!(*boxed),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn mutually_recursive_messages_are_boxed_both_ways() {
        let plan = plan(
            r#"
message A { optional B b = 1; }
message B { optional A a = 1; }
"#,
        );
        match kind_of(&plan, 0, 0) {
            GenKind::Message { boxed, .. } => assert!(*boxed),
            other => panic!("unexpected kind {:?}", other),
        }
        match kind_of(&plan, 1, 0) {
            GenKind::Message { boxed, .. } => assert!(*boxed),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn repeated_self_references_stay_unboxed() {
        // A Vec already stores its elements out of line.
        let plan = plan("message Tree { repeated Tree children = 1; }");
        match kind_of(&plan, 0, 0) {
            GenKind::Message { boxed, .. } => assert!(!*boxed),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn group_cycles_back_to_the_container_are_boxed() {
        let plan = plan(
            r#"
message M {
  optional group G = 1 {
    optional M back = 1;
  }
}
"#,
        );
        match kind_of(&plan, 0, 0) {
            GenKind::Group { boxed, .. } => assert!(*boxed),
            other => panic!("unexpected kind {:?}", other),
        }
        // The body's reference to the container closes the same cycle.
        match kind_of(&plan, 1, 0) {
            GenKind::Message { boxed, .. } => assert!(*boxed),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn name_helpers() {
        assert_eq!(upper_camel("foo_bar"), "FooBar");
        assert_eq!(upper_camel("Track"), "Track");
        assert_eq!(snake_case("TrackPoint"), "track_point");
        assert_eq!(snake_case("already_snake"), "already_snake");
        assert_eq!(field_name("match"), "match_");
        assert_eq!(field_name("userId"), "user_id");
    }
}
