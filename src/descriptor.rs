//! Descriptor model: the parsed, structural representation of proto files.
//!
//! One `ProtoUnit` per file. Messages (including group bodies) and enums live
//! in per-unit arenas and reference each other by index; a message's parent is
//! an index back-reference used only for qualified-name computation, never an
//! ownership edge. Units themselves live in a `UnitSet` arena keyed by
//! resolved file path, so diamond imports parse once and mutual imports
//! between distinct files are representable without cycles of ownership.
//!
//! The whole graph is built once per compile, name-resolved, validated, then
//! handed read-only to the generator.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The fifteen scalar field types of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Int32,
    Int64,
    UInt32,
    UInt64,
    SInt32,
    SInt64,
    Fixed32,
    Fixed64,
    SFixed32,
    SFixed64,
    Bool,
    Double,
    Float,
    String,
    Bytes,
}

impl ScalarType {
    /// Map an IDL type name; `None` means the name must resolve to a message
    /// or enum instead.
    pub fn from_name(name: &str) -> Option<ScalarType> {
        Some(match name {
            "int32" => ScalarType::Int32,
            "int64" => ScalarType::Int64,
            "uint32" => ScalarType::UInt32,
            "uint64" => ScalarType::UInt64,
            "sint32" => ScalarType::SInt32,
            "sint64" => ScalarType::SInt64,
            "fixed32" => ScalarType::Fixed32,
            "fixed64" => ScalarType::Fixed64,
            "sfixed32" => ScalarType::SFixed32,
            "sfixed64" => ScalarType::SFixed64,
            "bool" => ScalarType::Bool,
            "double" => ScalarType::Double,
            "float" => ScalarType::Float,
            "string" => ScalarType::String,
            "bytes" => ScalarType::Bytes,
            _ => return None,
        })
    }

    /// Wire type used for a value of this scalar type.
    pub fn wire_type(self) -> u32 {
        use crate::wire::*;
        match self {
            ScalarType::Int32
            | ScalarType::Int64
            | ScalarType::UInt32
            | ScalarType::UInt64
            | ScalarType::SInt32
            | ScalarType::SInt64
            | ScalarType::Bool => WIRETYPE_VARINT,
            ScalarType::Fixed64 | ScalarType::SFixed64 | ScalarType::Double => WIRETYPE_FIXED64,
            ScalarType::Fixed32 | ScalarType::SFixed32 | ScalarType::Float => WIRETYPE_FIXED32,
            ScalarType::String | ScalarType::Bytes => WIRETYPE_LENGTH_DELIMITED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Required,
    Optional,
    Repeated,
}

/// A resolved reference to a message or enum: unit arena id plus index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRef {
    Message { unit: usize, index: usize },
    Enum { unit: usize, index: usize },
}

/// Closed field-type variant set; dispatch is by pattern match, never by
/// runtime type tests.
#[derive(Debug, Clone)]
pub enum FieldType {
    Scalar(ScalarType),
    /// A named reference, resolved in place before validation begins.
    Named {
        name: String,
        resolved: Option<TypeRef>,
    },
    /// A group field owns a message-shaped body in the same unit's arena.
    Group(usize),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub tag: u32,
    pub label: Label,
    pub field_type: FieldType,
    /// Raw `[default = ...]` option text; stored, never consulted by the wire
    /// engine.
    pub options: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy)]
pub struct ExtensionRange {
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone)]
pub struct MessageType {
    pub name: String,
    /// Enclosing message in the same arena; qualified-name computation only.
    pub parent: Option<usize>,
    /// Declaration order is significant: it drives generation and encoding
    /// order.
    pub fields: Vec<Field>,
    /// Nested message indices, excluding group bodies.
    pub nested_messages: Vec<usize>,
    pub nested_enums: Vec<usize>,
    pub extension_ranges: Vec<ExtensionRange>,
    pub options: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct EnumValue {
    pub name: String,
    pub number: i32,
}

/// Symbols in declaration order. Multiple symbols may share a wire value;
/// only the first-declared one is the canonical decode target.
#[derive(Debug, Clone)]
pub struct EnumType {
    pub name: String,
    pub parent: Option<usize>,
    pub values: Vec<EnumValue>,
}

/// One parsed proto file.
#[derive(Debug, Clone, Default)]
pub struct ProtoUnit {
    pub file_name: String,
    pub package: Option<String>,
    pub options: Vec<(String, String)>,
    /// Import paths as written in the file, declaration order.
    pub import_paths: Vec<String>,
    /// Resolved imports as `UnitSet` ids, filled by the import loader.
    pub imports: Vec<usize>,
    /// Arena of every message in the file, nested and group bodies included.
    pub messages: Vec<MessageType>,
    pub enums: Vec<EnumType>,
    /// Top-level declarations, declaration order.
    pub root_messages: Vec<usize>,
    pub root_enums: Vec<usize>,
}

impl ProtoUnit {
    pub fn get_option<'a>(&'a self, name: &str) -> Option<&'a str> {
        self.options
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Dotted name of a message, e.g. `Outer.Inner`, walking parent indices.
    pub fn qualified_name(&self, mut index: usize) -> String {
        let mut parts = vec![self.messages[index].name.clone()];
        while let Some(parent) = self.messages[index].parent {
            parts.push(self.messages[parent].name.clone());
            index = parent;
        }
        parts.reverse();
        parts.join(".")
    }

    /// Look up a possibly dotted name among the direct children of a message
    /// (or of the file when `scope` is `None`).
    fn lookup_child(&self, unit_id: usize, scope: Option<usize>, name: &str) -> Option<TypeRef> {
        let (messages, enums): (&[usize], &[usize]) = match scope {
            Some(m) => (
                &self.messages[m].nested_messages,
                &self.messages[m].nested_enums,
            ),
            None => (&self.root_messages, &self.root_enums),
        };
        let (head, rest) = match name.split_once('.') {
            Some((h, r)) => (h, Some(r)),
            None => (name, None),
        };
        for &m in messages {
            if self.messages[m].name == head {
                return match rest {
                    None => Some(TypeRef::Message {
                        unit: unit_id,
                        index: m,
                    }),
                    Some(rest) => self.lookup_child(unit_id, Some(m), rest),
                };
            }
        }
        if rest.is_none() {
            for &e in enums {
                if self.enums[e].name == head {
                    return Some(TypeRef::Enum {
                        unit: unit_id,
                        index: e,
                    });
                }
            }
        }
        None
    }
}

/// Arena of parsed units. The path memo guarantees each file is parsed at
/// most once, which keeps diamond and mutual imports finite.
#[derive(Debug, Default)]
pub struct UnitSet {
    pub units: Vec<ProtoUnit>,
    by_path: HashMap<PathBuf, usize>,
}

impl UnitSet {
    pub fn new() -> Self {
        UnitSet::default()
    }

    pub fn id_for_path(&self, path: &Path) -> Option<usize> {
        self.by_path.get(path).copied()
    }

    pub fn insert(&mut self, path: PathBuf, unit: ProtoUnit) -> usize {
        let id = self.units.len();
        self.units.push(unit);
        self.by_path.insert(path, id);
        id
    }

    /// Add a unit that has no backing file (in-memory compiles and tests).
    pub fn insert_anonymous(&mut self, unit: ProtoUnit) -> usize {
        let id = self.units.len();
        self.units.push(unit);
        id
    }

    /// Resolve a type name from inside `scope` (a message index in `unit`,
    /// or `None` for file scope): enclosing messages outward, then the file's
    /// direct children, then each imported unit's top-level children by exact
    /// or package-qualified name.
    pub fn resolve(&self, unit: usize, scope: Option<usize>, name: &str) -> Option<TypeRef> {
        let u = &self.units[unit];
        let mut current = scope;
        loop {
            if let Some(found) = u.lookup_child(unit, current, name) {
                return Some(found);
            }
            match current {
                Some(m) => current = u.messages[m].parent,
                None => break,
            }
        }
        for &import in &u.imports {
            let imported = &self.units[import];
            if let Some(found) = imported.lookup_child(import, None, name) {
                return Some(found);
            }
            if let Some(package) = &imported.package {
                if let Some(rest) = name
                    .strip_prefix(package.as_str())
                    .and_then(|r| r.strip_prefix('.'))
                {
                    if let Some(found) = imported.lookup_child(import, None, rest) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    /// Fill in `FieldType::Named::resolved` for every field of `unit` and its
    /// imports. Unresolved names are left `None` for the validator to report.
    pub fn resolve_unit(&mut self, unit: usize) {
        let mut seen = vec![false; self.units.len()];
        let mut stack = vec![unit];
        while let Some(id) = stack.pop() {
            if seen[id] {
                continue;
            }
            seen[id] = true;
            stack.extend(self.units[id].imports.iter().copied());

            let mut updates: Vec<(usize, usize, TypeRef)> = Vec::new();
            for (m, message) in self.units[id].messages.iter().enumerate() {
                for (f, field) in message.fields.iter().enumerate() {
                    if let FieldType::Named { name, resolved } = &field.field_type {
                        if resolved.is_none() {
                            if let Some(r) = self.resolve(id, Some(m), name) {
                                updates.push((m, f, r));
                            }
                        }
                    }
                }
            }
            for (m, f, r) in updates {
                if let FieldType::Named { resolved, .. } =
                    &mut self.units[id].messages[m].fields[f].field_type
                {
                    *resolved = Some(r);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(name: &str, parent: Option<usize>) -> MessageType {
        MessageType {
            name: name.to_string(),
            parent,
            fields: Vec::new(),
            nested_messages: Vec::new(),
            nested_enums: Vec::new(),
            extension_ranges: Vec::new(),
            options: Vec::new(),
        }
    }

    fn named_field(name: &str, tag: u32, type_name: &str) -> Field {
        Field {
            name: name.to_string(),
            tag,
            label: Label::Optional,
            field_type: FieldType::Named {
                name: type_name.to_string(),
                resolved: None,
            },
            options: Vec::new(),
        }
    }

    #[test]
    fn qualified_name_walks_parents() {
        let mut unit = ProtoUnit::default();
        unit.messages.push(message("Outer", None));
        unit.messages.push(message("Inner", Some(0)));
        unit.messages[0].nested_messages.push(1);
        unit.root_messages.push(0);
        assert_eq!(unit.qualified_name(1), "Outer.Inner");
    }

    #[test]
    fn resolve_prefers_inner_scope() {
        let mut unit = ProtoUnit::default();
        unit.messages.push(message("Shadow", None)); // file-level
        unit.messages.push(message("Holder", None));
        unit.messages.push(message("Shadow", Some(1))); // nested in Holder
        unit.messages[1].nested_messages.push(2);
        unit.root_messages.extend([0, 1]);

        let mut set = UnitSet::new();
        let id = set.insert_anonymous(unit);
        assert_eq!(
            set.resolve(id, Some(1), "Shadow"),
            Some(TypeRef::Message { unit: id, index: 2 })
        );
        assert_eq!(
            set.resolve(id, None, "Shadow"),
            Some(TypeRef::Message { unit: id, index: 0 })
        );
    }

    #[test]
    fn resolve_dotted_and_imported_names() {
        let mut lib = ProtoUnit::default();
        lib.package = Some("acme.base".to_string());
        lib.messages.push(message("Shared", None));
        lib.root_messages.push(0);

        let mut main = ProtoUnit::default();
        main.messages.push(message("Outer", None));
        main.messages.push(message("Inner", Some(0)));
        main.messages[0].nested_messages.push(1);
        main.root_messages.push(0);

        let mut set = UnitSet::new();
        let lib_id = set.insert_anonymous(lib);
        let main_id = set.insert_anonymous(main);
        set.units[main_id].imports.push(lib_id);

        assert_eq!(
            set.resolve(main_id, None, "Outer.Inner"),
            Some(TypeRef::Message {
                unit: main_id,
                index: 1
            })
        );
        assert_eq!(
            set.resolve(main_id, None, "Shared"),
            Some(TypeRef::Message {
                unit: lib_id,
                index: 0
            })
        );
        assert_eq!(
            set.resolve(main_id, None, "acme.base.Shared"),
            Some(TypeRef::Message {
                unit: lib_id,
                index: 0
            })
        );
        assert_eq!(set.resolve(main_id, None, "Nowhere"), None);
    }

    #[test]
    fn resolve_unit_fills_named_references() {
        let mut unit = ProtoUnit::default();
        unit.messages.push(message("Target", None));
        unit.messages.push(message("User", None));
        unit.messages[1].fields.push(named_field("t", 1, "Target"));
        unit.messages[1].fields.push(named_field("x", 2, "Missing"));
        unit.root_messages.extend([0, 1]);

        let mut set = UnitSet::new();
        let id = set.insert_anonymous(unit);
        set.resolve_unit(id);

        match &set.units[id].messages[1].fields[0].field_type {
            FieldType::Named { resolved, .. } => {
                assert_eq!(*resolved, Some(TypeRef::Message { unit: id, index: 0 }));
            }
            other => panic!("unexpected field type: {:?}", other),
        }
        match &set.units[id].messages[1].fields[1].field_type {
            FieldType::Named { resolved, .. } => assert!(resolved.is_none()),
            other => panic!("unexpected field type: {:?}", other),
        }
    }
}
