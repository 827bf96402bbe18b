//! Render a generation plan as Rust source text.
//!
//! The output is one self-contained module per proto file: plain structs with
//! `Option`/`Vec` slots and a serialized-size cache, accessor methods that
//! invalidate the cache on mutation, enums with `number`/`from_number`, and a
//! `Message` impl per struct. Rendering is a straight walk over the plan with
//! an explicit indent level; no state survives between declarations, so equal
//! plans render to equal bytes.

use crate::codegen::{Decl, EnumDecl, FieldDecl, GenKind, GeneratedUnit, MessageDecl};
use crate::descriptor::{Label, ScalarType};

pub fn render(unit: &GeneratedUnit) -> String {
    let mut ctx = Ctx::new();
    ctx.p(&format!(
        "// Generated by protomsg from `{}`. Do not edit by hand.",
        unit.source_file
    ));
    if let Some(package) = &unit.package {
        ctx.p(&format!("// Package: {}", package));
    }
    ctx.blank();
    ctx.p("#![allow(dead_code)]");
    ctx.p("#![allow(unused_imports)]");
    ctx.p("#![allow(non_camel_case_types)]");
    ctx.p("#![allow(clippy::all)]");
    ctx.blank();
    ctx.p("use std::cell::Cell;");
    ctx.blank();
    ctx.p("use protomsg::coded::{CodedReader, CodedWriter};");
    ctx.p("use protomsg::message::{self, Message};");
    ctx.p("use protomsg::wire::{self, WireError};");

    for decl in &unit.decls {
        ctx.blank();
        match decl {
            Decl::Enum(e) => render_enum(&mut ctx, e),
            Decl::Message(m) => render_message(&mut ctx, m),
        }
    }
    ctx.out
}

struct Ctx {
    out: String,
    indent: usize,
}

impl Ctx {
    fn new() -> Self {
        Ctx {
            out: String::new(),
            indent: 0,
        }
    }

    fn p(&mut self, line: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(line);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    /// Print a line opening a block and indent until the matching `close`.
    fn open(&mut self, line: &str) {
        self.p(line);
        self.indent += 1;
    }

    fn close(&mut self, line: &str) {
        self.indent -= 1;
        self.p(line);
    }
}

fn render_enum(ctx: &mut Ctx, e: &EnumDecl) {
    ctx.p("#[derive(Debug, Clone, Copy, PartialEq, Eq)]");
    ctx.open(&format!("pub enum {} {{", e.rust_name));
    for value in &e.values {
        ctx.p(&format!("{},", value.name));
    }
    ctx.close("}");
    ctx.blank();

    ctx.open(&format!("impl {} {{", e.rust_name));
    ctx.open("pub fn number(self) -> i32 {");
    ctx.open("match self {");
    for value in &e.values {
        ctx.p(&format!(
            "{}::{} => {},",
            e.rust_name, value.name, value.number
        ));
    }
    ctx.close("}");
    ctx.close("}");
    ctx.blank();

    // When several symbols share a number, the first declared one wins.
    ctx.open(&format!(
        "pub fn from_number(number: i32) -> Option<{}> {{",
        e.rust_name
    ));
    ctx.open("match number {");
    for value in e.values.iter().filter(|v| v.canonical) {
        ctx.p(&format!(
            "{} => Some({}::{}),",
            value.number, e.rust_name, value.name
        ));
    }
    ctx.p("_ => None,");
    ctx.close("}");
    ctx.close("}");
    ctx.close("}");

    // The validator rejects empty enums, but don't render nonsense if one
    // slips through.
    if let Some(first) = e.values.first() {
        ctx.blank();
        ctx.open(&format!("impl Default for {} {{", e.rust_name));
        ctx.open(&format!("fn default() -> {} {{", e.rust_name));
        ctx.p(&format!("{}::{}", e.rust_name, first.name));
        ctx.close("}");
        ctx.close("}");
    }
}

fn render_message(ctx: &mut Ctx, m: &MessageDecl) {
    ctx.p("#[derive(Debug, Clone, Default)]");
    ctx.open(&format!("pub struct {} {{", m.rust_name));
    for field in &m.fields {
        ctx.p(&format!("{}: {},", field.rust_name, slot_type(field)));
    }
    ctx.p("cached_size: Cell<Option<u32>>,");
    ctx.close("}");
    ctx.blank();

    // The size cache is presentation state, never part of equality.
    ctx.open(&format!("impl PartialEq for {} {{", m.rust_name));
    if m.fields.is_empty() {
        ctx.open(&format!("fn eq(&self, _other: &{}) -> bool {{", m.rust_name));
        ctx.p("true");
    } else {
        ctx.open(&format!("fn eq(&self, other: &{}) -> bool {{", m.rust_name));
        let clauses: Vec<String> = m
            .fields
            .iter()
            .map(|f| format!("self.{name} == other.{name}", name = f.rust_name))
            .collect();
        ctx.p(&clauses.join(" && "));
    }
    ctx.close("}");
    ctx.close("}");
    ctx.blank();

    render_accessors(ctx, m);
    ctx.blank();
    render_message_impl(ctx, m);
}

fn render_accessors(ctx: &mut Ctx, m: &MessageDecl) {
    ctx.open(&format!("impl {} {{", m.rust_name));
    ctx.open(&format!("pub fn new() -> {} {{", m.rust_name));
    ctx.p(&format!("{}::default()", m.rust_name));
    ctx.close("}");

    for field in &m.fields {
        ctx.blank();
        match field.label {
            Label::Repeated => render_repeated_accessors(ctx, field),
            _ => render_singular_accessors(ctx, field),
        }
    }
    ctx.close("}");
}

fn render_singular_accessors(ctx: &mut Ctx, f: &FieldDecl) {
    let name = &f.rust_name;
    let base = base_type(f);
    match &f.kind {
        GenKind::Scalar(ScalarType::String) => {
            ctx.open(&format!("pub fn {}(&self) -> &str {{", name));
            ctx.p(&format!("self.{}.as_deref().unwrap_or(\"\")", name));
            ctx.close("}");
        }
        GenKind::Scalar(ScalarType::Bytes) => {
            ctx.open(&format!("pub fn {}(&self) -> &[u8] {{", name));
            ctx.p(&format!("self.{}.as_deref().unwrap_or(&[])", name));
            ctx.close("}");
        }
        GenKind::Scalar(_) => {
            ctx.open(&format!("pub fn {}(&self) -> {} {{", name, base));
            ctx.p(&format!("self.{}.unwrap_or_default()", name));
            ctx.close("}");
        }
        GenKind::Enum {
            rust_path,
            default_variant,
        } => {
            ctx.open(&format!("pub fn {}(&self) -> {} {{", name, rust_path));
            ctx.p(&format!(
                "self.{}.unwrap_or({}::{})",
                name, rust_path, default_variant
            ));
            ctx.close("}");
        }
        GenKind::Message { rust_path, boxed } | GenKind::Group { rust_path, boxed } => {
            ctx.open(&format!(
                "pub fn {}(&self) -> Option<&{}> {{",
                name, rust_path
            ));
            if *boxed {
                ctx.p(&format!("self.{}.as_deref()", name));
            } else {
                ctx.p(&format!("self.{}.as_ref()", name));
            }
            ctx.close("}");
            ctx.blank();
            ctx.open(&format!(
                "pub fn {}_mut(&mut self) -> &mut {} {{",
                name, rust_path
            ));
            ctx.p("self.cached_size.set(None);");
            if *boxed {
                ctx.p(&format!("self.{}.get_or_insert_with(Box::default)", name));
            } else {
                ctx.p(&format!(
                    "self.{}.get_or_insert_with({}::default)",
                    name, rust_path
                ));
            }
            ctx.close("}");
        }
    }
    ctx.blank();
    ctx.open(&format!("pub fn has_{}(&self) -> bool {{", name));
    ctx.p(&format!("self.{}.is_some()", name));
    ctx.close("}");
    ctx.blank();
    ctx.open(&format!("pub fn set_{}(&mut self, value: {}) {{", name, base));
    ctx.p("self.cached_size.set(None);");
    if is_boxed(f) {
        ctx.p(&format!("self.{} = Some(Box::new(value));", name));
    } else {
        ctx.p(&format!("self.{} = Some(value);", name));
    }
    ctx.close("}");
    ctx.blank();
    ctx.open(&format!("pub fn clear_{}(&mut self) {{", name));
    ctx.p("self.cached_size.set(None);");
    ctx.p(&format!("self.{} = None;", name));
    ctx.close("}");
}

fn render_repeated_accessors(ctx: &mut Ctx, f: &FieldDecl) {
    let name = &f.rust_name;
    let base = base_type(f);
    ctx.open(&format!("pub fn {}(&self) -> &[{}] {{", name, base));
    ctx.p(&format!("&self.{}", name));
    ctx.close("}");
    ctx.blank();
    ctx.open(&format!(
        "pub fn {}_mut(&mut self) -> &mut Vec<{}> {{",
        name, base
    ));
    ctx.p("self.cached_size.set(None);");
    ctx.p(&format!("&mut self.{}", name));
    ctx.close("}");
    ctx.blank();
    ctx.open(&format!("pub fn add_{}(&mut self, value: {}) {{", name, base));
    ctx.p("self.cached_size.set(None);");
    ctx.p(&format!("self.{}.push(value);", name));
    ctx.close("}");
    ctx.blank();
    ctx.open(&format!("pub fn clear_{}(&mut self) {{", name));
    ctx.p("self.cached_size.set(None);");
    ctx.p(&format!("self.{}.clear();", name));
    ctx.close("}");
}

fn render_message_impl(ctx: &mut Ctx, m: &MessageDecl) {
    ctx.open(&format!("impl Message for {} {{", m.rust_name));
    render_merge_unframed(ctx, m);
    ctx.blank();
    render_write_unframed(ctx, m);
    ctx.blank();
    render_serialized_size(ctx, m);
    ctx.blank();
    render_merge_from(ctx, m);
    ctx.blank();
    render_is_initialized(ctx, m);
    ctx.blank();
    render_clear(ctx, m);
    ctx.close("}");
}

fn render_merge_unframed(ctx: &mut Ctx, m: &MessageDecl) {
    ctx.open("fn merge_unframed(&mut self, input: &mut CodedReader<'_>) -> Result<(), WireError> {");
    ctx.p("self.cached_size.set(None);");
    ctx.open("loop {");
    ctx.p("let tag = input.read_tag()?;");
    ctx.open("if tag == 0 {");
    ctx.p("return Ok(());");
    ctx.close("}");
    ctx.p("let wire_type = tag & 7;");
    // An end-group tag terminates the message before field dispatch, so a
    // body field sharing the group's own field number can never capture it.
    ctx.open("if wire_type == wire::WIRETYPE_END_GROUP {");
    ctx.p("return Ok(());");
    ctx.close("}");
    ctx.open("match tag >> 3 {");
    for f in &m.fields {
        ctx.open(&format!("{} => {{", f.tag));
        ctx.p(&format!(
            "wire::expect_wire_type({}, {}, wire_type)?;",
            f.tag,
            expected_wire_const(f)
        ));
        render_decode_field(ctx, f);
        ctx.close("}");
    }
    ctx.open("_ => {");
    ctx.open("if !input.skip_field(wire_type)? {");
    ctx.p("return Ok(());");
    ctx.close("}");
    ctx.close("}");
    ctx.close("}");
    ctx.close("}");
    ctx.close("}");
}

fn render_decode_field(ctx: &mut Ctx, f: &FieldDecl) {
    let name = &f.rust_name;
    let repeated = f.label == Label::Repeated;
    match &f.kind {
        GenKind::Scalar(scalar) => {
            let read = format!("input.read_{}()?", scalar_name(*scalar));
            if repeated {
                ctx.p(&format!("self.{}.push({});", name, read));
            } else {
                ctx.p(&format!("self.{} = Some({});", name, read));
            }
        }
        GenKind::Enum { rust_path, .. } => {
            // An unknown number is dropped, not an error; the reader counts it.
            ctx.open(&format!(
                "match {}::from_number(input.read_enum()?) {{",
                rust_path
            ));
            if repeated {
                ctx.p(&format!("Some(value) => self.{}.push(value),", name));
            } else {
                ctx.p(&format!("Some(value) => self.{} = Some(value),", name));
            }
            ctx.p("None => input.note_unrecognized_enum(),");
            ctx.close("}");
        }
        GenKind::Message { rust_path, boxed } => {
            if repeated {
                ctx.p(&format!("let mut value = {}::default();", rust_path));
                ctx.p("message::read_message(input, &mut value)?;");
                ctx.p(&format!("self.{}.push(value);", name));
            } else if *boxed {
                ctx.p(&format!(
                    "message::read_message(input, self.{}.get_or_insert_with(Box::default).as_mut())?;",
                    name
                ));
            } else {
                ctx.p(&format!(
                    "message::read_message(input, self.{}.get_or_insert_with({}::default))?;",
                    name, rust_path
                ));
            }
        }
        GenKind::Group { rust_path, boxed } => {
            if repeated {
                ctx.p(&format!("let mut value = {}::default();", rust_path));
                ctx.p(&format!(
                    "message::read_group(input, {}, &mut value)?;",
                    f.tag
                ));
                ctx.p(&format!("self.{}.push(value);", name));
            } else if *boxed {
                ctx.p(&format!(
                    "message::read_group(input, {}, self.{}.get_or_insert_with(Box::default).as_mut())?;",
                    f.tag, name
                ));
            } else {
                ctx.p(&format!(
                    "message::read_group(input, {}, self.{}.get_or_insert_with({}::default))?;",
                    f.tag, name, rust_path
                ));
            }
        }
    }
}

fn render_write_unframed(ctx: &mut Ctx, m: &MessageDecl) {
    let output = if m.fields.is_empty() { "_output" } else { "output" };
    ctx.open(&format!(
        "fn write_unframed(&self, {}: &mut CodedWriter<'_>) -> Result<(), WireError> {{",
        output
    ));
    for f in &m.fields {
        render_write_field(ctx, f);
    }
    ctx.p("Ok(())");
    ctx.close("}");
}

fn render_write_field(ctx: &mut Ctx, f: &FieldDecl) {
    let name = &f.rust_name;
    let repeated = f.label == Label::Repeated;
    match &f.kind {
        GenKind::Scalar(scalar) => {
            let write = format!("output.write_{}({}, ", scalar_name(*scalar), f.tag);
            if repeated {
                let value = if scalar_is_copy(*scalar) { "*value" } else { "value" };
                ctx.open(&format!("for value in &self.{} {{", name));
                ctx.p(&format!("{}{})?;", write, value));
                ctx.close("}");
            } else if scalar_is_copy(*scalar) {
                ctx.open(&format!("if let Some(value) = self.{} {{", name));
                ctx.p(&format!("{}value)?;", write));
                ctx.close("}");
            } else {
                ctx.open(&format!("if let Some(value) = &self.{} {{", name));
                ctx.p(&format!("{}value)?;", write));
                ctx.close("}");
            }
        }
        GenKind::Enum { .. } => {
            if repeated {
                ctx.open(&format!("for value in &self.{} {{", name));
                ctx.p(&format!("output.write_enum({}, value.number())?;", f.tag));
                ctx.close("}");
            } else {
                ctx.open(&format!("if let Some(value) = self.{} {{", name));
                ctx.p(&format!("output.write_enum({}, value.number())?;", f.tag));
                ctx.close("}");
            }
        }
        GenKind::Message { .. } => {
            let value = if is_boxed(f) { "value.as_ref()" } else { "value" };
            if repeated {
                ctx.open(&format!("for value in &self.{} {{", name));
                ctx.p(&format!("message::write_message(output, {}, {})?;", f.tag, value));
                ctx.close("}");
            } else {
                ctx.open(&format!("if let Some(value) = &self.{} {{", name));
                ctx.p(&format!("message::write_message(output, {}, {})?;", f.tag, value));
                ctx.close("}");
            }
        }
        GenKind::Group { .. } => {
            let value = if is_boxed(f) { "value.as_ref()" } else { "value" };
            if repeated {
                ctx.open(&format!("for value in &self.{} {{", name));
                ctx.p(&format!("message::write_group(output, {}, {})?;", f.tag, value));
                ctx.close("}");
            } else {
                ctx.open(&format!("if let Some(value) = &self.{} {{", name));
                ctx.p(&format!("message::write_group(output, {}, {})?;", f.tag, value));
                ctx.close("}");
            }
        }
    }
}

fn render_serialized_size(ctx: &mut Ctx, m: &MessageDecl) {
    ctx.open("fn serialized_size_unframed(&self) -> usize {");
    ctx.open("if let Some(size) = self.cached_size.get() {");
    ctx.p("return size as usize;");
    ctx.close("}");
    ctx.p("let mut size = 0;");
    for f in &m.fields {
        render_size_field(ctx, f);
    }
    ctx.p("self.cached_size.set(Some(size as u32));");
    ctx.p("size");
    ctx.close("}");
}

fn render_size_field(ctx: &mut Ctx, f: &FieldDecl) {
    let name = &f.rust_name;
    let repeated = f.label == Label::Repeated;
    match &f.kind {
        GenKind::Scalar(scalar) => {
            let (size_fn, takes_value) = scalar_size_fn(*scalar);
            if !takes_value {
                // Fixed-width values: the size depends only on the count.
                if repeated {
                    ctx.p(&format!(
                        "size += self.{}.len() * wire::{}({});",
                        name, size_fn, f.tag
                    ));
                } else {
                    ctx.open(&format!("if self.{}.is_some() {{", name));
                    ctx.p(&format!("size += wire::{}({});", size_fn, f.tag));
                    ctx.close("}");
                }
            } else if repeated {
                let value = if scalar_is_copy(*scalar) { "*value" } else { "value" };
                ctx.open(&format!("for value in &self.{} {{", name));
                ctx.p(&format!("size += wire::{}({}, {});", size_fn, f.tag, value));
                ctx.close("}");
            } else if scalar_is_copy(*scalar) {
                ctx.open(&format!("if let Some(value) = self.{} {{", name));
                ctx.p(&format!("size += wire::{}({}, value);", size_fn, f.tag));
                ctx.close("}");
            } else {
                ctx.open(&format!("if let Some(value) = &self.{} {{", name));
                ctx.p(&format!("size += wire::{}({}, value);", size_fn, f.tag));
                ctx.close("}");
            }
        }
        GenKind::Enum { .. } => {
            if repeated {
                ctx.open(&format!("for value in &self.{} {{", name));
                ctx.p(&format!(
                    "size += wire::enum_size({}, value.number());",
                    f.tag
                ));
                ctx.close("}");
            } else {
                ctx.open(&format!("if let Some(value) = self.{} {{", name));
                ctx.p(&format!(
                    "size += wire::enum_size({}, value.number());",
                    f.tag
                ));
                ctx.close("}");
            }
        }
        GenKind::Message { .. } => {
            let value = if is_boxed(f) { "value.as_ref()" } else { "value" };
            if repeated {
                ctx.open(&format!("for value in &self.{} {{", name));
                ctx.p(&format!("size += message::message_size({}, {});", f.tag, value));
                ctx.close("}");
            } else {
                ctx.open(&format!("if let Some(value) = &self.{} {{", name));
                ctx.p(&format!("size += message::message_size({}, {});", f.tag, value));
                ctx.close("}");
            }
        }
        GenKind::Group { .. } => {
            let value = if is_boxed(f) { "value.as_ref()" } else { "value" };
            if repeated {
                ctx.open(&format!("for value in &self.{} {{", name));
                ctx.p(&format!("size += message::group_size({}, {});", f.tag, value));
                ctx.close("}");
            } else {
                ctx.open(&format!("if let Some(value) = &self.{} {{", name));
                ctx.p(&format!("size += message::group_size({}, {});", f.tag, value));
                ctx.close("}");
            }
        }
    }
}

fn render_merge_from(ctx: &mut Ctx, m: &MessageDecl) {
    let other = if m.fields.is_empty() { "_other" } else { "other" };
    ctx.open(&format!(
        "fn merge_from(&mut self, {}: &{}) {{",
        other, m.rust_name
    ));
    if !m.fields.is_empty() {
        ctx.p("self.cached_size.set(None);");
    }
    for f in &m.fields {
        let name = &f.rust_name;
        if f.label == Label::Repeated {
            ctx.p(&format!(
                "self.{name}.extend_from_slice(&other.{name});",
                name = name
            ));
            continue;
        }
        match &f.kind {
            GenKind::Scalar(scalar) if !scalar_is_copy(*scalar) => {
                ctx.open(&format!("if let Some(value) = &other.{} {{", name));
                ctx.p(&format!("self.{} = Some(value.clone());", name));
                ctx.close("}");
            }
            GenKind::Scalar(_) | GenKind::Enum { .. } => {
                ctx.open(&format!("if let Some(value) = other.{} {{", name));
                ctx.p(&format!("self.{} = Some(value);", name));
                ctx.close("}");
            }
            GenKind::Message { .. } | GenKind::Group { .. } => {
                ctx.open(&format!("if let Some(value) = &other.{} {{", name));
                ctx.open(&format!("match &mut self.{} {{", name));
                ctx.p("Some(existing) => existing.merge_from(value),");
                ctx.p(&format!("None => self.{} = Some(value.clone()),", name));
                ctx.close("}");
                ctx.close("}");
            }
        }
    }
    ctx.close("}");
}

fn render_is_initialized(ctx: &mut Ctx, m: &MessageDecl) {
    ctx.open("fn is_initialized(&self) -> bool {");
    for f in &m.fields {
        let name = &f.rust_name;
        if f.label != Label::Repeated {
            if f.label == Label::Required {
                ctx.open(&format!("if self.{}.is_none() {{", name));
                ctx.p("return false;");
                ctx.close("}");
            }
            if matches!(f.kind, GenKind::Message { .. } | GenKind::Group { .. }) {
                ctx.open(&format!("if let Some(value) = &self.{} {{", name));
                ctx.open("if !value.is_initialized() {");
                ctx.p("return false;");
                ctx.close("}");
                ctx.close("}");
            }
        } else if matches!(f.kind, GenKind::Message { .. } | GenKind::Group { .. }) {
            ctx.open(&format!("for value in &self.{} {{", name));
            ctx.open("if !value.is_initialized() {");
            ctx.p("return false;");
            ctx.close("}");
            ctx.close("}");
        }
    }
    ctx.p("true");
    ctx.close("}");
}

fn render_clear(ctx: &mut Ctx, m: &MessageDecl) {
    ctx.open("fn clear(&mut self) {");
    for f in &m.fields {
        if f.label == Label::Repeated {
            ctx.p(&format!("self.{}.clear();", f.rust_name));
        } else {
            ctx.p(&format!("self.{} = None;", f.rust_name));
        }
    }
    ctx.p("self.cached_size.set(None);");
    ctx.close("}");
}

fn slot_type(f: &FieldDecl) -> String {
    let base = base_type(f);
    match f.label {
        Label::Repeated => format!("Vec<{}>", base),
        _ if is_boxed(f) => format!("Option<Box<{}>>", base),
        _ => format!("Option<{}>", base),
    }
}

fn base_type(f: &FieldDecl) -> String {
    match &f.kind {
        GenKind::Scalar(scalar) => scalar_rust_type(*scalar).to_string(),
        GenKind::Enum { rust_path, .. }
        | GenKind::Message { rust_path, .. }
        | GenKind::Group { rust_path, .. } => rust_path.clone(),
    }
}

fn is_boxed(f: &FieldDecl) -> bool {
    matches!(
        f.kind,
        GenKind::Message { boxed: true, .. } | GenKind::Group { boxed: true, .. }
    )
}

fn expected_wire_const(f: &FieldDecl) -> &'static str {
    match &f.kind {
        GenKind::Scalar(scalar) => match scalar.wire_type() {
            crate::wire::WIRETYPE_VARINT => "wire::WIRETYPE_VARINT",
            crate::wire::WIRETYPE_FIXED64 => "wire::WIRETYPE_FIXED64",
            crate::wire::WIRETYPE_FIXED32 => "wire::WIRETYPE_FIXED32",
            _ => "wire::WIRETYPE_LENGTH_DELIMITED",
        },
        GenKind::Enum { .. } => "wire::WIRETYPE_VARINT",
        GenKind::Message { .. } => "wire::WIRETYPE_LENGTH_DELIMITED",
        GenKind::Group { .. } => "wire::WIRETYPE_START_GROUP",
    }
}

fn scalar_name(scalar: ScalarType) -> &'static str {
    match scalar {
        ScalarType::Int32 => "int32",
        ScalarType::Int64 => "int64",
        ScalarType::UInt32 => "uint32",
        ScalarType::UInt64 => "uint64",
        ScalarType::SInt32 => "sint32",
        ScalarType::SInt64 => "sint64",
        ScalarType::Fixed32 => "fixed32",
        ScalarType::Fixed64 => "fixed64",
        ScalarType::SFixed32 => "sfixed32",
        ScalarType::SFixed64 => "sfixed64",
        ScalarType::Bool => "bool",
        ScalarType::Double => "double",
        ScalarType::Float => "float",
        ScalarType::String => "string",
        ScalarType::Bytes => "bytes",
    }
}

fn scalar_rust_type(scalar: ScalarType) -> &'static str {
    match scalar {
        ScalarType::Int32 | ScalarType::SInt32 | ScalarType::SFixed32 => "i32",
        ScalarType::Int64 | ScalarType::SInt64 | ScalarType::SFixed64 => "i64",
        ScalarType::UInt32 | ScalarType::Fixed32 => "u32",
        ScalarType::UInt64 | ScalarType::Fixed64 => "u64",
        ScalarType::Bool => "bool",
        ScalarType::Double => "f64",
        ScalarType::Float => "f32",
        ScalarType::String => "String",
        ScalarType::Bytes => "Vec<u8>",
    }
}

fn scalar_is_copy(scalar: ScalarType) -> bool {
    !matches!(scalar, ScalarType::String | ScalarType::Bytes)
}

/// Size function in `wire` plus whether it takes the value. Fixed-width
/// types size by count alone.
fn scalar_size_fn(scalar: ScalarType) -> (&'static str, bool) {
    match scalar {
        ScalarType::Int32 => ("int32_size", true),
        ScalarType::Int64 => ("int64_size", true),
        ScalarType::UInt32 => ("uint32_size", true),
        ScalarType::UInt64 => ("uint64_size", true),
        ScalarType::SInt32 => ("sint32_size", true),
        ScalarType::SInt64 => ("sint64_size", true),
        ScalarType::Bool => ("bool_size", true),
        ScalarType::String => ("string_size", true),
        ScalarType::Bytes => ("bytes_size", true),
        ScalarType::Fixed32 | ScalarType::SFixed32 => ("fixed32_size", false),
        ScalarType::Fixed64 | ScalarType::SFixed64 => ("fixed64_size", false),
        ScalarType::Float => ("float_size", false),
        ScalarType::Double => ("double_size", false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::generate;
    use crate::descriptor::UnitSet;
    use crate::parser::parse;

    const SAMPLE: &str = r#"
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
  repeated string tags = 4;
  optional fixed32 crc = 5;
}
"#;

    fn rendered(source: &str) -> String {
        let unit = parse(source, "tracker.proto").expect("parse");
        let mut set = UnitSet::new();
        let id = set.insert_anonymous(unit);
        set.resolve_unit(id);
        render(&generate(&set, id).expect("generate"))
    }

    #[test]
    fn emits_structs_enums_and_impls() {
        let out = rendered(SAMPLE);
        assert!(out.contains("pub struct Point {"));
        assert!(out.contains("pub struct Track {"));
        assert!(out.contains("pub struct Track_Sample {"));
        assert!(out.contains("pub enum Phase {"));
        assert!(out.contains("impl Message for Track {"));
        assert!(out.contains("cached_size: Cell<Option<u32>>,"));
    }

    #[test]
    fn known_fields_check_their_wire_type() {
        let out = rendered(SAMPLE);
        assert!(out.contains("wire::expect_wire_type(1, wire::WIRETYPE_VARINT, wire_type)?;"));
        assert!(out.contains("wire::expect_wire_type(3, wire::WIRETYPE_START_GROUP, wire_type)?;"));
        assert!(out.contains("wire::expect_wire_type(5, wire::WIRETYPE_FIXED32, wire_type)?;"));
    }

    #[test]
    fn unknown_fields_are_skipped_and_end_group_terminates() {
        let out = rendered(SAMPLE);
        assert!(out.contains("if !input.skip_field(wire_type)? {"));
    }

    #[test]
    fn unknown_enum_numbers_are_soft_dropped() {
        let out = rendered(SAMPLE);
        assert!(out.contains("match Phase::from_number(input.read_enum()?) {"));
        assert!(out.contains("None => input.note_unrecognized_enum(),"));
    }

    #[test]
    fn duplicate_enum_numbers_decode_to_the_first_symbol() {
        let out = rendered(SAMPLE);
        assert!(out.contains("1 => Some(Phase::ACTIVE),"));
        assert!(!out.contains("Some(Phase::LEGACY_ACTIVE)"));
        // But the symbol still exists and encodes its shared number.
        assert!(out.contains("Phase::LEGACY_ACTIVE => 1,"));
    }

    #[test]
    fn mutating_accessors_invalidate_the_size_cache() {
        let out = rendered(SAMPLE);
        assert!(out.contains("pub fn set_crc(&mut self, value: u32) {"));
        assert!(out.contains("pub fn origin_mut(&mut self) -> &mut Point {"));
        let invalidations = out.matches("self.cached_size.set(None);").count();
        assert!(invalidations > 10, "got {}", invalidations);
    }

    #[test]
    fn fixed_width_repeated_sizes_by_count() {
        let out = rendered("message M { repeated fixed32 ids = 1; }");
        assert!(out.contains("size += self.ids.len() * wire::fixed32_size(1);"));
    }

    #[test]
    fn end_group_tags_terminate_before_field_dispatch() {
        // A group body may reuse the group's own field number; the end-group
        // tag must never reach that field's match arm.
        let out = rendered("message M { optional group G = 1 { optional int32 a = 1; } }");
        let guard = "if wire_type == wire::WIRETYPE_END_GROUP {";
        let merge = out.find("fn merge_unframed").expect("decoder");
        let dispatch = out[merge..].find("match tag >> 3 {").expect("dispatch") + merge;
        let guarded = out[merge..dispatch].contains(guard);
        assert!(guarded, "end-group guard must precede tag dispatch");
    }

    #[test]
    fn recursive_singular_fields_are_boxed() {
        let out = rendered("message Node { optional Node next = 1; optional int32 value = 2; }");
        assert!(out.contains("next: Option<Box<Node>>,"));
        assert!(out.contains("pub fn next(&self) -> Option<&Node> {"));
        assert!(out.contains("self.next.as_deref()"));
        assert!(out.contains("self.next.get_or_insert_with(Box::default)"));
        assert!(out.contains("self.next = Some(Box::new(value));"));
        assert!(out.contains("message::write_message(output, 1, value.as_ref())?;"));
        assert!(out.contains("size += message::message_size(1, value.as_ref());"));
        assert!(out
            .contains("message::read_message(input, self.next.get_or_insert_with(Box::default).as_mut())?;"));
    }

    #[test]
    fn repeated_recursive_fields_stay_unboxed() {
        let out = rendered("message Tree { repeated Tree children = 1; }");
        assert!(out.contains("children: Vec<Tree>,"));
        assert!(!out.contains("Box<Tree>"));
    }

    #[test]
    fn rendering_is_deterministic() {
        assert_eq!(rendered(SAMPLE), rendered(SAMPLE));
    }
}
