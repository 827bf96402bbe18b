//! Parse proto IDL source into the descriptor model using PEST.

use crate::descriptor::*;
use crate::wire::MAX_FIELD_NUMBER;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct ProtoParser;

/// Parse one proto file into a `ProtoUnit`. Imports are recorded as raw
/// paths; the compiler resolves and loads them.
pub fn parse(source: &str, file_name: &str) -> Result<ProtoUnit, String> {
    let pairs = ProtoParser::parse(Rule::proto, source)
        .map_err(|e| format!("Parse error: {}", e))?;
    let root = pairs.into_iter().next().ok_or("Empty parse")?;

    let mut unit = ProtoUnit {
        file_name: file_name.to_string(),
        ..Default::default()
    };

    for item in root.into_inner() {
        match item.as_rule() {
            // syntax declarations are accepted and ignored; the dialect is
            // proto2-shaped either way.
            Rule::syntax_stmt => {}
            Rule::package_stmt => {
                let name = first_of(item, Rule::dotted_ident)?;
                unit.package = Some(name);
            }
            Rule::import_stmt => {
                unit.import_paths.push(first_string(item)?);
            }
            Rule::option_stmt => {
                let option = build_option(item)?;
                unit.options.push(option);
            }
            Rule::message_def => {
                let index = build_message(item, None, &mut unit)?;
                unit.root_messages.push(index);
            }
            Rule::enum_def => {
                let index = build_enum(item, None, &mut unit)?;
                unit.root_enums.push(index);
            }
            _ => {}
        }
    }
    Ok(unit)
}

fn first_of(pair: pest::iterators::Pair<Rule>, rule: Rule) -> Result<String, String> {
    pair.into_inner()
        .find(|p| p.as_rule() == rule)
        .map(|p| p.as_str().to_string())
        .ok_or_else(|| format!("expected {:?}", rule))
}

fn first_string(pair: pest::iterators::Pair<Rule>) -> Result<String, String> {
    let s = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::string)
        .ok_or("expected string literal")?;
    let inner = s
        .into_inner()
        .find(|p| p.as_rule() == Rule::string_inner)
        .ok_or("empty string literal")?;
    Ok(inner.as_str().to_string())
}

fn constant_text(pair: pest::iterators::Pair<Rule>) -> String {
    // For string constants strip the quotes; everything else is kept verbatim.
    let inner = pair.clone().into_inner().next();
    match inner {
        Some(p) if p.as_rule() == Rule::string => p
            .into_inner()
            .next()
            .map(|i| i.as_str().to_string())
            .unwrap_or_default(),
        Some(p) => p.as_str().to_string(),
        None => pair.as_str().to_string(),
    }
}

fn build_option(pair: pest::iterators::Pair<Rule>) -> Result<(String, String), String> {
    let mut it = pair.into_inner();
    let name = it.next().ok_or("option: missing name")?.as_str().to_string();
    let value = it.next().ok_or("option: missing value")?;
    Ok((name, constant_text(value)))
}

fn parse_tag(text: &str) -> Result<u32, String> {
    let n: i64 = text
        .parse()
        .map_err(|_| format!("invalid field tag: {}", text))?;
    if !(0..=u32::MAX as i64).contains(&n) {
        return Err(format!("field tag out of range: {}", n));
    }
    Ok(n as u32)
}

fn build_message(
    pair: pest::iterators::Pair<Rule>,
    parent: Option<usize>,
    unit: &mut ProtoUnit,
) -> Result<usize, String> {
    let mut it = pair.into_inner();
    let name = it.next().ok_or("message: missing name")?.as_str().to_string();
    let body = it.next().ok_or("message: missing body")?;

    let index = push_message(unit, name, parent);
    build_message_body(body, index, unit)?;
    Ok(index)
}

fn push_message(unit: &mut ProtoUnit, name: String, parent: Option<usize>) -> usize {
    let index = unit.messages.len();
    unit.messages.push(MessageType {
        name,
        parent,
        fields: Vec::new(),
        nested_messages: Vec::new(),
        nested_enums: Vec::new(),
        extension_ranges: Vec::new(),
        options: Vec::new(),
    });
    index
}

fn build_message_body(
    body: pest::iterators::Pair<Rule>,
    index: usize,
    unit: &mut ProtoUnit,
) -> Result<(), String> {
    for item in body.into_inner() {
        match item.as_rule() {
            Rule::message_def => {
                let child = build_message(item, Some(index), unit)?;
                unit.messages[index].nested_messages.push(child);
            }
            Rule::enum_def => {
                let child = build_enum(item, Some(index), unit)?;
                unit.messages[index].nested_enums.push(child);
            }
            Rule::option_stmt => {
                let option = build_option(item)?;
                unit.messages[index].options.push(option);
            }
            Rule::extensions_stmt => {
                let range = build_extensions(item)?;
                unit.messages[index].extension_ranges.push(range);
            }
            Rule::group_field => {
                let field = build_group_field(item, index, unit)?;
                unit.messages[index].fields.push(field);
            }
            Rule::field => {
                let field = build_field(item)?;
                unit.messages[index].fields.push(field);
            }
            _ => {}
        }
    }
    Ok(())
}

fn build_label(pair: pest::iterators::Pair<Rule>) -> Label {
    match pair.as_str() {
        "required" => Label::Required,
        "repeated" => Label::Repeated,
        _ => Label::Optional,
    }
}

fn build_field(pair: pest::iterators::Pair<Rule>) -> Result<Field, String> {
    let mut it = pair.into_inner();
    let label = build_label(it.next().ok_or("field: missing label")?);
    let type_name = it.next().ok_or("field: missing type")?.as_str().to_string();
    let name = it.next().ok_or("field: missing name")?.as_str().to_string();
    let tag = parse_tag(it.next().ok_or("field: missing tag")?.as_str())?;

    let mut options = Vec::new();
    if let Some(opts) = it.next() {
        for opt in opts.into_inner() {
            if opt.as_rule() == Rule::field_opt {
                options.push(build_option(opt)?);
            }
        }
    }

    let field_type = match ScalarType::from_name(&type_name) {
        Some(scalar) => FieldType::Scalar(scalar),
        None => FieldType::Named {
            name: type_name,
            resolved: None,
        },
    };
    Ok(Field {
        name,
        tag,
        label,
        field_type,
        options,
    })
}

fn build_group_field(
    pair: pest::iterators::Pair<Rule>,
    parent: usize,
    unit: &mut ProtoUnit,
) -> Result<Field, String> {
    let mut it = pair.into_inner();
    let label = build_label(it.next().ok_or("group: missing label")?);
    let name = it.next().ok_or("group: missing name")?.as_str().to_string();
    let tag = parse_tag(it.next().ok_or("group: missing tag")?.as_str())?;
    let body = it.next().ok_or("group: missing body")?;

    // The group body is a message-shaped type named after the group.
    let body_index = push_message(unit, name.clone(), Some(parent));
    build_message_body(body, body_index, unit)?;

    Ok(Field {
        name,
        tag,
        label,
        field_type: FieldType::Group(body_index),
        options: Vec::new(),
    })
}

fn build_extensions(pair: pest::iterators::Pair<Rule>) -> Result<ExtensionRange, String> {
    let mut it = pair.into_inner();
    let start = parse_tag(it.next().ok_or("extensions: missing start")?.as_str())?;
    let limit = it.next().ok_or("extensions: missing end")?;
    let end = if limit.as_str().trim() == "max" {
        MAX_FIELD_NUMBER
    } else {
        parse_tag(limit.as_str().trim())?
    };
    Ok(ExtensionRange { start, end })
}

fn build_enum(
    pair: pest::iterators::Pair<Rule>,
    parent: Option<usize>,
    unit: &mut ProtoUnit,
) -> Result<usize, String> {
    let mut it = pair.into_inner();
    let name = it.next().ok_or("enum: missing name")?.as_str().to_string();

    let mut values = Vec::new();
    for item in it {
        if item.as_rule() == Rule::enum_value {
            let mut parts = item.into_inner();
            let value_name = parts
                .next()
                .ok_or("enum value: missing name")?
                .as_str()
                .to_string();
            let number_text = parts.next().ok_or("enum value: missing number")?.as_str();
            let number: i64 = number_text
                .parse()
                .map_err(|_| format!("invalid enum number: {}", number_text))?;
            if number < i32::MIN as i64 || number > i32::MAX as i64 {
                return Err(format!("enum number out of range: {}", number));
            }
            values.push(EnumValue {
                name: value_name,
                number: number as i32,
            });
        }
    }

    let index = unit.enums.len();
    unit.enums.push(EnumType {
        name,
        parent,
        values,
    });
    Ok(index)
}
