//! # protomsg — Protocol-Buffers message compiler and wire runtime
//!
//! A compiler for a proto2-shaped IDL (messages, enums, groups, imports,
//! extension ranges) that generates plain-Rust message structs, plus the
//! wire-format runtime those structs run on: base-128 varints, zigzag,
//! tagged fields, length-delimited values, and group framing.
//!
//! ## Pipeline
//!
//! - **parser**: PEST grammar over the IDL, producing a `ProtoUnit` per file
//! - **descriptor**: arena model of messages/enums with name resolution
//!   across imports
//! - **validate**: one pass collecting every schema error before generation
//! - **codegen** / **render**: a deterministic generation plan rendered as a
//!   self-contained Rust module per proto file
//! - **wire** / **coded** / **message**: the runtime generated code uses
//!
//! ## Example
//!
//! ```
//! let generated = protomsg::compile_str(
//!     "message Ping { required uint32 seq = 1; }",
//!     "ping.proto",
//! ).unwrap();
//! assert!(generated.contains("pub struct Ping"));
//! ```
//!
//! Generated types implement [`Message`]: unframed encode/decode plus a
//! framed surface (varint length prefix) for streams, with a memoized
//! serialized size invalidated by every mutating accessor.

pub mod coded;
pub mod codegen;
pub mod compiler;
pub mod descriptor;
pub mod message;
pub mod parser;
pub mod render;
pub mod validate;
pub mod wire;

pub use coded::{CodedReader, CodedWriter};
pub use compiler::{compile_str, CompileError, Compiler};
pub use descriptor::{ProtoUnit, UnitSet};
pub use message::Message;
pub use parser::parse;
pub use wire::WireError;
