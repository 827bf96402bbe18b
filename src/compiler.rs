//! Compile proto files to generated Rust modules.
//!
//! The pipeline is parse, load imports, resolve names, validate, plan,
//! render, write. Problems from every stage are collected into one
//! `CompileError` so a single run reports everything it can; nothing is
//! written to the output directory unless the whole compile succeeds.

use crate::codegen;
use crate::descriptor::UnitSet;
use crate::parser;
use crate::render;
use crate::validate;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
#[error("{}", .errors.join("\n"))]
pub struct CompileError {
    pub errors: Vec<String>,
}

pub struct Compiler {
    out_dir: PathBuf,
    include_paths: Vec<PathBuf>,
}

impl Compiler {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Compiler {
            out_dir: out_dir.into(),
            include_paths: Vec::new(),
        }
    }

    /// Add a directory searched for imports after the importing file's own
    /// directory.
    pub fn include_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.include_paths.push(path.into());
        self
    }

    /// Compile `file` and everything it imports. Each loaded proto file
    /// becomes one `<module>.rs` in the output directory; the path of the
    /// root file's module is returned.
    pub fn compile(&self, file: &Path) -> Result<PathBuf, CompileError> {
        let mut set = UnitSet::new();
        let mut errors = Vec::new();

        let root = self.load(file, &mut set, &mut errors);
        if let Some(root) = root {
            set.resolve_unit(root);
            errors.extend(validate::validate(&set, root));
        }
        let root = match (root, errors.is_empty()) {
            (Some(root), true) => root,
            _ => return Err(CompileError { errors }),
        };

        // Render every unit before touching the filesystem, so a late
        // failure leaves no partial output behind.
        let mut outputs = Vec::with_capacity(set.units.len());
        for id in 0..set.units.len() {
            match codegen::generate(&set, id) {
                Ok(plan) => {
                    let path = self.out_dir.join(format!("{}.rs", plan.module_name));
                    outputs.push((id, path, render::render(&plan)));
                }
                Err(e) => errors.push(format!("{}: {}", set.units[id].file_name, e)),
            }
        }
        if !errors.is_empty() {
            return Err(CompileError { errors });
        }

        if let Err(e) = fs::create_dir_all(&self.out_dir) {
            return Err(CompileError {
                errors: vec![format!("{}: {}", self.out_dir.display(), e)],
            });
        }
        let mut root_path = None;
        for (id, path, text) in outputs {
            tracing::info!("writing {}", path.display());
            if let Err(e) = fs::write(&path, text) {
                return Err(CompileError {
                    errors: vec![format!("{}: {}", path.display(), e)],
                });
            }
            if id == root {
                root_path = Some(path);
            }
        }
        root_path.ok_or_else(|| CompileError {
            errors: vec!["no output produced for the root file".to_string()],
        })
    }

    fn load(&self, path: &Path, set: &mut UnitSet, errors: &mut Vec<String>) -> Option<usize> {
        let canonical = match path.canonicalize() {
            Ok(p) => p,
            Err(e) => {
                errors.push(format!("{}: {}", path.display(), e));
                return None;
            }
        };
        if let Some(id) = set.id_for_path(&canonical) {
            return Some(id);
        }
        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                errors.push(format!("{}: {}", path.display(), e));
                return None;
            }
        };
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        tracing::debug!("loading {}", canonical.display());
        let unit = match parser::parse(&source, &file_name) {
            Ok(unit) => unit,
            Err(e) => {
                errors.push(format!("{}: {}", file_name, e));
                return None;
            }
        };
        let id = set.insert(canonical.clone(), unit);

        let import_paths = set.units[id].import_paths.clone();
        for import in import_paths {
            let resolved = match self.find_import(path.parent(), &import) {
                Some(p) => p,
                None => {
                    errors.push(format!("{}: import '{}' not found", file_name, import));
                    continue;
                }
            };
            if resolved.canonicalize().ok().as_deref() == Some(canonical.as_path()) {
                errors.push(format!("{}: file imports itself", file_name));
                continue;
            }
            if let Some(import_id) = self.load(&resolved, set, errors) {
                set.units[id].imports.push(import_id);
            }
        }
        Some(id)
    }

    /// Imports resolve relative to the importing file first, then against
    /// each include path in order.
    fn find_import(&self, importing_dir: Option<&Path>, import: &str) -> Option<PathBuf> {
        if let Some(dir) = importing_dir {
            let candidate = dir.join(import);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        for dir in &self.include_paths {
            let candidate = dir.join(import);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }
}

/// Compile a single in-memory source to generated Rust, without imports or
/// filesystem access.
pub fn compile_str(source: &str, file_name: &str) -> Result<String, CompileError> {
    let unit = parser::parse(source, file_name).map_err(|e| CompileError {
        errors: vec![format!("{}: {}", file_name, e)],
    })?;
    let mut set = UnitSet::new();
    let id = set.insert_anonymous(unit);
    set.resolve_unit(id);
    let errors = validate::validate(&set, id);
    if !errors.is_empty() {
        return Err(CompileError { errors });
    }
    let plan = codegen::generate(&set, id).map_err(|e| CompileError {
        errors: vec![format!("{}: {}", file_name, e)],
    })?;
    Ok(render::render(&plan))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_str_renders_a_module() {
        let out = compile_str(
            "message Ping { required uint32 seq = 1; }",
            "ping.proto",
        )
        .expect("compile");
        assert!(out.contains("pub struct Ping {"));
        assert!(out.contains("impl Message for Ping {"));
    }

    #[test]
    fn compile_str_reports_every_error() {
        let err = compile_str(
            "message Bad { required int32 a = 1; optional int32 b = 1; optional Gone c = 2; }",
            "bad.proto",
        )
        .expect_err("must fail");
        assert_eq!(err.errors.len(), 2, "{:?}", err.errors);
    }
}
