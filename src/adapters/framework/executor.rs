//! Source Executor - Runs a Framework Module's Top-Level Statements
//!
//! The framework ships Python sources. Executing one here means parsing
//! it with tree-sitter-python and walking the module node's direct
//! children in order:
//! - `def`, `async def`, `class` and assignments bind names
//! - `import` / `from ... import` statements are resolved right away:
//!   framework-owned modules (relative or absolute) are loaded through
//!   the loader's registry, third-party packages must be installed in
//!   the environment
//!
//! Imports nested in `try:` / `if` blocks are conditional, so they are
//! recorded nowhere and never required. Source that does not parse
//! fails like any other execution error.
//!
//! Any failure while executing becomes `ProxyError::ExternalDependency`
//! carrying the original cause.

use std::collections::BTreeSet;

use tracing::{debug, instrument};
use tree_sitter::{Node, Parser};

use crate::domain::{ImportStatement, ModuleName, ModuleSource, Namespace};
use crate::error::{BoxError, ExecutionFault, ProxyError};
use crate::ports::{ImportResolver, ModuleExecutor};

/// Standard-library modules assumed present in every environment.
pub const STDLIB_MODULES: &[&str] = &[
    "__future__", "abc", "argparse", "asyncio", "base64", "bisect", "calendar",
    "collections", "concurrent", "contextlib", "copy", "csv", "dataclasses",
    "datetime", "decimal", "enum", "fractions", "functools", "glob", "hashlib",
    "heapq", "importlib", "inspect", "io", "itertools", "json", "logging", "math",
    "numbers", "operator", "os", "pathlib", "pickle", "queue", "random", "re",
    "shutil", "sqlite3", "statistics", "string", "struct", "subprocess", "sys",
    "tempfile", "textwrap", "threading", "time", "traceback", "types", "typing",
    "unittest", "urllib", "uuid", "warnings", "weakref", "zoneinfo",
];

/// Default executor for the framework's Python sources.
#[derive(Debug, Clone)]
pub struct SourceExecutor {
    /// Top-level package names importable from the environment.
    available: BTreeSet<String>,
}

impl SourceExecutor {
    /// Executor whose environment holds only the standard library.
    pub fn new() -> Self {
        Self {
            available: STDLIB_MODULES.iter().map(|m| (*m).to_string()).collect(),
        }
    }

    /// Add installed third-party packages to the environment.
    #[must_use]
    pub fn with_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available.extend(packages.into_iter().map(Into::into));
        self
    }

    pub fn is_available(&self, package: &str) -> bool {
        self.available.contains(package)
    }

    fn resolve_import(
        &self,
        source: &ModuleSource,
        import: &ImportStatement,
        imports: &mut dyn ImportResolver,
    ) -> Result<(), BoxError> {
        match import {
            ImportStatement::Module { path, .. } => {
                self.require_absolute(path, imports)?;
            }
            ImportStatement::From {
                level: 0,
                module,
                names,
                ..
            } => {
                let target = self.require_absolute(module, imports)?;
                if let Some(target) = target {
                    import_submodules(&target, names, imports)?;
                }
            }
            ImportStatement::From {
                level,
                module,
                names,
                ..
            } => {
                let target = source
                    .name
                    .resolve_relative(source.location.is_package, *level, module)
                    .ok_or_else(|| ExecutionFault::RelativeBeyondTopLevel {
                        module: source.name.to_string(),
                        level: *level,
                    })?;
                if !module.is_empty() {
                    imports.import_module(&target)?;
                }
                import_submodules(&target, names, imports)?;
            }
        }
        Ok(())
    }

    /// Require an absolute import. Returns the module name when it is
    /// framework-owned.
    fn require_absolute(
        &self,
        dotted: &str,
        imports: &mut dyn ImportResolver,
    ) -> Result<Option<ModuleName>, BoxError> {
        let name = ModuleName::parse(dotted)?;
        if imports.is_internal(&name) {
            imports.import_module(&name)?;
            return Ok(Some(name));
        }
        if self.is_available(name.top_level()) {
            return Ok(None);
        }

        let top = ModuleName::parse(name.top_level())?;
        if imports.is_internal(&top) {
            // A framework package without the requested submodule; the
            // loader reports exactly which candidates were missing.
            imports.import_module(&name)?;
            return Ok(Some(name));
        }

        Err(ExecutionFault::MissingPackage(name.top_level().to_string()).into())
    }
}

impl Default for SourceExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleExecutor for SourceExecutor {
    #[instrument(skip(self, source, imports), fields(module = %source.name))]
    fn execute(
        &self,
        source: &ModuleSource,
        imports: &mut dyn ImportResolver,
    ) -> Result<Namespace, ProxyError> {
        let mut namespace = Namespace::default();
        let statements = scan_statements(&source.text).map_err(|fault| {
            ProxyError::ExternalDependency {
                module: source.name.to_string(),
                cause: fault.into(),
            }
        })?;

        for statement in statements {
            match statement {
                Statement::Bind(names) => {
                    for name in names {
                        namespace.bind(name);
                    }
                }
                Statement::Import { import, binds } => {
                    self.resolve_import(source, &import, imports).map_err(|cause| {
                        ProxyError::ExternalDependency {
                            module: source.name.to_string(),
                            cause,
                        }
                    })?;
                    for name in binds {
                        namespace.bind(name);
                    }
                    namespace.record_import(import);
                }
            }
        }

        debug!(
            names = namespace.names().count(),
            imports = namespace.imports().len(),
            "Module executed"
        );
        Ok(namespace)
    }
}

/// `from pkg import a, b` may name submodules; import those that exist.
fn import_submodules(
    package: &ModuleName,
    names: &[String],
    imports: &mut dyn ImportResolver,
) -> Result<(), BoxError> {
    for name in names.iter().filter(|n| n.as_str() != "*") {
        if let Ok(child) = package.join(name) {
            if imports.is_internal(&child) {
                imports.import_module(&child)?;
            }
        }
    }
    Ok(())
}

// ── Statement scanning ──────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
enum Statement {
    Bind(Vec<String>),
    Import {
        import: ImportStatement,
        binds: Vec<String>,
    },
}

/// Parse `text` and collect its top-level statements in source order.
///
/// Only direct children of the module node are considered; anything
/// nested under `if` / `try` / `with` is conditional.
fn scan_statements(text: &str) -> Result<Vec<Statement>, ExecutionFault> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::language())
        .map_err(|e| ExecutionFault::Parser(e.to_string()))?;
    let tree = parser
        .parse(text, None)
        .ok_or_else(|| ExecutionFault::Parser("parse aborted".to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(ExecutionFault::InvalidSyntax {
            line: first_error_line(root),
        });
    }

    let mut statements = Vec::new();
    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        statements.extend(parse_statement(node, text));
    }
    Ok(statements)
}

fn parse_statement(node: Node<'_>, src: &str) -> Vec<Statement> {
    match node.kind() {
        "import_statement" => parse_import(node, src),
        "import_from_statement" => parse_from(node, src).into_iter().collect(),
        "function_definition" | "class_definition" => node
            .child_by_field_name("name")
            .map(|name| vec![Statement::Bind(vec![text(name, src).to_string()])])
            .unwrap_or_default(),
        "decorated_definition" => node
            .child_by_field_name("definition")
            .map(|def| parse_statement(def, src))
            .unwrap_or_default(),
        "expression_statement" => {
            let mut cursor = node.walk();
            let binds: Vec<Statement> = node
                .named_children(&mut cursor)
                .filter(|child| child.kind() == "assignment")
                .filter_map(|assignment| parse_assignment(assignment, src))
                .collect();
            binds
        }
        _ => Vec::new(),
    }
}

/// `import a, b.c as d` yields one statement per module.
fn parse_import(node: Node<'_>, src: &str) -> Vec<Statement> {
    let line = node.start_position().row + 1;
    let mut cursor = node.walk();
    let imports: Vec<Statement> = node
        .children_by_field_name("name", &mut cursor)
        .filter_map(|name| {
            let (path, alias) = split_alias(name, src);
            if path.is_empty() {
                return None;
            }
            let bound = alias
                .clone()
                .unwrap_or_else(|| path.split('.').next().unwrap_or(&path).to_string());
            Some(Statement::Import {
                import: ImportStatement::Module { path, alias, line },
                binds: vec![bound],
            })
        })
        .collect();
    imports
}

/// `from ..pkg.mod import (a, b as c)` and `from x import *`
fn parse_from(node: Node<'_>, src: &str) -> Option<Statement> {
    let target = node.child_by_field_name("module_name")?;
    let (level, module) = if target.kind() == "relative_import" {
        let mut cursor = target.walk();
        let mut level = 0;
        let mut module = String::new();
        for part in target.named_children(&mut cursor) {
            match part.kind() {
                "import_prefix" => level = text(part, src).matches('.').count(),
                "dotted_name" => module = dotted(part, src),
                _ => {}
            }
        }
        (level, module)
    } else {
        (0, dotted(target, src))
    };

    let mut names = Vec::new();
    let mut binds = Vec::new();
    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        let (imported, alias) = split_alias(name, src);
        binds.push(alias.unwrap_or_else(|| imported.clone()));
        names.push(imported);
    }
    let mut cursor = node.walk();
    if node
        .named_children(&mut cursor)
        .any(|child| child.kind() == "wildcard_import")
    {
        names.push("*".to_string());
    }

    Some(Statement::Import {
        import: ImportStatement::From {
            level,
            module,
            names,
            line: node.start_position().row + 1,
        },
        binds,
    })
}

/// `X = 1`, `X: int = 1`, `X: int`, `a, b = pair`, `a = b = 0`
fn parse_assignment(node: Node<'_>, src: &str) -> Option<Statement> {
    let mut names = Vec::new();
    let mut current = Some(node);
    while let Some(assignment) = current.filter(|n| n.kind() == "assignment") {
        if let Some(left) = assignment.child_by_field_name("left") {
            collect_targets(left, src, &mut names);
        }
        current = assignment.child_by_field_name("right");
    }
    (!names.is_empty()).then_some(Statement::Bind(names))
}

/// Names bound by an assignment target. Attribute and subscript targets
/// bind nothing new.
fn collect_targets(target: Node<'_>, src: &str, names: &mut Vec<String>) {
    match target.kind() {
        "identifier" => names.push(text(target, src).to_string()),
        "pattern_list" | "tuple_pattern" | "list_pattern" | "list_splat_pattern" => {
            let mut cursor = target.walk();
            for child in target.named_children(&mut cursor) {
                collect_targets(child, src, names);
            }
        }
        _ => {}
    }
}

/// `(name, alias)` of a `dotted_name` or `aliased_import` node.
fn split_alias(node: Node<'_>, src: &str) -> (String, Option<String>) {
    if node.kind() == "aliased_import" {
        let name = node
            .child_by_field_name("name")
            .map(|n| dotted(n, src))
            .unwrap_or_default();
        let alias = node
            .child_by_field_name("alias")
            .map(|a| text(a, src).to_string());
        (name, alias)
    } else {
        (dotted(node, src), None)
    }
}

/// Dotted name text with any interior whitespace removed.
fn dotted(node: Node<'_>, src: &str) -> String {
    text(node, src).split_whitespace().collect()
}

fn text<'s>(node: Node<'_>, src: &'s str) -> &'s str {
    src.get(node.byte_range()).unwrap_or_default()
}

/// 1-based line of the first error or missing node.
fn first_error_line(node: Node<'_>) -> usize {
    if node.is_error() || node.is_missing() {
        return node.start_position().row + 1;
    }
    let mut cursor = node.walk();
    let line = node
        .children(&mut cursor)
        .find(|child| child.has_error())
        .map(first_error_line);
    line.unwrap_or(node.start_position().row + 1)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Arc;

    use super::*;
    use crate::domain::{ModuleHandle, SourceLocation};

    /// Resolver over a fixed set of internal module names.
    #[derive(Default)]
    struct FakeResolver {
        internal: HashSet<String>,
        imported: Vec<String>,
    }

    impl FakeResolver {
        fn with(names: &[&str]) -> Self {
            Self {
                internal: names.iter().map(|n| (*n).to_string()).collect(),
                imported: Vec::new(),
            }
        }
    }

    impl ImportResolver for FakeResolver {
        fn import_module(
            &mut self,
            name: &ModuleName,
        ) -> Result<Option<Arc<ModuleHandle>>, ProxyError> {
            if !self.internal.contains(name.as_str()) {
                return Err(ProxyError::ModuleNotFound {
                    name: name.to_string(),
                    candidates: Vec::new(),
                });
            }
            self.imported.push(name.to_string());
            Ok(None)
        }

        fn is_internal(&self, name: &ModuleName) -> bool {
            self.internal.contains(name.as_str())
        }
    }

    fn source(name: &str, is_package: bool, text: &str) -> ModuleSource {
        ModuleSource {
            name: ModuleName::parse(name).unwrap(),
            location: SourceLocation {
                path: PathBuf::from(format!("/fw/src/{}.py", name.replace('.', "/"))),
                is_package,
            },
            text: text.to_string(),
        }
    }

    #[test]
    fn test_binds_top_level_definitions() {
        let text = r#"
"""Module docstring.

def not_real():
"""

import math
from typing import List, Optional as Opt

PERIOD = 14
WINDOW: int = 20
fast, slow = 12, 26

def rsi(prices, period=PERIOD):
    inner = 1
    return inner

async def stream():
    pass

class Indicator(object):
    name = "base"

if PERIOD == 14:
    pass
"#;
        let exec = SourceExecutor::new();
        let mut resolver = FakeResolver::default();
        let ns = exec
            .execute(&source("analysis.rsi", false, text), &mut resolver)
            .unwrap();

        for name in [
            "math", "List", "Opt", "PERIOD", "WINDOW", "fast", "slow", "rsi", "stream",
            "Indicator",
        ] {
            assert!(ns.contains(name), "expected `{name}` bound");
        }
        for name in ["not_real", "inner", "name", "Optional"] {
            assert!(!ns.contains(name), "`{name}` must not be bound");
        }
        assert_eq!(ns.imports().len(), 2);
    }

    #[test]
    fn test_relative_imports_load_through_resolver() {
        let text = "from .common import smooth\nfrom .. import util\nfrom . import (\n    macd,\n    ema as e,\n)\n";
        let exec = SourceExecutor::new();
        let mut resolver = FakeResolver::with(&[
            "analysis.indicators.common",
            "analysis.util",
            "analysis.indicators.macd",
        ]);
        let ns = exec
            .execute(&source("analysis.indicators.rsi", false, text), &mut resolver)
            .unwrap();

        assert_eq!(
            resolver.imported,
            vec![
                "analysis.indicators.common",
                "analysis.util",
                "analysis.indicators.macd"
            ]
        );
        assert!(ns.contains("smooth"));
        assert!(ns.contains("e"));
        assert!(ns.imports().iter().all(ImportStatement::is_relative));
    }

    #[test]
    fn test_missing_package_is_external_dependency() {
        let exec = SourceExecutor::new();
        let mut resolver = FakeResolver::default();
        let err = exec
            .execute(&source("analysis.ml", false, "import torch\n"), &mut resolver)
            .unwrap_err();
        match err {
            ProxyError::ExternalDependency { module, cause } => {
                assert_eq!(module, "analysis.ml");
                assert!(cause.to_string().contains("torch"));
            }
            other => panic!("expected ExternalDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_configured_packages_are_available() {
        let exec = SourceExecutor::new().with_packages(["numpy", "pandas"]);
        let mut resolver = FakeResolver::default();
        let ns = exec
            .execute(
                &source("analysis.frame", false, "import numpy as np\nfrom pandas import DataFrame\n"),
                &mut resolver,
            )
            .unwrap();
        assert!(ns.contains("np"));
        assert!(ns.contains("DataFrame"));
    }

    #[test]
    fn test_conditional_imports_are_not_required() {
        let text = "try:\n    import talib\nexcept ImportError:\n    talib = None\n";
        let exec = SourceExecutor::new();
        let mut resolver = FakeResolver::default();
        assert!(
            exec.execute(&source("analysis.fast", false, text), &mut resolver)
                .is_ok()
        );
    }

    #[test]
    fn test_missing_internal_submodule_is_external_dependency() {
        let exec = SourceExecutor::new();
        let mut resolver = FakeResolver::with(&["analysis"]);
        let err = exec
            .execute(
                &source("strategies.trend", false, "from analysis.gone import x\n"),
                &mut resolver,
            )
            .unwrap_err();
        assert!(matches!(err, ProxyError::ExternalDependency { .. }));
    }

    #[test]
    fn test_relative_import_beyond_top_level() {
        let exec = SourceExecutor::new();
        let mut resolver = FakeResolver::default();
        let err = exec
            .execute(&source("toplevel", false, "from . import x\n"), &mut resolver)
            .unwrap_err();
        match err {
            ProxyError::ExternalDependency { cause, .. } => {
                assert!(cause.to_string().contains("beyond the top-level package"));
            }
            other => panic!("expected ExternalDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_brackets_inside_strings_do_not_hide_statements() {
        let text = "OPEN = \"(\"\nimport requests\n\ndef run():\n    pass\n";

        let exec = SourceExecutor::new();
        let err = exec
            .execute(&source("strategies", false, text), &mut FakeResolver::default())
            .unwrap_err();
        match err {
            ProxyError::ExternalDependency { cause, .. } => {
                assert!(cause.to_string().contains("requests"));
            }
            other => panic!("expected ExternalDependency, got {other:?}"),
        }

        let exec = SourceExecutor::new().with_packages(["requests"]);
        let ns = exec
            .execute(&source("strategies", false, text), &mut FakeResolver::default())
            .unwrap();
        for name in ["OPEN", "requests", "run"] {
            assert!(ns.contains(name), "expected `{name}` bound");
        }
    }

    #[test]
    fn test_semicolon_separated_imports() {
        let text = "import os; import sys\nX = 1; Y = 2\n\ndef run():\n    return os.sep\n";
        let exec = SourceExecutor::new();
        let ns = exec
            .execute(&source("strategies", false, text), &mut FakeResolver::default())
            .unwrap();
        for name in ["os", "sys", "X", "Y", "run"] {
            assert!(ns.contains(name), "expected `{name}` bound");
        }
        assert_eq!(ns.imports().len(), 2);
    }

    #[test]
    fn test_decorators_chained_assignment_and_wildcard() {
        let text = "from math import *\n\n@staticmethod\ndef helper():\n    pass\n\na = b = 0\nobj.attr = 1\n";
        let exec = SourceExecutor::new();
        let ns = exec
            .execute(&source("analysis.misc", false, text), &mut FakeResolver::default())
            .unwrap();
        assert!(ns.contains("helper"));
        assert!(ns.contains("a"));
        assert!(ns.contains("b"));
        assert!(!ns.contains("obj"));
        assert!(matches!(
            &ns.imports()[0],
            ImportStatement::From { names, .. } if names == &["*".to_string()]
        ));
    }

    #[test]
    fn test_syntax_error_is_external_dependency() {
        let exec = SourceExecutor::new();
        let err = exec
            .execute(
                &source("analysis.broken", false, "X = 1\ndef (:\n"),
                &mut FakeResolver::default(),
            )
            .unwrap_err();
        match err {
            ProxyError::ExternalDependency { module, cause } => {
                assert_eq!(module, "analysis.broken");
                assert!(cause.to_string().contains("invalid syntax"));
            }
            other => panic!("expected ExternalDependency, got {other:?}"),
        }
    }
}
