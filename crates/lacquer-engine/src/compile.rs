//! Compilation driver: import expansion, value evaluation, rule flattening
//! and output formatting.

use std::fs;
use std::path::{Path, PathBuf};

use lacquer_value::Value;

use crate::ast::{Declaration, Node, Pos, Rule, Term, TermGroup, ValueExpr};
use crate::error::EngineError;
use crate::hooks::ImportEntry;
use crate::options::{EngineOptions, OutputStyle};
use crate::parser;

/// Result of a successful compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutput {
    pub css: String,
    /// Files pulled in by `@import`, deduplicated, in first-load order.
    pub included_files: Vec<PathBuf>,
}

/// Compiles stylesheet text. Imports resolve through the importer hook when
/// one is installed, otherwise against the current directory and
/// `include_paths`.
pub fn compile(source: &str, options: &EngineOptions) -> Result<CompileOutput, EngineError> {
    let label = options.input_label.clone();
    log::debug!("compiling `{}` ({} bytes)", label, source.len());
    let nodes = parser::parse(source, &label)?;
    let mut compiler = Compiler::new(options);
    compiler.process(nodes, &label, None)?;
    Ok(compiler.finish())
}

/// Compiles a stylesheet file. The entry file is not listed in
/// `included_files`; only imports are.
pub fn compile_file(path: &Path, options: &EngineOptions) -> Result<CompileOutput, EngineError> {
    let label = path.display().to_string();
    log::debug!("compiling file `{}`", label);
    let source = fs::read_to_string(path).map_err(|e| {
        EngineError::new(format!("cannot read `{}`: {}", label, e), label.clone(), 1, 1)
    })?;
    let nodes = parser::parse(&source, &label)?;
    let mut compiler = Compiler::new(options);
    compiler.process(nodes, &label, path.parent())?;
    Ok(compiler.finish())
}

const MAX_IMPORT_DEPTH: usize = 32;

/// A rule flattened out of its nesting context, ready to format.
struct FlatRule {
    selector: String,
    depth: usize,
    decls: Vec<(String, String)>,
    line: usize,
    file: String,
}

struct Compiler<'o> {
    options: &'o EngineOptions,
    included: Vec<PathBuf>,
    import_depth: usize,
    flat: Vec<FlatRule>,
}

impl<'o> Compiler<'o> {
    fn new(options: &'o EngineOptions) -> Compiler<'o> {
        Compiler { options, included: Vec::new(), import_depth: 0, flat: Vec::new() }
    }

    fn process(
        &mut self,
        nodes: Vec<Node>,
        file: &str,
        base: Option<&Path>,
    ) -> Result<(), EngineError> {
        for node in nodes {
            match node {
                Node::Import(imp) => {
                    for url in &imp.urls {
                        self.import(url, imp.pos, file, base)?;
                    }
                }
                Node::Rule(rule) => self.emit_rule(&rule, None, 0, file)?,
                Node::Declaration(d) => {
                    return Err(EngineError::new(
                        "declarations may only appear inside a rule",
                        file,
                        d.pos.line,
                        d.pos.column,
                    ))
                }
            }
        }
        Ok(())
    }

    fn import(
        &mut self,
        url: &str,
        pos: Pos,
        file: &str,
        base: Option<&Path>,
    ) -> Result<(), EngineError> {
        if self.import_depth >= MAX_IMPORT_DEPTH {
            return Err(EngineError::new(
                format!("import nesting exceeds {} levels (circular import?)", MAX_IMPORT_DEPTH),
                file,
                pos.line,
                pos.column,
            ));
        }
        self.import_depth += 1;
        let outcome = self.import_inner(url, pos, file, base);
        self.import_depth -= 1;
        outcome
    }

    fn import_inner(
        &mut self,
        url: &str,
        pos: Pos,
        file: &str,
        base: Option<&Path>,
    ) -> Result<(), EngineError> {
        let entries = match &self.options.importer {
            Some(hook) => {
                log::debug!("resolving `@import \"{}\"` from `{}` through the hook", url, file);
                hook.resolve(url, file)
                    .map_err(|e| EngineError::new(e.0, file, pos.line, pos.column))?
            }
            None => vec![ImportEntry::default()],
        };
        for entry in entries {
            match (entry.file, entry.contents) {
                (path, Some(text)) => {
                    let label = path
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| url.to_string());
                    let child_base = path.as_ref().and_then(|p| p.parent().map(Path::to_path_buf));
                    let nodes = parser::parse(&text, &label)?;
                    match &child_base {
                        Some(dir) => self.process(nodes, &label, Some(dir))?,
                        None => self.process(nodes, &label, base)?,
                    }
                }
                (Some(path), None) => self.load_file(&path, pos, file, base)?,
                (None, None) => {
                    let found = self.find_file(Path::new(url), pos, file, base)?;
                    self.load_file(&found, pos, file, base)?;
                }
            }
        }
        Ok(())
    }

    fn load_file(
        &mut self,
        spec: &Path,
        pos: Pos,
        file: &str,
        base: Option<&Path>,
    ) -> Result<(), EngineError> {
        let path = if spec.exists() {
            spec.to_path_buf()
        } else {
            self.find_file(spec, pos, file, base)?
        };
        let label = path.display().to_string();
        let source = fs::read_to_string(&path).map_err(|e| {
            EngineError::new(
                format!("cannot read `{}`: {}", label, e),
                file,
                pos.line,
                pos.column,
            )
        })?;
        if !self.included.contains(&path) {
            self.included.push(path.clone());
        }
        log::debug!("imported `{}`", label);
        let nodes = parser::parse(&source, &label)?;
        self.process(nodes, &label, path.parent())
    }

    /// Resolves an import spec against the importing file's directory and
    /// the include paths, trying the `.lac` extension when none is given.
    fn find_file(
        &self,
        spec: &Path,
        pos: Pos,
        file: &str,
        base: Option<&Path>,
    ) -> Result<PathBuf, EngineError> {
        let mut names = vec![spec.to_path_buf()];
        if spec.extension().is_none() {
            let mut with_ext = spec.as_os_str().to_os_string();
            with_ext.push(".lac");
            names.push(PathBuf::from(with_ext));
        }
        let mut dirs = vec![base.map_or_else(|| PathBuf::from("."), Path::to_path_buf)];
        dirs.extend(self.options.include_paths.iter().cloned());
        for name in &names {
            if name.is_absolute() {
                if name.exists() {
                    return Ok(name.clone());
                }
                continue;
            }
            for dir in &dirs {
                let candidate = dir.join(name);
                if candidate.exists() {
                    return Ok(candidate);
                }
            }
        }
        Err(EngineError::new(
            format!("cannot find import `{}`", spec.display()),
            file,
            pos.line,
            pos.column,
        ))
    }

    fn emit_rule(
        &mut self,
        rule: &Rule,
        parent: Option<&str>,
        depth: usize,
        file: &str,
    ) -> Result<(), EngineError> {
        let selector = match parent {
            Some(parent) => combine_selectors(parent, &rule.selector),
            None => rule.selector.clone(),
        };
        let mut decls = Vec::new();
        let mut children = Vec::new();
        for node in &rule.body {
            match node {
                Node::Declaration(d) => {
                    if let Some(rendered) = self.eval_declaration(d, file)? {
                        decls.push(rendered);
                    }
                }
                Node::Rule(r) => children.push(r),
                Node::Import(i) => {
                    return Err(EngineError::new(
                        "`@import` is only allowed at the top level",
                        file,
                        i.pos.line,
                        i.pos.column,
                    ))
                }
            }
        }
        let emits = !decls.is_empty();
        if emits {
            self.flat.push(FlatRule {
                selector: selector.clone(),
                depth,
                decls,
                line: rule.pos.line,
                file: file.to_string(),
            });
        }
        for child in children {
            self.emit_rule(child, Some(&selector), depth + usize::from(emits), file)?;
        }
        Ok(())
    }

    fn eval_declaration(
        &mut self,
        decl: &Declaration,
        file: &str,
    ) -> Result<Option<(String, String)>, EngineError> {
        let text = self.eval_expr(&decl.value, decl.pos, file)?;
        if text.is_empty() {
            // null-valued declarations drop out of the output entirely
            return Ok(None);
        }
        Ok(Some((decl.property.clone(), text)))
    }

    fn eval_expr(&mut self, expr: &ValueExpr, pos: Pos, file: &str) -> Result<String, EngineError> {
        let mut groups = Vec::new();
        for group in &expr.groups {
            let mut parts = Vec::new();
            for term in group {
                let text = self.eval_term(term, pos, file)?;
                if !text.is_empty() {
                    parts.push(text);
                }
            }
            if !parts.is_empty() {
                groups.push(parts.join(" "));
            }
        }
        Ok(groups.join(", "))
    }

    fn eval_term(&mut self, term: &Term, pos: Pos, file: &str) -> Result<String, EngineError> {
        match term {
            Term::Literal(value) => self.render_value(value, pos, file),
            Term::Raw(text) => Ok(text.clone()),
            Term::Call { name, args, pos } => {
                if self.is_registered(name) {
                    let value = self.call_host(name, args, *pos, file)?;
                    self.render_value(&value, *pos, file)
                } else {
                    // not ours: render the call back out as plain CSS
                    let mut rendered = Vec::new();
                    for group in args {
                        let mut parts = Vec::new();
                        for term in group {
                            let text = self.eval_term(term, *pos, file)?;
                            if !text.is_empty() {
                                parts.push(text);
                            }
                        }
                        rendered.push(parts.join(" "));
                    }
                    Ok(format!("{}({})", name, rendered.join(", ")))
                }
            }
        }
    }

    fn is_registered(&self, name: &str) -> bool {
        self.options.functions.as_ref().map_or(false, |host| host.recognizes(name))
    }

    fn call_host(
        &mut self,
        name: &str,
        args: &[TermGroup],
        pos: Pos,
        file: &str,
    ) -> Result<Value, EngineError> {
        let mut values = Vec::with_capacity(args.len());
        for group in args {
            values.push(self.group_value(group, pos, file)?);
        }
        let host = match &self.options.functions {
            Some(host) => host,
            None => {
                return Err(EngineError::new(
                    format!("no handler for function `{}`", name),
                    file,
                    pos.line,
                    pos.column,
                ))
            }
        };
        log::debug!("calling host function `{}` with {} argument(s)", name, values.len());
        host.call(name, &values)
            .map_err(|e| EngineError::new(e.0, file, pos.line, pos.column))
    }

    fn group_value(&mut self, group: &TermGroup, pos: Pos, file: &str) -> Result<Value, EngineError> {
        if group.len() == 1 {
            return self.term_value(&group[0], pos, file);
        }
        let mut items = Vec::with_capacity(group.len());
        for term in group {
            items.push(self.term_value(term, pos, file)?);
        }
        Ok(Value::space_list(items))
    }

    fn term_value(&mut self, term: &Term, pos: Pos, file: &str) -> Result<Value, EngineError> {
        match term {
            Term::Literal(value) => Ok(value.clone()),
            Term::Raw(text) => Ok(Value::ident(text.clone())),
            Term::Call { name, args, pos } => {
                if self.is_registered(name) {
                    self.call_host(name, args, *pos, file)
                } else {
                    let text = self.eval_term(term, *pos, file)?;
                    Ok(Value::ident(text))
                }
            }
        }
    }

    fn render_value(&self, value: &Value, pos: Pos, file: &str) -> Result<String, EngineError> {
        value
            .to_css(self.options.precision)
            .map_err(|e| EngineError::new(e.to_string(), file, pos.line, pos.column))
    }

    fn finish(self) -> CompileOutput {
        let css = format_rules(&self.flat, self.options);
        log::debug!(
            "compile finished: {} rule(s), {} imported file(s)",
            self.flat.len(),
            self.included.len()
        );
        CompileOutput { css, included_files: self.included }
    }
}

/// Joins a nested selector with its parent, distributing over commas:
/// parent `a, b` + child `c` gives `a c, b c`.
fn combine_selectors(parent: &str, child: &str) -> String {
    let parents: Vec<&str> = parent.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    let children: Vec<&str> = child.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    let mut combined = Vec::with_capacity(parents.len() * children.len());
    for p in &parents {
        for c in &children {
            combined.push(format!("{} {}", p, c));
        }
    }
    combined.join(", ")
}

fn format_rules(rules: &[FlatRule], options: &EngineOptions) -> String {
    if rules.is_empty() {
        return String::new();
    }
    let mut blocks = Vec::with_capacity(rules.len());
    match options.style {
        OutputStyle::Nested => {
            for rule in rules {
                let indent = "  ".repeat(rule.depth);
                let mut block = String::new();
                if options.source_comments {
                    block.push_str(&format!("{}/* line {}, {} */\n", indent, rule.line, rule.file));
                }
                block.push_str(&format!("{}{} {{", indent, rule.selector));
                for (i, (property, value)) in rule.decls.iter().enumerate() {
                    block.push_str(&format!("\n{}  {}: {};", indent, property, value));
                    if i + 1 == rule.decls.len() {
                        block.push_str(" }");
                    }
                }
                blocks.push(block);
            }
            blocks.join("\n\n") + "\n"
        }
        OutputStyle::Expanded => {
            for rule in rules {
                let mut block = String::new();
                if options.source_comments {
                    block.push_str(&format!("/* line {}, {} */\n", rule.line, rule.file));
                }
                block.push_str(&format!("{} {{\n", rule.selector));
                for (property, value) in &rule.decls {
                    block.push_str(&format!("  {}: {};\n", property, value));
                }
                block.push('}');
                blocks.push(block);
            }
            blocks.join("\n\n") + "\n"
        }
        OutputStyle::Compact => {
            for rule in rules {
                if options.source_comments {
                    blocks.push(format!("/* line {}, {} */", rule.line, rule.file));
                }
                let decls: Vec<String> =
                    rule.decls.iter().map(|(p, v)| format!("{}: {};", p, v)).collect();
                blocks.push(format!("{} {{ {} }}", rule.selector, decls.join(" ")));
            }
            blocks.join("\n") + "\n"
        }
        OutputStyle::Compressed => {
            let mut out = String::new();
            for rule in rules {
                let selector = rule.selector.replace(", ", ",");
                let decls: Vec<String> =
                    rule.decls.iter().map(|(p, v)| format!("{}:{}", p, v)).collect();
                out.push_str(&format!("{}{{{}}}", selector, decls.join(";")));
            }
            out.push('\n');
            out
        }
    }
}
