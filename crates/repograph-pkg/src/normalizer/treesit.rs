//! Tree-sitter parsing and per-language AST walkers

use super::{ClassDef, Definitions, FunctionDef, InterfaceDef, Language, MethodDef};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tree_sitter::{Node, Parser, Tree};

/// Parse a source string with the grammar selected by language and
/// extension (`.tsx` uses the TSX grammar). Returns `None` on any parser
/// setup or parse failure; the caller drops the file.
pub fn parse(source: &str, language: Language, path: &Path) -> Option<Tree> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();

    let lang: tree_sitter::Language = match language {
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        Language::TypeScript => {
            if ext == "tsx" {
                tree_sitter_typescript::LANGUAGE_TSX.into()
            } else {
                tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
            }
        }
        Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        Language::Java => tree_sitter_java::LANGUAGE.into(),
        Language::C => tree_sitter_c::LANGUAGE.into(),
        Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        Language::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
        Language::Asp => return None,
    };

    let mut parser = Parser::new();
    parser.set_language(&lang).ok()?;
    parser.parse(source, None)
}

/// Iterative pre-order walk; recursion would overflow on pathological trees.
fn walk(root: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        out.push(node);
        for i in (0..node.child_count()).rev() {
            if let Some(child) = node.child(i) {
                stack.push(child);
            }
        }
    }
    out
}

fn text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or_default()
}

fn field_text<'s>(node: Node<'_>, field: &str, source: &'s str) -> Option<&'s str> {
    node.child_by_field_name(field).map(|n| text(n, source))
}

pub fn extract(root: Node<'_>, source: &str, language: Language) -> Definitions {
    match language {
        Language::Python => extract_python(root, source),
        Language::TypeScript | Language::JavaScript => extract_ts_js(root, source),
        Language::Java => extract_java(root, source),
        Language::C => extract_c(root, source),
        Language::Cpp => extract_cpp(root, source),
        Language::CSharp => extract_csharp(root, source),
        Language::Asp => Definitions::default(),
    }
}

// ---------------------------------------------------------------------------
// Python
// ---------------------------------------------------------------------------

fn python_docstring(body: Node<'_>, source: &str) -> Option<String> {
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string_node = first.named_child(0)?;
    if string_node.kind() != "string" {
        return None;
    }
    let raw = text(string_node, source);
    let stripped = raw
        .trim_start_matches("\"\"\"")
        .trim_end_matches("\"\"\"")
        .trim_start_matches("'''")
        .trim_end_matches("'''")
        .trim_matches('"')
        .trim_matches('\'');
    Some(stripped.trim().to_string())
}

fn extract_python(root: Node<'_>, source: &str) -> Definitions {
    let mut defs = Definitions::default();

    for node in walk(root) {
        match node.kind() {
            "import_statement" => {
                // import a.b as c, d.e
                let stmt = text(node, source);
                for spec in stmt
                    .trim_start_matches("import")
                    .split(',')
                    .map(|part| part.split(" as ").next().unwrap_or("").trim())
                {
                    if !spec.is_empty() {
                        defs.imports.push(spec.to_string());
                    }
                }
            }
            "import_from_statement" => {
                if let Some(module) = node.child_by_field_name("module_name") {
                    defs.imports.push(text(module, source).to_string());
                }
            }
            "function_definition" => {
                // Skip methods; they are collected under their class below.
                let inside_class = ancestor_kinds(node).contains(&"class_definition");
                if inside_class {
                    continue;
                }
                let name = field_text(node, "name", source).unwrap_or_default();
                if name.is_empty() {
                    continue;
                }
                let parameters = field_text(node, "parameters", source)
                    .unwrap_or("()")
                    .trim_matches(|c| c == '(' || c == ')')
                    .to_string();
                let docstring = node
                    .child_by_field_name("body")
                    .and_then(|b| python_docstring(b, source));
                defs.functions.push(FunctionDef {
                    name: name.to_string(),
                    parameters,
                    docstring,
                });
            }
            "class_definition" => {
                let name = field_text(node, "name", source).unwrap_or_default();
                if name.is_empty() {
                    continue;
                }
                let mut class = ClassDef {
                    name: name.to_string(),
                    ..Default::default()
                };
                if let Some(bases) = node.child_by_field_name("superclasses") {
                    for base in text(bases, source)
                        .trim_matches(|c| c == '(' || c == ')')
                        .split(',')
                        .map(str::trim)
                    {
                        if !base.is_empty() && base != "object" {
                            class.extends.push(base.to_string());
                        }
                    }
                }
                if let Some(body) = node.child_by_field_name("body") {
                    class.docstring = python_docstring(body, source);
                    for i in 0..body.named_child_count() {
                        let Some(child) = body.named_child(i) else {
                            continue;
                        };
                        let func = match child.kind() {
                            "function_definition" => Some(child),
                            "decorated_definition" => child
                                .child_by_field_name("definition")
                                .filter(|d| d.kind() == "function_definition"),
                            _ => None,
                        };
                        if let Some(func) = func {
                            if let Some(method_name) = field_text(func, "name", source) {
                                class.methods.push(MethodDef {
                                    name: method_name.to_string(),
                                    parameters: field_text(func, "parameters", source)
                                        .unwrap_or("()")
                                        .trim_matches(|c| c == '(' || c == ')')
                                        .to_string(),
                                });
                            }
                        }
                    }
                }
                defs.classes.push(class);
            }
            "call" => {
                if let Some(function) = field_text(node, "function", source) {
                    push_call(&mut defs.calls, function);
                }
            }
            _ => {}
        }
    }

    defs
}

fn ancestor_kinds(node: Node<'_>) -> Vec<&'static str> {
    let mut kinds = Vec::new();
    let mut current = node.parent();
    while let Some(parent) = current {
        kinds.push(parent.kind());
        current = parent.parent();
    }
    kinds
}

fn push_call(calls: &mut Vec<String>, function_text: &str) {
    // `a.b.helper(...)` → `helper`; drop obvious builtins and empties.
    let name = function_text
        .rsplit('.')
        .next()
        .unwrap_or(function_text)
        .trim();
    if name.is_empty() || !name.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_') {
        return;
    }
    if !calls.iter().any(|c| c == name) {
        calls.push(name.to_string());
    }
}

// ---------------------------------------------------------------------------
// TypeScript / JavaScript
// ---------------------------------------------------------------------------

fn import_specifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"from\s+['"]([^'"]+)['"]|import\s+['"]([^'"]+)['"]"#).unwrap())
}

fn heritage_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"extends\s+([A-Za-z_$][\w$.]*)|implements\s+([A-Za-z_$][\w$.,\s]*)").unwrap()
    })
}

fn extract_ts_js(root: Node<'_>, source: &str) -> Definitions {
    let mut defs = Definitions::default();

    for node in walk(root) {
        match node.kind() {
            "import_statement" => {
                let stmt = text(node, source);
                if let Some(captures) = import_specifier_re().captures(stmt) {
                    if let Some(spec) = captures.get(1).or_else(|| captures.get(2)) {
                        defs.imports.push(spec.as_str().to_string());
                    }
                }
            }
            "function_declaration" => {
                if let Some(name) = field_text(node, "name", source) {
                    defs.functions.push(FunctionDef {
                        name: name.to_string(),
                        parameters: field_text(node, "parameters", source)
                            .unwrap_or("()")
                            .trim_matches(|c| c == '(' || c == ')')
                            .to_string(),
                        docstring: None,
                    });
                }
            }
            "arrow_function" => {
                // Arrow functions assigned to variables count as functions.
                if let Some(parent) = node.parent() {
                    if parent.kind() == "variable_declarator" {
                        if let Some(name) = field_text(parent, "name", source) {
                            defs.functions.push(FunctionDef {
                                name: name.to_string(),
                                parameters: field_text(node, "parameters", source)
                                    .or_else(|| field_text(node, "parameter", source))
                                    .unwrap_or("()")
                                    .trim_matches(|c| c == '(' || c == ')')
                                    .to_string(),
                                docstring: None,
                            });
                        }
                    }
                }
            }
            "class_declaration" => {
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let mut class = ClassDef {
                    name: name.to_string(),
                    ..Default::default()
                };
                // Heritage from the header text (up to the body brace).
                let header = text(node, source);
                let header = header.split('{').next().unwrap_or(header);
                for captures in heritage_re().captures_iter(header) {
                    if let Some(base) = captures.get(1) {
                        class.extends.push(base.as_str().to_string());
                    }
                    if let Some(interfaces) = captures.get(2) {
                        for iface in interfaces.as_str().split(',').map(str::trim) {
                            if !iface.is_empty() {
                                class.implements.push(iface.to_string());
                            }
                        }
                    }
                }
                if let Some(body) = node.child_by_field_name("body") {
                    for i in 0..body.named_child_count() {
                        let Some(child) = body.named_child(i) else {
                            continue;
                        };
                        match child.kind() {
                            "method_definition" => {
                                if let Some(method_name) = field_text(child, "name", source) {
                                    class.methods.push(MethodDef {
                                        name: method_name.to_string(),
                                        parameters: field_text(child, "parameters", source)
                                            .unwrap_or("()")
                                            .trim_matches(|c| c == '(' || c == ')')
                                            .to_string(),
                                    });
                                }
                            }
                            "public_field_definition" | "field_definition" => {
                                class.fields.push(text(child, source).to_string());
                            }
                            _ => {}
                        }
                    }
                }
                defs.classes.push(class);
            }
            "interface_declaration" => {
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let mut interface = InterfaceDef {
                    name: name.to_string(),
                    methods: Vec::new(),
                };
                if let Some(body) = node.child_by_field_name("body") {
                    for i in 0..body.named_child_count() {
                        let Some(child) = body.named_child(i) else {
                            continue;
                        };
                        if child.kind() == "method_signature" {
                            if let Some(method_name) = field_text(child, "name", source) {
                                interface.methods.push(MethodDef {
                                    name: method_name.to_string(),
                                    parameters: field_text(child, "parameters", source)
                                        .unwrap_or("()")
                                        .to_string(),
                                });
                            }
                        }
                    }
                }
                defs.interfaces.push(interface);
            }
            "variable_declaration" | "lexical_declaration" => {
                // Top-level declarations only; bodies produce too much noise.
                if node
                    .parent()
                    .is_some_and(|p| p.kind() == "program" || p.kind() == "export_statement")
                {
                    let decl = text(node, source);
                    defs.variables.push(decl.lines().next().unwrap_or(decl).to_string());
                }
            }
            "call_expression" => {
                if let Some(function) = field_text(node, "function", source) {
                    push_call(&mut defs.calls, function);
                }
            }
            _ => {}
        }
    }

    defs
}

// ---------------------------------------------------------------------------
// Java
// ---------------------------------------------------------------------------

fn extract_java(root: Node<'_>, source: &str) -> Definitions {
    let mut defs = Definitions::default();

    for node in walk(root) {
        match node.kind() {
            "import_declaration" => {
                let stmt = text(node, source);
                let spec = stmt
                    .trim_start_matches("import")
                    .trim_start_matches(" static")
                    .trim()
                    .trim_end_matches(';')
                    .trim();
                if !spec.is_empty() {
                    defs.imports.push(spec.to_string());
                }
            }
            "class_declaration" => {
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let mut class = ClassDef {
                    name: name.to_string(),
                    ..Default::default()
                };
                if let Some(superclass) = node.child_by_field_name("superclass") {
                    let base = text(superclass, source).trim_start_matches("extends").trim();
                    if !base.is_empty() {
                        class.extends.push(base.to_string());
                    }
                }
                if let Some(interfaces) = node.child_by_field_name("interfaces") {
                    for iface in text(interfaces, source)
                        .trim_start_matches("implements")
                        .split(',')
                        .map(str::trim)
                    {
                        if !iface.is_empty() {
                            class.implements.push(iface.to_string());
                        }
                    }
                }
                for i in 0..node.child_count() {
                    let Some(child) = node.child(i) else { continue };
                    if child.kind() == "modifiers" {
                        for j in 0..child.child_count() {
                            if let Some(modifier) = child.child(j) {
                                if modifier.kind().contains("annotation") {
                                    class.annotations.push(text(modifier, source).to_string());
                                }
                            }
                        }
                    }
                }
                if let Some(body) = node.child_by_field_name("body") {
                    for i in 0..body.named_child_count() {
                        let Some(child) = body.named_child(i) else {
                            continue;
                        };
                        match child.kind() {
                            "method_declaration" => {
                                if let Some(method_name) = field_text(child, "name", source) {
                                    class.methods.push(MethodDef {
                                        name: method_name.to_string(),
                                        parameters: field_text(child, "parameters", source)
                                            .unwrap_or("()")
                                            .to_string(),
                                    });
                                }
                            }
                            "field_declaration" => {
                                class.fields.push(text(child, source).to_string());
                            }
                            _ => {}
                        }
                    }
                }
                defs.classes.push(class);
            }
            "interface_declaration" => {
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let mut interface = InterfaceDef {
                    name: name.to_string(),
                    methods: Vec::new(),
                };
                if let Some(body) = node.child_by_field_name("body") {
                    for i in 0..body.named_child_count() {
                        let Some(child) = body.named_child(i) else {
                            continue;
                        };
                        if child.kind() == "method_declaration" {
                            if let Some(method_name) = field_text(child, "name", source) {
                                interface.methods.push(MethodDef {
                                    name: method_name.to_string(),
                                    parameters: field_text(child, "parameters", source)
                                        .unwrap_or("()")
                                        .to_string(),
                                });
                            }
                        }
                    }
                }
                defs.interfaces.push(interface);
            }
            "method_invocation" => {
                if let Some(name) = field_text(node, "name", source) {
                    push_call(&mut defs.calls, name);
                }
            }
            _ => {}
        }
    }

    defs
}

// ---------------------------------------------------------------------------
// C
// ---------------------------------------------------------------------------

fn include_path(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("#include")
        .trim()
        .trim_matches(|c| c == '"' || c == '<' || c == '>')
        .to_string()
}

fn c_function_name<'s>(node: Node<'_>, source: &'s str) -> Option<(&'s str, String)> {
    let declarator = node.child_by_field_name("declarator")?;
    let name_node = declarator.child_by_field_name("declarator")?;
    let name = text(name_node, source);
    let parameters = field_text(declarator, "parameters", source)
        .unwrap_or("()")
        .to_string();
    Some((name, parameters))
}

fn extract_c(root: Node<'_>, source: &str) -> Definitions {
    let mut defs = Definitions::default();

    for node in walk(root) {
        match node.kind() {
            "preproc_include" => defs.includes.push(include_path(text(node, source))),
            "function_definition" => {
                if let Some((name, parameters)) = c_function_name(node, source) {
                    defs.functions.push(FunctionDef {
                        name: name.to_string(),
                        parameters,
                        docstring: None,
                    });
                }
            }
            "struct_specifier" => {
                if let Some(name) = field_text(node, "name", source) {
                    if !defs.structs.iter().any(|s| s == name) {
                        defs.structs.push(name.to_string());
                    }
                }
            }
            "call_expression" => {
                if let Some(function) = field_text(node, "function", source) {
                    push_call(&mut defs.calls, function);
                }
            }
            _ => {}
        }
    }

    defs
}

// ---------------------------------------------------------------------------
// C++
// ---------------------------------------------------------------------------

fn extract_cpp(root: Node<'_>, source: &str) -> Definitions {
    let mut defs = Definitions::default();

    for node in walk(root) {
        match node.kind() {
            "preproc_include" => defs.includes.push(include_path(text(node, source))),
            "function_definition" => {
                let inside_class = ancestor_kinds(node).contains(&"class_specifier");
                if inside_class {
                    continue;
                }
                if let Some((name, parameters)) = c_function_name(node, source) {
                    defs.functions.push(FunctionDef {
                        name: name.to_string(),
                        parameters,
                        docstring: None,
                    });
                }
            }
            "class_specifier" => {
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let mut class = ClassDef {
                    name: name.to_string(),
                    ..Default::default()
                };
                if let Some(body) = node.child_by_field_name("body") {
                    for i in 0..body.named_child_count() {
                        let Some(child) = body.named_child(i) else {
                            continue;
                        };
                        if child.kind() == "function_definition" {
                            if let Some((method_name, parameters)) = c_function_name(child, source)
                            {
                                class.methods.push(MethodDef {
                                    name: method_name.to_string(),
                                    parameters,
                                });
                            }
                        }
                    }
                }
                defs.classes.push(class);
            }
            "namespace_definition" => {
                if let Some(name) = field_text(node, "name", source) {
                    defs.namespaces.push(name.to_string());
                }
            }
            "call_expression" => {
                if let Some(function) = field_text(node, "function", source) {
                    push_call(&mut defs.calls, function);
                }
            }
            _ => {}
        }
    }

    defs
}

// ---------------------------------------------------------------------------
// C#
// ---------------------------------------------------------------------------

fn extract_csharp(root: Node<'_>, source: &str) -> Definitions {
    let mut defs = Definitions::default();

    for node in walk(root) {
        match node.kind() {
            "using_directive" => {
                let spec = text(node, source)
                    .trim_start_matches("using")
                    .trim()
                    .trim_end_matches(';')
                    .trim();
                if !spec.is_empty() {
                    defs.imports.push(spec.to_string());
                }
            }
            "class_declaration" => {
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let mut class = ClassDef {
                    name: name.to_string(),
                    ..Default::default()
                };
                // base_list covers both the base class and interfaces; the
                // convention puts the class first and I-prefixed interfaces after.
                if let Some(bases) = node.child_by_field_name("bases") {
                    for base in text(bases, source).trim_start_matches(':').split(',') {
                        let base = base.trim();
                        if base.is_empty() {
                            continue;
                        }
                        if base.starts_with('I')
                            && base.chars().nth(1).is_some_and(|c| c.is_uppercase())
                        {
                            class.implements.push(base.to_string());
                        } else {
                            class.extends.push(base.to_string());
                        }
                    }
                }
                for i in 0..node.child_count() {
                    if let Some(child) = node.child(i) {
                        if child.kind() == "attribute_list" {
                            class.annotations.push(text(child, source).to_string());
                        }
                    }
                }
                if let Some(body) = node.child_by_field_name("body") {
                    for i in 0..body.named_child_count() {
                        let Some(child) = body.named_child(i) else {
                            continue;
                        };
                        match child.kind() {
                            "method_declaration" => {
                                if let Some(method_name) = field_text(child, "name", source) {
                                    class.methods.push(MethodDef {
                                        name: method_name.to_string(),
                                        parameters: field_text(child, "parameters", source)
                                            .unwrap_or("()")
                                            .to_string(),
                                    });
                                }
                            }
                            "property_declaration" | "field_declaration" => {
                                class.fields.push(text(child, source).to_string());
                            }
                            _ => {}
                        }
                    }
                }
                defs.classes.push(class);
            }
            "interface_declaration" => {
                let Some(name) = field_text(node, "name", source) else {
                    continue;
                };
                let mut interface = InterfaceDef {
                    name: name.to_string(),
                    methods: Vec::new(),
                };
                if let Some(body) = node.child_by_field_name("body") {
                    for i in 0..body.named_child_count() {
                        let Some(child) = body.named_child(i) else {
                            continue;
                        };
                        if child.kind() == "method_declaration" {
                            if let Some(method_name) = field_text(child, "name", source) {
                                interface.methods.push(MethodDef {
                                    name: method_name.to_string(),
                                    parameters: field_text(child, "parameters", source)
                                        .unwrap_or("()")
                                        .to_string(),
                                });
                            }
                        }
                    }
                }
                defs.interfaces.push(interface);
            }
            "invocation_expression" => {
                if let Some(function) = field_text(node, "function", source) {
                    push_call(&mut defs.calls, function);
                }
            }
            _ => {}
        }
    }

    defs
}
