//! Language normalizer — parses a file into a uniform definition record
//!
//! Tree-sitter–supported languages are parsed and walked; classic ASP has
//! no grammar and takes a regex-based degraded path. A file whose parse
//! yields nothing is dropped from the module set.

mod asp;
mod patterns;
mod treesit;

use repograph_core::pkg::{CodePatterns, FileStructure, UiElements};
use std::path::Path;

/// Closed set of language handlers, selected by extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    TypeScript,
    JavaScript,
    Java,
    C,
    Cpp,
    CSharp,
    Asp,
}

impl Language {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        Some(match ext.as_str() {
            "py" => Self::Python,
            "ts" | "tsx" => Self::TypeScript,
            "js" | "jsx" => Self::JavaScript,
            "java" => Self::Java,
            "c" | "h" => Self::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hxx" => Self::Cpp,
            "cs" => Self::CSharp,
            "asp" | "aspx" => Self::Asp,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Asp => "asp",
        }
    }

    /// Known source extensions for import resolution, in probe order.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Python => &["py"],
            Self::TypeScript => &["ts", "tsx"],
            Self::JavaScript => &["js", "jsx"],
            Self::Java => &["java"],
            Self::C => &["c", "h"],
            Self::Cpp => &["cpp", "cc", "cxx", "hpp", "hxx"],
            Self::CSharp => &["cs"],
            Self::Asp => &["asp", "aspx"],
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FunctionDef {
    pub name: String,
    pub parameters: String,
    pub docstring: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct MethodDef {
    pub name: String,
    pub parameters: String,
}

#[derive(Clone, Debug, Default)]
pub struct ClassDef {
    pub name: String,
    pub methods: Vec<MethodDef>,
    pub fields: Vec<String>,
    pub annotations: Vec<String>,
    pub docstring: Option<String>,
    /// Base classes from the class header.
    pub extends: Vec<String>,
    /// Implemented interfaces from the class header.
    pub implements: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct InterfaceDef {
    pub name: String,
    pub methods: Vec<MethodDef>,
}

/// Uniform definition record. Not every field is populated for every
/// language; empty collections mean "absent".
#[derive(Clone, Debug, Default)]
pub struct Definitions {
    /// Import specifiers (module paths / package names), not full statements.
    pub imports: Vec<String>,
    pub functions: Vec<FunctionDef>,
    pub classes: Vec<ClassDef>,
    pub interfaces: Vec<InterfaceDef>,
    pub structs: Vec<String>,
    pub includes: Vec<String>,
    pub namespaces: Vec<String>,
    pub variables: Vec<String>,
    /// Called function names, best-effort, for cross-module call edges.
    pub calls: Vec<String>,
    pub code_patterns: CodePatterns,
    pub ui_elements: UiElements,
    pub file_structure: FileStructure,
}

impl Definitions {
    /// True when the parse produced nothing usable.
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
            && self.functions.is_empty()
            && self.classes.is_empty()
            && self.interfaces.is_empty()
            && self.structs.is_empty()
            && self.includes.is_empty()
            && self.variables.is_empty()
    }
}

/// Normalize one file. Returns `None` when the language is unsupported or
/// parse errors prevent any extraction.
pub fn normalize(path: &Path, source: &str) -> Option<Definitions> {
    let language = Language::from_path(path)?;

    let mut defs = match language {
        Language::Asp => asp::extract(source),
        _ => {
            let tree = treesit::parse(source, language, path)?;
            treesit::extract(tree.root_node(), source, language)
        }
    };

    if defs.is_empty() {
        return None;
    }

    defs.code_patterns = patterns::extract_code_patterns(source, language, &defs);
    defs.ui_elements = patterns::extract_ui_elements(path, source);
    defs.file_structure = patterns::analyze_file_structure(path, source);
    Some(defs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn language_from_extension() {
        assert_eq!(
            Language::from_path(&PathBuf::from("a/b.py")),
            Some(Language::Python)
        );
        assert_eq!(
            Language::from_path(&PathBuf::from("x.tsx")),
            Some(Language::TypeScript)
        );
        assert_eq!(
            Language::from_path(&PathBuf::from("x.jsx")),
            Some(Language::JavaScript)
        );
        assert_eq!(
            Language::from_path(&PathBuf::from("legacy.aspx")),
            Some(Language::Asp)
        );
        assert_eq!(Language::from_path(&PathBuf::from("notes.md")), None);
        assert_eq!(Language::from_path(&PathBuf::from("Makefile")), None);
    }

    #[test]
    fn python_functions_and_classes() {
        let source = r#"
import os
from auth.tokens import issue_token

def login(username, password):
    """Authenticate a user."""
    return issue_token(username)

class SessionStore:
    """Keeps sessions."""

    def get(self, key):
        return None

    def put(self, key, value):
        pass
"#;
        let defs = normalize(&PathBuf::from("auth/login.py"), source).unwrap();
        assert!(defs.imports.iter().any(|i| i == "os"));
        assert!(defs.imports.iter().any(|i| i == "auth.tokens"));
        assert_eq!(defs.functions.len(), 1);
        assert_eq!(defs.functions[0].name, "login");
        assert_eq!(
            defs.functions[0].docstring.as_deref(),
            Some("Authenticate a user.")
        );
        assert_eq!(defs.classes.len(), 1);
        assert_eq!(defs.classes[0].name, "SessionStore");
        let methods: Vec<&str> = defs.classes[0]
            .methods
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert!(methods.contains(&"get"));
        assert!(methods.contains(&"put"));
    }

    #[test]
    fn typescript_imports_and_arrow_components() {
        let source = r#"
import { Injectable } from '@angular/core';
import { helper } from './util';

export const LoginBanner = (props) => {
    return null;
};

export class AuthService {
    login(user: string) {
        return helper(user);
    }
}
"#;
        let defs = normalize(&PathBuf::from("src/auth.service.ts"), source).unwrap();
        assert!(defs.imports.iter().any(|i| i == "@angular/core"));
        assert!(defs.imports.iter().any(|i| i == "./util"));
        assert!(defs.functions.iter().any(|f| f.name == "LoginBanner"));
        assert!(defs.classes.iter().any(|c| c.name == "AuthService"));
        assert!(defs.calls.iter().any(|c| c == "helper"));
    }

    #[test]
    fn typescript_extends_and_implements() {
        let source = r#"
export interface OnInit {
    ngOnInit(): void;
}

export class LoginComponent extends BaseComponent implements OnInit {
    ngOnInit() {}
}
"#;
        let defs = normalize(&PathBuf::from("src/login.component.ts"), source).unwrap();
        let class = defs
            .classes
            .iter()
            .find(|c| c.name == "LoginComponent")
            .unwrap();
        assert_eq!(class.extends, vec!["BaseComponent"]);
        assert_eq!(class.implements, vec!["OnInit"]);
        assert!(defs.interfaces.iter().any(|i| i.name == "OnInit"));
    }

    #[test]
    fn asp_degraded_path() {
        let source = r#"
<!--#include file="common.asp"-->
<%
Function GetUser(id)
    GetUser = id
End Function

Sub RenderPage(title)
End Sub
%>
"#;
        let defs = normalize(&PathBuf::from("legacy/page.asp"), source).unwrap();
        assert!(defs.functions.iter().any(|f| f.name == "GetUser"));
        assert!(defs.functions.iter().any(|f| f.name == "RenderPage"));
        assert!(defs.includes.iter().any(|i| i == "common.asp"));
    }

    #[test]
    fn unparseable_source_is_dropped() {
        assert!(normalize(&PathBuf::from("x.py"), "").is_none());
    }
}
