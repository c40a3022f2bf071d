//! Classic ASP extraction — no tree-sitter grammar, regex degraded path

use super::{Definitions, FunctionDef};
use regex::Regex;
use std::sync::OnceLock;

fn function_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Function\s+(\w+)\s*\(([^)]*)\)").unwrap())
}

fn sub_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Sub\s+(\w+)\s*\(([^)]*)\)").unwrap())
}

fn include_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<!--\s*#include\s+(?:file|virtual)\s*=\s*["']([^"']+)["']\s*-->"#)
            .unwrap()
    })
}

pub fn extract(source: &str) -> Definitions {
    let mut defs = Definitions::default();

    for captures in function_re().captures_iter(source) {
        defs.functions.push(FunctionDef {
            name: captures[1].to_string(),
            parameters: captures[2].trim().to_string(),
            docstring: None,
        });
    }

    // Subroutines are functions without a return value; they share the
    // functions table so the symbol pass sees them.
    for captures in sub_re().captures_iter(source) {
        let name = captures[1].to_string();
        if !defs.functions.iter().any(|f| f.name == name) {
            defs.functions.push(FunctionDef {
                name,
                parameters: captures[2].trim().to_string(),
                docstring: None,
            });
        }
    }

    for captures in include_re().captures_iter(source) {
        defs.includes.push(captures[1].to_string());
    }

    defs
}
