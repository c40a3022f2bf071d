//! Code validator — structural checks applied before the editor writes
//!
//! Fatal errors block the write; warnings are recorded and carried in the
//! edit result.

use repograph_core::FileValidation;

/// Validate proposed file content. Framework is the project-level detection
/// ("angular", "react", "flask", ...) or "unknown".
pub fn validate_content(
    file: &str,
    task_id: usize,
    content: &str,
    framework: &str,
) -> FileValidation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if content.trim().is_empty() {
        errors.push("proposed content is empty".to_string());
    }

    if let Some(problem) = check_balanced_delimiters(content) {
        errors.push(problem);
    }

    let extension = file.rsplit('.').next().unwrap_or_default().to_lowercase();
    match framework.to_lowercase().as_str() {
        "angular" => {
            if extension == "tsx" || extension == "jsx" {
                errors.push(format!(
                    "{} uses a JSX extension in an Angular project",
                    file
                ));
            }
        }
        "flask" => {
            if extension == "ts" || extension == "tsx" {
                warnings.push(format!(
                    "{} is a TypeScript file in a Flask project",
                    file
                ));
            }
        }
        _ => {}
    }

    // Truncated oracle output tends to end mid-statement.
    let trimmed = content.trim_end();
    if trimmed.ends_with(',') || trimmed.ends_with("&&") || trimmed.ends_with("||") {
        warnings.push("content ends mid-expression, possibly truncated".to_string());
    }

    if content.contains("```") {
        warnings.push("content still contains a markdown fence".to_string());
    }

    FileValidation {
        file: file.to_string(),
        task_id,
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// Count braces/brackets/parens outside string and comment contexts.
/// A heuristic, but catches the common failure of a cut-off completion.
fn check_balanced_delimiters(content: &str) -> Option<String> {
    let mut braces = 0i64;
    let mut brackets = 0i64;
    let mut parens = 0i64;
    let mut in_string: Option<char> = None;
    let mut prev = '\0';
    let mut in_line_comment = false;

    for c in content.chars() {
        if in_line_comment {
            if c == '\n' {
                in_line_comment = false;
            }
            prev = c;
            continue;
        }
        if let Some(quote) = in_string {
            if c == quote && prev != '\\' {
                in_string = None;
            }
            prev = c;
            continue;
        }
        match c {
            '"' | '\'' | '`' => in_string = Some(c),
            '#' => in_line_comment = true,
            '/' if prev == '/' => in_line_comment = true,
            '{' => braces += 1,
            '}' => braces -= 1,
            '[' => brackets += 1,
            ']' => brackets -= 1,
            '(' => parens += 1,
            ')' => parens -= 1,
            _ => {}
        }
        prev = c;
    }

    if braces != 0 {
        Some(format!("unbalanced braces ({:+})", braces))
    } else if brackets != 0 {
        Some(format!("unbalanced brackets ({:+})", brackets))
    } else if parens != 0 {
        Some(format!("unbalanced parentheses ({:+})", parens))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_code_passes() {
        let content = "def f(x):\n    return {'a': [x]}\n";
        let result = validate_content("f.py", 1, content, "flask");
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn empty_content_is_fatal() {
        let result = validate_content("f.py", 1, "   \n", "unknown");
        assert!(!result.valid);
    }

    #[test]
    fn unbalanced_braces_are_fatal() {
        let result = validate_content("f.ts", 1, "function f() { if (x) {\n", "unknown");
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("unbalanced")));
    }

    #[test]
    fn braces_in_strings_ignored() {
        let content = "const s = \"{ not a brace }}}\";\nconst t = '}';\n";
        let result = validate_content("f.ts", 1, content, "unknown");
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn python_comment_braces_ignored() {
        let content = "# closing } only\nx = 1\n";
        let result = validate_content("f.py", 1, content, "unknown");
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn jsx_extension_fatal_for_angular() {
        let result = validate_content("src/Login.tsx", 1, "const x = 1;\n", "angular");
        assert!(!result.valid);
    }

    #[test]
    fn leftover_fence_is_warning_only() {
        let result = validate_content("f.py", 1, "x = 1\n# ```\n", "unknown");
        assert!(result.valid);
        assert!(!result.warnings.is_empty());
    }
}
