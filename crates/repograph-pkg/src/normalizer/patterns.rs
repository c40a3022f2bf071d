//! Code patterns, UI elements, and file-structure extraction

use super::{Definitions, Language};
use regex::Regex;
use repograph_core::pkg::{
    CodePatterns, ComponentType, ExportStyle, FileStructure, ImportStyle, NavigationPattern,
    StateManagement, UiElement, UiElements,
};
use std::path::Path;
use std::sync::OnceLock;

const ANGULAR_HOOKS: &[&str] = &[
    "ngOnInit",
    "ngOnDestroy",
    "ngAfterViewInit",
    "ngAfterViewChecked",
    "ngAfterContentInit",
    "ngAfterContentChecked",
    "ngOnChanges",
    "ngDoCheck",
];

const REACT_HOOKS: &[&str] = &[
    "useState",
    "useEffect",
    "useCallback",
    "useMemo",
    "useRef",
    "useContext",
];

const VUE_HOOKS: &[&str] = &[
    "onMounted",
    "onUnmounted",
    "onUpdated",
    "onBeforeMount",
    "onBeforeUnmount",
];

fn decorator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@([A-Za-z_]\w*)").unwrap())
}

pub fn extract_code_patterns(
    source: &str,
    language: Language,
    defs: &Definitions,
) -> CodePatterns {
    let mut patterns = CodePatterns::default();
    let source_lower = source.to_lowercase();

    // Import style: classify each specifier by its leading token.
    let mut relative = 0usize;
    let mut absolute = 0usize;
    for import in &defs.imports {
        if import.starts_with("./") || import.starts_with("../") || import.starts_with('.') {
            relative += 1;
        } else {
            absolute += 1;
        }
    }
    patterns.import_style = match (absolute, relative) {
        (a, r) if a > 0 && r > 0 => ImportStyle::Mixed,
        (a, _) if a > 0 => ImportStyle::Absolute,
        (_, r) if r > 0 => ImportStyle::Relative,
        _ => ImportStyle::Mixed,
    };

    // Export style: default vs named counts.
    if matches!(language, Language::TypeScript | Language::JavaScript) {
        let default_count = source.matches("export default").count();
        let named_count = source
            .lines()
            .filter(|line| {
                let trimmed = line.trim_start();
                trimmed.starts_with("export ") && !trimmed.starts_with("export default")
            })
            .count();
        patterns.export_style = match (default_count, named_count) {
            (d, n) if d > 0 && n > 0 => ExportStyle::Mixed,
            (d, _) if d > 0 => ExportStyle::Default,
            (_, n) if n > 0 => ExportStyle::Named,
            _ => ExportStyle::Mixed,
        };
    }

    // Decorators (Python/TS/Java share the @Name shape).
    for captures in decorator_re().captures_iter(source) {
        let name = captures[1].to_string();
        if !patterns.decorators.contains(&name) {
            patterns.decorators.push(name);
        }
    }

    // Component type: class vs function vs arrow, tie-break by frequency.
    // PascalCase arrow assignments count as components.
    let mut class_votes = 0usize;
    let mut function_votes = 0usize;
    let mut arrow_votes = 0usize;
    for class in &defs.classes {
        if class
            .extends
            .iter()
            .any(|base| base.to_lowercase().contains("component"))
            || class.name.to_lowercase().contains("component")
        {
            class_votes += 1;
        }
    }
    for function in &defs.functions {
        let pascal = function
            .name
            .chars()
            .next()
            .is_some_and(|c| c.is_uppercase());
        let mentions_component = function.name.to_lowercase().contains("component");
        // Arrow assignments are recorded as functions by the TS/JS walker;
        // distinguish them by the source shape.
        let arrow_shape = source.contains(&format!("{} = (", function.name))
            || source.contains(&format!("{} = async (", function.name));
        if arrow_shape && (pascal || mentions_component) {
            arrow_votes += 1;
        } else if mentions_component {
            function_votes += 1;
        }
    }
    patterns.component_type = [
        (ComponentType::Class, class_votes),
        (ComponentType::Function, function_votes),
        (ComponentType::Arrow, arrow_votes),
    ]
    .into_iter()
    .filter(|(_, votes)| *votes > 0)
    .max_by_key(|(_, votes)| *votes)
    .map(|(kind, _)| kind);

    // Lifecycle hooks against the three closed lists.
    for hook in ANGULAR_HOOKS.iter().chain(REACT_HOOKS).chain(VUE_HOOKS) {
        if source_lower.contains(&hook.to_lowercase())
            && !patterns.lifecycle_hooks.iter().any(|h| h == hook)
        {
            patterns.lifecycle_hooks.push(hook.to_string());
        }
    }

    // State management from import specifiers.
    let mut rxjs = 0usize;
    let mut redux = 0usize;
    let mut mobx = 0usize;
    for import in &defs.imports {
        let lower = import.to_lowercase();
        if lower.contains("rxjs") {
            rxjs += 1;
        } else if lower.contains("redux") {
            redux += 1;
        } else if lower.contains("mobx") {
            mobx += 1;
        }
    }
    patterns.state_management = [
        (StateManagement::Rxjs, rxjs),
        (StateManagement::Redux, redux),
        (StateManagement::Mobx, mobx),
    ]
    .into_iter()
    .filter(|(_, votes)| *votes > 0)
    .max_by_key(|(_, votes)| *votes)
    .map(|(kind, _)| kind)
    .unwrap_or(StateManagement::None);

    patterns
}

// ---------------------------------------------------------------------------
// UI elements
// ---------------------------------------------------------------------------

struct UiRegexes {
    mat_button: Regex,
    mat_raised: Regex,
    react_button: Regex,
    on_click_button: Regex,
    router_navigate: Regex,
    router_link: Regex,
    use_navigate: Regex,
    react_link: Regex,
    router_push: Regex,
    form_group: Regex,
    ng_model: Regex,
    on_submit_form: Regex,
}

fn ui_regexes() -> &'static UiRegexes {
    static RE: OnceLock<UiRegexes> = OnceLock::new();
    RE.get_or_init(|| UiRegexes {
        mat_button: Regex::new(r"(?i)<button[^>]*mat-button[^>]*>").unwrap(),
        mat_raised: Regex::new(r"(?i)<button[^>]*mat-raised-button[^>]*>").unwrap(),
        react_button: Regex::new(r"<Button[^>]*>").unwrap(),
        on_click_button: Regex::new(r"(?i)<button[^>]*onClick\s*=\s*\{[^}]*\}[^>]*>").unwrap(),
        router_navigate: Regex::new(r"(?i)this\.router\.navigate\s*\(\s*\[[^\]]+\]\s*\)").unwrap(),
        router_link: Regex::new(r#"(?i)routerLink\s*=\s*["'][^"']+["']"#).unwrap(),
        use_navigate: Regex::new(r"(?i)const\s+\w+\s*=\s*useNavigate\s*\(\)").unwrap(),
        react_link: Regex::new(r#"<Link[^>]*to\s*=\s*["'][^"']+["']"#).unwrap(),
        router_push: Regex::new(r"(?i)router\.(push|replace)\s*\(").unwrap(),
        form_group: Regex::new(r#"(?i)\[formGroup\]\s*=\s*["'][^"']+["']"#).unwrap(),
        ng_model: Regex::new(r#"(?i)\[\(ngModel\)\]\s*=\s*["'][^"']+["']"#).unwrap(),
        on_submit_form: Regex::new(r"(?i)<form[^>]*onSubmit\s*=\s*\{[^}]*\}[^>]*>").unwrap(),
    })
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Regex-extract buttons, navigation calls, and form patterns.
/// Buttons are deduplicated by (type, pattern); navigation keeps the first
/// match only.
pub fn extract_ui_elements(path: &Path, source: &str) -> UiElements {
    let mut ui = UiElements::default();
    let regexes = ui_regexes();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    let source_lower = source.to_lowercase();

    let mut push_button = |element_type: &str, pattern: &str, import: Option<&str>| {
        let element = UiElement {
            element_type: element_type.to_string(),
            pattern: truncate(pattern, 100),
            import: import.map(String::from),
        };
        if !ui
            .buttons
            .iter()
            .any(|b| b.element_type == element.element_type && b.pattern == element.pattern)
        {
            ui.buttons.push(element);
        }
    };

    for m in regexes.mat_button.find_iter(source) {
        push_button("mat-button", m.as_str(), Some("@angular/material/button"));
    }
    for m in regexes.mat_raised.find_iter(source) {
        push_button(
            "mat-raised-button",
            m.as_str(),
            Some("@angular/material/button"),
        );
    }
    for m in regexes.react_button.find_iter(source) {
        let import = if source_lower.contains("antd") {
            "antd"
        } else if source_lower.contains("chakra") {
            "@chakra-ui/react"
        } else {
            "@mui/material"
        };
        push_button("Button", m.as_str(), Some(import));
    }
    if ext == "tsx" || ext == "jsx" {
        for m in regexes.on_click_button.find_iter(source) {
            push_button("button", m.as_str(), None);
        }
    }

    // Navigation: first hit wins.
    if let Some(m) = regexes.router_navigate.find(source) {
        ui.navigation = Some(NavigationPattern {
            pattern: truncate(m.as_str(), 150),
            import: Some("@angular/router".into()),
        });
    }
    if ui.navigation.is_none() {
        if let Some(m) = regexes.router_link.find(source) {
            ui.navigation = Some(NavigationPattern {
                pattern: truncate(m.as_str(), 150),
                import: Some("@angular/router".into()),
            });
        }
    }
    if ui.navigation.is_none() && regexes.use_navigate.is_match(source) {
        ui.navigation = Some(NavigationPattern {
            pattern: "useNavigate()".into(),
            import: Some("react-router-dom".into()),
        });
    }
    if ui.navigation.is_none() {
        if let Some(m) = regexes.react_link.find(source) {
            ui.navigation = Some(NavigationPattern {
                pattern: truncate(m.as_str(), 150),
                import: Some("react-router-dom".into()),
            });
        }
    }
    if ui.navigation.is_none()
        && (source_lower.contains("next/router") || source_lower.contains("next/navigation"))
    {
        if let Some(captures) = regexes.router_push.captures(source) {
            let import = if source_lower.contains("next/router") {
                "next/router"
            } else {
                "next/navigation"
            };
            ui.navigation = Some(NavigationPattern {
                pattern: format!("router.{}()", &captures[1]),
                import: Some(import.into()),
            });
        }
    }

    if let Some(m) = regexes.form_group.find(source) {
        ui.forms.push(UiElement {
            element_type: "reactive".into(),
            pattern: truncate(m.as_str(), 100),
            import: Some("@angular/forms".into()),
        });
    }
    if let Some(m) = regexes.ng_model.find(source) {
        ui.forms.push(UiElement {
            element_type: "template-driven".into(),
            pattern: truncate(m.as_str(), 100),
            import: Some("@angular/forms".into()),
        });
    }
    if ext == "tsx" || ext == "jsx" {
        if let Some(m) = regexes.on_submit_form.find(source) {
            ui.forms.push(UiElement {
                element_type: "react".into(),
                pattern: truncate(m.as_str(), 100),
                import: None,
            });
        }
    }

    ui
}

// ---------------------------------------------------------------------------
// File structure
// ---------------------------------------------------------------------------

fn template_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)templateUrl\s*:\s*["']([^"']+)["']"#).unwrap())
}

fn style_urls_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)styleUrls\s*:\s*\[\s*["']([^"']+)["']"#).unwrap())
}

fn standalone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)standalone\s*:\s*true").unwrap())
}

/// Detect sibling template/style files and decorator references for
/// framework components.
pub fn analyze_file_structure(path: &Path, source: &str) -> FileStructure {
    let mut structure = FileStructure::default();

    if source.to_lowercase().contains("@component") && standalone_re().is_match(source) {
        structure.is_standalone = true;
    }

    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    for ext in ["html", "template.html"] {
        let candidate = dir.join(format!("{}.{}", stem, ext));
        if candidate.exists() {
            structure.has_template = true;
            structure.template_path = Some(format!("{}.{}", stem, ext));
            break;
        }
    }

    if let Some(captures) = template_url_re().captures(source) {
        let url = &captures[1];
        if url.starts_with("./") || url.starts_with("../") {
            let candidate = dir.join(url);
            if candidate.exists() {
                structure.has_template = true;
                structure.template_path = Some(url.trim_start_matches("./").to_string());
            }
        }
    }

    for ext in ["css", "scss", "less", "sass"] {
        let candidate = dir.join(format!("{}.{}", stem, ext));
        if candidate.exists() {
            structure.has_styles = true;
            structure.styles_path = Some(format!("{}.{}", stem, ext));
            break;
        }
    }

    if let Some(captures) = style_urls_re().captures(source) {
        let url = &captures[1];
        if url.starts_with("./") || url.starts_with("../") {
            let candidate = dir.join(url);
            if candidate.exists() {
                structure.has_styles = true;
                structure.styles_path = Some(url.trim_start_matches("./").to_string());
            }
        }
    }

    structure
}
