//! Per-module framework detection with confidence scoring
//!
//! Each candidate framework accumulates integer indicators; strong
//! indicators (framework package imports, framework decorators,
//! extension-level signals) count +2. Confidence is
//! `min(base + step * indicators, cap)` and the winner is returned only
//! when it clears the 0.3 floor.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

const MIN_CONFIDENCE: f64 = 0.3;

struct FrameworkRegexes {
    angular_import: Regex,
    react_import: Regex,
    vue_import: Regex,
    nestjs_import: Regex,
    spring_import: Regex,
    flask_import: Regex,
    flask_route: Regex,
    fastapi_import: Regex,
    fastapi_route: Regex,
    react_create: Regex,
}

fn regexes() -> &'static FrameworkRegexes {
    static RE: OnceLock<FrameworkRegexes> = OnceLock::new();
    RE.get_or_init(|| FrameworkRegexes {
        angular_import: Regex::new(r#"(?i)from\s+['"]@angular/"#).unwrap(),
        react_import: Regex::new(r#"(?i)import\s+.*from\s+['"]react['"]"#).unwrap(),
        vue_import: Regex::new(r#"(?i)from\s+['"]vue['"]"#).unwrap(),
        nestjs_import: Regex::new(r"(?i)@nestjs/").unwrap(),
        spring_import: Regex::new(r"(?i)import\s+org\.springframework").unwrap(),
        flask_import: Regex::new(r"(?i)from\s+flask\s+import").unwrap(),
        flask_route: Regex::new(r"(?i)@(app|bp|blueprint)\.route\(").unwrap(),
        fastapi_import: Regex::new(r"(?i)from\s+fastapi\s+import").unwrap(),
        fastapi_route: Regex::new(r"(?i)@(app|router)\.(get|post|put|delete|patch)\(").unwrap(),
        react_create: Regex::new(r"(?i)react\.(createelement|component|fc)").unwrap(),
    })
}

fn score(base: f64, step: f64, cap: f64, indicators: u32) -> f64 {
    (base + step * indicators as f64).min(cap)
}

/// Detect the framework of a single module. Returns `(framework, confidence)`
/// or `None` when nothing clears the floor.
pub fn detect_module_framework(path: &Path, source: &str) -> Option<(String, f64)> {
    if source.is_empty() {
        return None;
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    let path_lower = path.to_string_lossy().to_lowercase();
    let source_lower = source.to_lowercase();
    let re = regexes();

    let mut candidates: Vec<(&str, f64)> = Vec::new();

    // Angular
    let mut angular = 0u32;
    if source_lower.contains("@component") || source_lower.contains("@ngmodule") {
        angular += 2;
    }
    if source_lower.contains("@injectable") {
        angular += 1;
    }
    if source_lower.contains("@input") || source_lower.contains("@output") {
        angular += 1;
    }
    if re.angular_import.is_match(source) {
        angular += 2;
    }
    if ext == "ts" && path_lower.contains("component") && angular > 0 {
        angular += 1;
    }
    if angular > 0 {
        candidates.push(("angular", score(0.5, 0.10, 0.98, angular)));
    }

    // React
    let mut react = 0u32;
    if re.react_import.is_match(source) {
        react += 2;
    }
    if source_lower.contains("usestate") || source_lower.contains("useeffect") {
        react += 2;
    }
    if source_lower.contains("usecallback") || source_lower.contains("usememo") {
        react += 1;
    }
    if ext == "tsx" || ext == "jsx" {
        react += 2;
    }
    if re.react_create.is_match(source) {
        react += 1;
    }
    if react > 0 {
        candidates.push(("react", score(0.4, 0.12, 0.95, react)));
    }

    // Vue
    let mut vue = 0u32;
    if ext == "vue" {
        vue += 3;
    }
    if source_lower.contains("definecomponent") {
        vue += 2;
    }
    if re.vue_import.is_match(source) {
        vue += 2;
    }
    if source_lower.contains("<template>") && source_lower.contains("<script") {
        vue += 1;
    }
    if source_lower.contains("onmounted") || source_lower.contains("onunmounted") {
        vue += 1;
    }
    if vue > 0 {
        candidates.push(("vue", score(0.6, 0.10, 0.98, vue)));
    }

    // NestJS
    let mut nestjs = 0u32;
    if source_lower.contains("@controller") {
        nestjs += 2;
    }
    if source_lower.contains("@injectable") && !source_lower.contains("@controller") {
        nestjs += 1;
    }
    if source_lower.contains("@module") && !source_lower.contains("@ngmodule") {
        nestjs += 2;
    }
    if re.nestjs_import.is_match(source) {
        nestjs += 2;
    }
    if nestjs > 0 {
        candidates.push(("nestjs", score(0.5, 0.10, 0.98, nestjs)));
    }

    // Next.js, detected as distinct from React via its router imports.
    let mut nextjs = 0u32;
    if source_lower.contains("next/router") || source_lower.contains("next/link") {
        nextjs += 2;
    }
    if source_lower.contains("next/navigation") {
        nextjs += 2;
    }
    if source_lower.contains("userouter") && source_lower.contains("next") {
        nextjs += 1;
    }
    if nextjs > 0 {
        candidates.push(("nextjs", score(0.5, 0.15, 0.95, nextjs)));
    }

    // Flask
    let mut flask = 0u32;
    if re.flask_import.is_match(source) {
        flask += 2;
    }
    if re.flask_route.is_match(source) {
        flask += 2;
    }
    if source_lower.contains("flask(") {
        flask += 1;
    }
    if flask > 0 {
        candidates.push(("flask", score(0.5, 0.15, 0.95, flask)));
    }

    // FastAPI
    let mut fastapi = 0u32;
    if re.fastapi_import.is_match(source) {
        fastapi += 2;
    }
    if re.fastapi_route.is_match(source) {
        fastapi += 2;
    }
    if fastapi > 0 {
        candidates.push(("fastapi", score(0.5, 0.15, 0.95, fastapi)));
    }

    // Spring Boot
    let mut spring = 0u32;
    if source_lower.contains("@restcontroller") {
        spring += 2;
    }
    if source_lower.contains("@service") {
        spring += 1;
    }
    if source_lower.contains("@repository") {
        spring += 1;
    }
    if re.spring_import.is_match(source) {
        spring += 2;
    }
    if spring > 0 {
        candidates.push(("spring-boot", score(0.5, 0.12, 0.95, spring)));
    }

    candidates
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .filter(|(_, confidence)| *confidence >= MIN_CONFIDENCE)
        .map(|(framework, confidence)| (framework.to_string(), confidence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn angular_component_detected() {
        let source = r#"
import { Component } from '@angular/core';

@Component({ selector: 'app-login' })
export class LoginComponent {}
"#;
        let (framework, confidence) =
            detect_module_framework(&PathBuf::from("src/login.component.ts"), source).unwrap();
        assert_eq!(framework, "angular");
        // @Component (+2), @angular import (+2), ts+component path (+1) = 5
        assert!((confidence - 0.98f64.min(0.5 + 0.5)).abs() < 1e-9);
    }

    #[test]
    fn react_tsx_detected() {
        let source = "import React from 'react';\nexport const App = () => <div/>;";
        let (framework, confidence) =
            detect_module_framework(&PathBuf::from("src/App.tsx"), source).unwrap();
        assert_eq!(framework, "react");
        assert!(confidence >= 0.4 + 0.12 * 4.0 - 1e-9);
    }

    #[test]
    fn nextjs_beats_react_on_router_import() {
        let source = "import { useRouter } from 'next/router';\nconst r = useRouter();";
        let (framework, _) =
            detect_module_framework(&PathBuf::from("pages/index.tsx"), source).unwrap();
        assert_eq!(framework, "nextjs");
    }

    #[test]
    fn plain_module_below_floor() {
        let source = "export function add(a: number, b: number) { return a + b; }";
        assert!(detect_module_framework(&PathBuf::from("src/math.ts"), source).is_none());
    }

    #[test]
    fn flask_routes_detected() {
        let source = "from flask import Flask\napp = Flask(__name__)\n@app.route('/login')\ndef login():\n    pass\n";
        let (framework, confidence) =
            detect_module_framework(&PathBuf::from("app.py"), source).unwrap();
        assert_eq!(framework, "flask");
        assert!(confidence > 0.9);
    }
}
