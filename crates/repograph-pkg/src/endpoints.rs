//! Framework-specific HTTP route detectors

use regex::Regex;
use repograph_core::pkg::Endpoint;
use std::sync::OnceLock;

struct RouteRegexes {
    flask: Regex,
    flask_methods: Regex,
    fastapi: Regex,
    express: Regex,
    nest_controller: Regex,
    nest_method: Regex,
    spring_mapping: Regex,
}

fn regexes() -> &'static RouteRegexes {
    static RE: OnceLock<RouteRegexes> = OnceLock::new();
    RE.get_or_init(|| RouteRegexes {
        flask: Regex::new(r#"@(?:app|bp|blueprint|\w+_bp)\.route\(\s*["']([^"']+)["']"#).unwrap(),
        flask_methods: Regex::new(r#"methods\s*=\s*\[([^\]]+)\]"#).unwrap(),
        fastapi: Regex::new(
            r#"@(?:app|router)\.(get|post|put|delete|patch)\(\s*["']([^"']+)["']"#,
        )
        .unwrap(),
        express: Regex::new(
            r#"(?:app|router)\.(get|post|put|delete|patch)\(\s*["'`]([^"'`]+)["'`]"#,
        )
        .unwrap(),
        nest_controller: Regex::new(r#"@Controller\(\s*(?:["']([^"']*)["'])?\s*\)"#).unwrap(),
        nest_method: Regex::new(r#"@(Get|Post|Put|Delete|Patch)\(\s*(?:["']([^"']*)["'])?\s*\)"#)
            .unwrap(),
        spring_mapping: Regex::new(
            r#"@(Get|Post|Put|Delete|Request)Mapping\(\s*(?:value\s*=\s*)?["']([^"']+)["']"#,
        )
        .unwrap(),
    })
}

fn endpoint_id(module_id: &str, method: &str, path: &str) -> String {
    format!("ep:{}:{}:{}", module_id, method, path)
}

fn join_route(prefix: &str, suffix: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let suffix = suffix.trim_start_matches('/');
    if suffix.is_empty() {
        if prefix.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", prefix.trim_start_matches('/'))
        }
    } else if prefix.is_empty() {
        format!("/{}", suffix)
    } else {
        format!("/{}/{}", prefix.trim_start_matches('/'), suffix)
    }
}

/// Extract HTTP endpoints from one module's source. Best effort: a file
/// with no recognizable routes yields an empty list.
pub fn extract_endpoints(module_id: &str, source: &str, frameworks: &[String]) -> Vec<Endpoint> {
    let mut endpoints = Vec::new();
    let re = regexes();

    // Flask-style routes. The default method set is GET.
    for captures in re.flask.captures_iter(source) {
        let path = captures[1].to_string();
        let line_end = captures.get(0).map(|m| m.end()).unwrap_or(0);
        let tail = &source[line_end..source.len().min(line_end + 120)];
        let methods: Vec<String> = re
            .flask_methods
            .captures(tail)
            .map(|m| {
                m[1].split(',')
                    .map(|s| s.trim().trim_matches(|c| c == '"' || c == '\'').to_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["GET".to_string()]);
        for method in methods {
            endpoints.push(Endpoint {
                id: endpoint_id(module_id, &method, &path),
                path: path.clone(),
                method: Some(method),
                handler_module_id: Some(module_id.to_string()),
                handler_symbol: None,
                framework: Some("flask".to_string()),
            });
        }
    }

    // FastAPI decorators carry the verb directly.
    for captures in re.fastapi.captures_iter(source) {
        let method = captures[1].to_uppercase();
        let path = captures[2].to_string();
        endpoints.push(Endpoint {
            id: endpoint_id(module_id, &method, &path),
            path,
            method: Some(method),
            handler_module_id: Some(module_id.to_string()),
            handler_symbol: None,
            framework: Some("fastapi".to_string()),
        });
    }

    // Express/router calls, only for JS/TS projects.
    if frameworks.iter().any(|f| f == "express" || f == "nextjs") {
        for captures in re.express.captures_iter(source) {
            let method = captures[1].to_uppercase();
            let path = captures[2].to_string();
            endpoints.push(Endpoint {
                id: endpoint_id(module_id, &method, &path),
                path,
                method: Some(method),
                handler_module_id: Some(module_id.to_string()),
                handler_symbol: None,
                framework: Some("express".to_string()),
            });
        }
    }

    // NestJS: controller prefix + per-method decorators.
    if let Some(controller) = re.nest_controller.captures(source) {
        let prefix = controller.get(1).map(|m| m.as_str()).unwrap_or("");
        for captures in re.nest_method.captures_iter(source) {
            let method = captures[1].to_uppercase();
            let suffix = captures.get(2).map(|m| m.as_str()).unwrap_or("");
            let path = join_route(prefix, suffix);
            endpoints.push(Endpoint {
                id: endpoint_id(module_id, &method, &path),
                path,
                method: Some(method),
                handler_module_id: Some(module_id.to_string()),
                handler_symbol: None,
                framework: Some("nestjs".to_string()),
            });
        }
    }

    // Spring mappings.
    for captures in re.spring_mapping.captures_iter(source) {
        let verb = &captures[1];
        let method = if verb == "Request" {
            "GET".to_string()
        } else {
            verb.to_uppercase()
        };
        let path = captures[2].to_string();
        endpoints.push(Endpoint {
            id: endpoint_id(module_id, &method, &path),
            path,
            method: Some(method),
            handler_module_id: Some(module_id.to_string()),
            handler_symbol: None,
            framework: Some("spring-boot".to_string()),
        });
    }

    // Collapse duplicates by id.
    let mut seen = std::collections::HashSet::new();
    endpoints.retain(|e| seen.insert(e.id.clone()));
    endpoints
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flask_route_with_methods() {
        let source = "@app.route('/login', methods=['GET', 'POST'])\ndef login():\n    pass\n";
        let endpoints = extract_endpoints("mod:app.py", source, &["flask".into()]);
        assert_eq!(endpoints.len(), 2);
        assert!(endpoints.iter().any(|e| e.method.as_deref() == Some("GET")));
        assert!(endpoints.iter().any(|e| e.method.as_deref() == Some("POST")));
        assert_eq!(endpoints[0].path, "/login");
        assert_eq!(endpoints[0].handler_module_id.as_deref(), Some("mod:app.py"));
    }

    #[test]
    fn flask_route_defaults_to_get() {
        let source = "@app.route('/health')\ndef health():\n    pass\n";
        let endpoints = extract_endpoints("mod:app.py", source, &[]);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].method.as_deref(), Some("GET"));
    }

    #[test]
    fn nest_controller_prefix_joined() {
        let source = r#"
@Controller('auth')
export class AuthController {
    @Get('me')
    me() {}
    @Post()
    create() {}
}
"#;
        let endpoints = extract_endpoints("mod:auth.controller.ts", source, &["nestjs".into()]);
        assert!(endpoints.iter().any(|e| e.path == "/auth/me"));
        assert!(endpoints.iter().any(|e| e.path == "/auth"));
    }

    #[test]
    fn express_routes_need_framework_hint() {
        let source = "router.get('/items', listItems);";
        assert!(extract_endpoints("mod:routes.js", source, &[]).is_empty());
        let endpoints = extract_endpoints("mod:routes.js", source, &["express".into()]);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].path, "/items");
    }
}
