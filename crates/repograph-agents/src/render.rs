//! Mermaid rendering chain
//!
//! Each step falls back on failure:
//!   1. headless-browser screenshot of a client-side rendered page
//!   2. mermaid CLI (`mmdc`) with width/height and scale flags
//!   3. mermaid.ink HTTP service (low-resolution)
//!   4. raw fenced code block, rendered=false

use base64::Engine as _;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Minimum render width in pixels; multiplied by the resolution factor.
const BASE_WIDTH: u32 = 2024;
const BASE_HEIGHT: u32 = 1140;

const BROWSER_CANDIDATES: &[&str] = &["chromium", "chromium-browser", "google-chrome"];

pub struct RenderOutcome {
    pub content: String,
    pub rendered: bool,
    pub method: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub resolution: Option<u32>,
}

impl RenderOutcome {
    pub fn metadata(&self) -> serde_json::Value {
        let mut meta = serde_json::json!({
            "rendered": self.rendered,
            "method": self.method,
        });
        if let Some(width) = self.width {
            meta["width"] = serde_json::json!(width);
        }
        if let Some(height) = self.height {
            meta["height"] = serde_json::json!(height);
        }
        if let Some(resolution) = self.resolution {
            meta["resolution"] = serde_json::json!(resolution);
        }
        meta
    }
}

/// Render mermaid code to an image, walking the fallback chain.
pub async fn render_mermaid(mermaid_code: &str, resolution: u32) -> RenderOutcome {
    let resolution = resolution.max(1);
    let width = BASE_WIDTH * resolution;
    let height = BASE_HEIGHT * resolution;

    match render_with_browser(mermaid_code, width, height, resolution).await {
        Ok(path) => {
            return RenderOutcome {
                content: format!("![diagram]({})", path),
                rendered: true,
                method: "browser".to_string(),
                width: Some(width),
                height: Some(height),
                resolution: Some(resolution),
            }
        }
        Err(e) => debug!("browser rendering unavailable: {}", e),
    }

    match render_with_cli(mermaid_code, width, height, resolution).await {
        Ok(path) => {
            return RenderOutcome {
                content: format!("![diagram]({})", path),
                rendered: true,
                method: "mermaid-cli".to_string(),
                width: Some(width),
                height: Some(height),
                resolution: Some(resolution),
            }
        }
        Err(e) => debug!("mermaid-cli unavailable: {}", e),
    }

    match render_with_ink(mermaid_code).await {
        Ok(url) => {
            return RenderOutcome {
                content: format!("![diagram]({})", url),
                rendered: true,
                method: "mermaid-ink".to_string(),
                width: None,
                height: None,
                resolution: None,
            }
        }
        Err(e) => warn!("remote rendering unavailable: {}", e),
    }

    RenderOutcome {
        content: format!("```mermaid\n{}\n```", mermaid_code),
        rendered: false,
        method: "code".to_string(),
        width: None,
        height: None,
        resolution: None,
    }
}

/// Headless-browser screenshot: write a temp HTML page that renders the
/// diagram client-side, screenshot it at the scaled window size with the
/// device pixel ratio applied.
async fn render_with_browser(
    mermaid_code: &str,
    width: u32,
    height: u32,
    resolution: u32,
) -> Result<String, String> {
    let browser = find_program(BROWSER_CANDIDATES).await.ok_or("no browser")?;

    let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
    let html_path = dir.path().join("diagram.html");
    let png_path = std::env::temp_dir().join(format!("diagram-{}.png", uuid_suffix()));

    let html = format!(
        r#"<!DOCTYPE html><html><head>
<script src="https://cdn.jsdelivr.net/npm/mermaid@10/dist/mermaid.min.js"></script>
</head><body>
<pre class="mermaid">{}</pre>
<script>mermaid.initialize({{ startOnLoad: true }});</script>
</body></html>"#,
        html_escape(mermaid_code)
    );
    std::fs::write(&html_path, html).map_err(|e| e.to_string())?;

    let output = tokio::time::timeout(
        Duration::from_secs(30),
        Command::new(&browser)
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--hide-scrollbars")
            .arg(format!("--window-size={},{}", width, height))
            .arg(format!("--force-device-scale-factor={}", resolution))
            .arg(format!("--screenshot={}", png_path.display()))
            .arg("--virtual-time-budget=5000")
            .arg(format!("file://{}", html_path.display()))
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| "browser timed out".to_string())?
    .map_err(|e| e.to_string())?;

    if !output.status.success() || !png_path.exists() {
        return Err(format!(
            "browser exited {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    Ok(png_path.display().to_string())
}

/// mermaid-cli (`mmdc`) with explicit width/height and scale.
async fn render_with_cli(
    mermaid_code: &str,
    width: u32,
    height: u32,
    resolution: u32,
) -> Result<String, String> {
    let mmdc = find_program(&["mmdc"]).await.ok_or("mmdc not installed")?;

    let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
    let input_path = dir.path().join("diagram.mmd");
    let output_path = std::env::temp_dir().join(format!("diagram-{}.png", uuid_suffix()));
    std::fs::write(&input_path, mermaid_code).map_err(|e| e.to_string())?;

    let output = tokio::time::timeout(
        Duration::from_secs(30),
        Command::new(&mmdc)
            .arg("-i")
            .arg(&input_path)
            .arg("-o")
            .arg(&output_path)
            .arg("-w")
            .arg(width.to_string())
            .arg("-H")
            .arg(height.to_string())
            .arg("--scale")
            .arg(resolution.to_string())
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| "mmdc timed out".to_string())?
    .map_err(|e| e.to_string())?;

    if !output.status.success() || !output_path.exists() {
        return Err(format!(
            "mmdc exited {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    Ok(output_path.display().to_string())
}

/// mermaid.ink remote rendering: the code travels URL-safe base64 in the
/// path. Low resolution, but needs nothing installed.
async fn render_with_ink(mermaid_code: &str) -> Result<String, String> {
    let encoded = base64::engine::general_purpose::URL_SAFE.encode(mermaid_code);
    let url = format!("https://mermaid.ink/img/{}", encoded);

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(3))
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| e.to_string())?;
    let response = client.get(&url).send().await.map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("mermaid.ink returned {}", response.status()));
    }
    Ok(url)
}

async fn find_program(candidates: &[&str]) -> Option<String> {
    for candidate in candidates {
        let found = Command::new("which")
            .arg(candidate)
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false);
        if found {
            return Some(candidate.to_string());
        }
    }
    None
}

fn uuid_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_fallback_metadata() {
        let outcome = RenderOutcome {
            content: "```mermaid\ngraph TD\n```".into(),
            rendered: false,
            method: "code".into(),
            width: None,
            height: None,
            resolution: None,
        };
        let meta = outcome.metadata();
        assert_eq!(meta["rendered"], serde_json::json!(false));
        assert_eq!(meta["method"], "code");
        assert!(meta.get("width").is_none());
    }

    #[test]
    fn escapes_html() {
        assert_eq!(html_escape("A --> B<i>"), "A --&gt; B&lt;i&gt;");
    }
}
