//! Theme engine
//!
//! Template rendering using Tera.
//! Features:
//! - Built-in templates embedded in the binary
//! - On-disk themes (`themes/<name>/*.html`) overriding built-in templates by name
//! - Templates a theme does not provide fall back to the built-in set
//! - Standard template variables shared by every page

use anyhow::{Context, Result};
use rust_embed::RustEmbed;
use serde::Serialize;
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera};

use crate::models::Topic;

mod error;

pub use error::ThemeError;

/// Templates compiled into the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Theme engine for rendering templates
pub struct ThemeEngine {
    tera: Tera,
    /// Directory holding on-disk themes
    themes_path: PathBuf,
    /// Active theme; `None` when only built-in templates are loaded
    current_theme: Option<String>,
}

impl ThemeEngine {
    /// Create a theme engine with the built-in templates, overridden by
    /// `themes_path/<active>` when that directory exists.
    pub fn new(themes_path: &Path, active: &str) -> Result<Self> {
        let mut engine = Self {
            tera: load_templates(None)?,
            themes_path: themes_path.to_path_buf(),
            current_theme: None,
        };

        if let Err(e) = engine.set_theme(active) {
            tracing::warn!(
                "Theme '{}' not loaded ({}), using built-in templates",
                active,
                e
            );
        }

        Ok(engine)
    }

    /// Engine with only the built-in templates
    pub fn embedded() -> Result<Self> {
        Ok(Self {
            tera: load_templates(None)?,
            themes_path: PathBuf::new(),
            current_theme: None,
        })
    }

    /// Render a template
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            let mut error_msg = format!("Failed to render '{}': {}", template, e);
            let mut source = e.source();
            while let Some(s) = source {
                error_msg.push_str(&format!("\n  Caused by: {}", s));
                source = s.source();
            }
            ThemeError::TemplateError(error_msg).into()
        })
    }

    /// Render a template with the standard variables added to `context`
    pub fn render_with_standard_vars(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String> {
        let mut full_context = context.clone();
        standard_vars.insert_into(&mut full_context);
        full_context.insert("theme_name", self.get_current_theme());
        self.render(template, &full_context)
    }

    /// Switch to an on-disk theme
    ///
    /// Templates the theme does not provide are taken from the built-in set.
    pub fn set_theme(&mut self, theme_name: &str) -> Result<()> {
        let theme_path = self.get_theme_path(theme_name);
        if !theme_path.is_dir() {
            return Err(ThemeError::NotFound(theme_name.to_string()).into());
        }

        self.tera = load_templates(Some(&theme_path))?;
        if self.current_theme.as_deref() != Some(theme_name) {
            tracing::info!("Switched to theme '{}'", theme_name);
        }
        self.current_theme = Some(theme_name.to_string());
        Ok(())
    }

    /// Name of the active theme, `"default"` for the built-in templates
    pub fn get_current_theme(&self) -> &str {
        self.current_theme.as_deref().unwrap_or("default")
    }

    pub fn get_theme_path(&self, theme_name: &str) -> PathBuf {
        self.themes_path.join(theme_name)
    }

}

/// Built-in templates, with `.html` files under `theme_path` replacing
/// or adding to them by relative name.
fn load_templates(theme_path: Option<&Path>) -> Result<Tera> {
    let mut templates: Vec<(String, String)> = Vec::new();

    for name in EmbeddedTemplates::iter() {
        let Some(file) = EmbeddedTemplates::get(&name) else {
            continue;
        };
        let content = String::from_utf8(file.data.into_owned())
            .map_err(|_| ThemeError::TemplateError(format!("Template {} is not UTF-8", name)))?;
        templates.push((name.to_string(), content));
    }

    if let Some(theme_path) = theme_path {
        let mut overrides = Vec::new();
        collect_templates_from_dir(theme_path, theme_path, &mut overrides)?;
        for (name, content) in overrides {
            match templates.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = content,
                None => templates.push((name, content)),
            }
        }
    }

    let mut tera = Tera::default();
    tera.add_raw_templates(templates)
        .map_err(|e| ThemeError::TemplateError(format!("Failed to load templates: {}", e)))?;
    Ok(tera)
}

fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<()> {
    for entry in fs::read_dir(current_path).map_err(ThemeError::IoError)? {
        let path = entry.map_err(ThemeError::IoError)?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative_path = path
                .strip_prefix(base_path)
                .map_err(|_| ThemeError::TemplateError("Failed to get relative path".to_string()))?;
            let template_name = relative_path.to_string_lossy().replace('\\', "/");
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;
            templates.push((template_name, content));
        }
    }
    Ok(())
}

/// Last-resort error page used when no template can be rendered
pub fn simple_error_page(title: &str, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <style>
        body {{ font-family: sans-serif; max-width: 600px; margin: 50px auto; padding: 20px; }}
        h1 {{ color: #b3261e; }}
    </style>
</head>
<body>
    <h1>{title}</h1>
    <p>{message}</p>
    <p><a href="/">Back to the home page</a></p>
</body>
</html>"#,
        title = escape_html(title),
        message = escape_html(message)
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Variables every page template receives
#[derive(Debug, Clone, Serialize)]
pub struct StandardTemplateVars {
    pub site_name: String,
    pub site_description: String,
    /// Current request path
    pub request_path: String,
    /// Current year (for copyright)
    pub year: i32,
    /// Sidebar topics, most used first
    pub top_topics: Vec<Topic>,
}

impl StandardTemplateVars {
    pub fn new(
        site_name: impl Into<String>,
        site_description: impl Into<String>,
        request_path: impl Into<String>,
        year: i32,
    ) -> Self {
        Self {
            site_name: site_name.into(),
            site_description: site_description.into(),
            request_path: request_path.into(),
            year,
            top_topics: Vec::new(),
        }
    }

    pub fn with_top_topics(mut self, topics: Vec<Topic>) -> Self {
        self.top_topics = topics;
        self
    }

    fn insert_into(&self, context: &mut TeraContext) {
        context.insert("site_name", &self.site_name);
        context.insert("site_description", &self.site_description);
        context.insert("request_path", &self.request_path);
        context.insert("year", &self.year);
        context.insert("top_topics", &self.top_topics);
    }
}
