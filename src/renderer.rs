//! Template renderer and rendering functionality for textbake.
//! Templates are loaded from a recipe's template folder and rendered with
//! MiniJinja, with the IP filters registered.
use crate::encoding;
use crate::error::{Error, Result};
use crate::filters::add_ip_filters;
use log::debug;
use minijinja::{Environment, ErrorKind};
use std::path::{Component, Path, PathBuf};

/// Trait for template rendering engines.
pub trait TemplateRenderer {
    /// Renders the named template with the given context.
    ///
    /// # Arguments
    /// * `template_name` - Name of the template, relative to the template folder
    /// * `context` - Context variables for rendering
    ///
    /// # Returns
    /// * `Result<String>` - Rendered template string
    fn render(&self, template_name: &str, context: &serde_json::Value) -> Result<String>;
}

/// Validates that `folder` exists and is a directory.
///
/// # Errors
/// * `Error::TemplateFolderError` otherwise
pub fn check_template_folder<P: AsRef<Path>>(folder: P) -> Result<PathBuf> {
    let folder = folder.as_ref();
    if !folder.exists() {
        return Err(Error::TemplateFolderError {
            folder: folder.to_path_buf(),
            reason: "does not exist".to_string(),
        });
    }
    if !folder.is_dir() {
        return Err(Error::TemplateFolderError {
            folder: folder.to_path_buf(),
            reason: "is not a directory".to_string(),
        });
    }
    Ok(folder.to_path_buf())
}

/// Joins a template name onto the folder, refusing names that escape it.
fn template_path(folder: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        .then(|| folder.join(relative))
}

/// MiniJinja-based template rendering engine.
pub struct MiniJinjaRenderer {
    /// MiniJinja environment instance
    env: Environment<'static>,
}

impl MiniJinjaRenderer {
    /// Creates an environment with filters but no templates.
    pub fn new() -> Self {
        let mut env = Environment::new();
        add_ip_filters(&mut env);
        Self { env }
    }

    /// Creates an environment loading templates from `folder`, decoded with `encoding_label`.
    ///
    /// # Errors
    /// * `Error::TemplateFolderError` if the folder is missing or not a directory
    /// * `Error::EncodingError` if the encoding label is unknown
    pub fn from_folder<P: AsRef<Path>>(folder: P, encoding_label: &str) -> Result<Self> {
        let folder = check_template_folder(folder)?;
        encoding::lookup(encoding_label)?;
        let label = encoding_label.to_string();

        let mut renderer = Self::new();
        renderer.env.set_loader(move |name| {
            let Some(path) = template_path(&folder, name) else {
                return Ok(None);
            };
            if !path.is_file() {
                return Ok(None);
            }
            debug!("Loading template {}", path.display());
            encoding::read_to_string(&path, &label).map(Some).map_err(|e| {
                minijinja::Error::new(ErrorKind::InvalidOperation, "could not read template")
                    .with_source(e)
            })
        });
        Ok(renderer)
    }

    /// Registers an inline template, mostly useful for tests and ad-hoc rendering.
    pub fn add_template(&mut self, name: &str, source: &str) -> Result<()> {
        self.env
            .add_template_owned(name.to_string(), source.to_string())
            .map_err(Error::MinijinjaError)
    }
}

impl Default for MiniJinjaRenderer {
    fn default() -> Self {
        MiniJinjaRenderer::new()
    }
}

impl TemplateRenderer for MiniJinjaRenderer {
    /// Renders a template using MiniJinja.
    ///
    /// # Errors
    /// * `Error::MinijinjaError` if:
    ///   - Template lookup or loading fails
    ///   - Template rendering fails
    fn render(&self, template_name: &str, context: &serde_json::Value) -> Result<String> {
        let tmpl = self.env.get_template(template_name).map_err(Error::MinijinjaError)?;

        tmpl.render(context).map_err(Error::MinijinjaError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_inline_template() {
        let mut renderer = MiniJinjaRenderer::new();
        renderer.add_template("hello", "Hello {{ name }}!").unwrap();
        let result = renderer.render("hello", &serde_json::json!({"name": "test"})).unwrap();
        assert_eq!(result, "Hello test!");
    }

    #[test]
    fn test_folder_templates() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.j2"), "{% include 'b.j2' %}-{{ v }}").unwrap();
        fs::write(dir.path().join("b.j2"), "b").unwrap();

        let renderer = MiniJinjaRenderer::from_folder(dir.path(), "utf-8").unwrap();
        let result = renderer.render("a.j2", &serde_json::json!({"v": 1})).unwrap();
        assert_eq!(result, "b-1");
        assert!(renderer.render("missing.j2", &serde_json::json!({})).is_err());
        assert!(renderer.render("../a.j2", &serde_json::json!({})).is_err());
    }

    #[test]
    fn test_folder_checks() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        assert!(matches!(
            MiniJinjaRenderer::from_folder(dir.path().join("nope"), "utf-8"),
            Err(Error::TemplateFolderError { .. })
        ));
        assert!(matches!(
            MiniJinjaRenderer::from_folder(&file, "utf-8"),
            Err(Error::TemplateFolderError { .. })
        ));
    }

    #[test]
    fn test_template_encoding() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("t.j2"), [0x63, 0x61, 0x66, 0xe9]).unwrap();
        let renderer = MiniJinjaRenderer::from_folder(dir.path(), "latin1").unwrap();
        assert_eq!(renderer.render("t.j2", &serde_json::json!({})).unwrap(), "café");
    }
}
