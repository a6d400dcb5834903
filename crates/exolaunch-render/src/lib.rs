//! Template rendering for exolaunch.
//!
//! Chroma input files and Slurm scripts are produced by filling strict
//! templates: every variable a template uses must be supplied, otherwise
//! rendering fails with [`RenderError::MissingParameter`].

pub mod builtin;
pub mod template;

pub use template::{RenderError, Template, display};

use camino::Utf8Path;
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Merged parameters handed to a template.
pub type Params = BTreeMap<String, Value>;

/// File extension of template files in an override directory.
pub const TEMPLATE_EXTENSION: &str = "j2";

/// Registry of parsed templates keyed by id (e.g. `eigs.xml`, `peram.sh`).
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    templates: BTreeMap<String, Template>,
}

impl Renderer {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the templates compiled into the binary.
    pub fn builtin() -> Result<Self, RenderError> {
        let mut renderer = Self::new();
        for (id, source) in builtin::TEMPLATES {
            renderer.insert(id, source)?;
        }
        Ok(renderer)
    }

    /// Builtin templates, overridden or extended by `<id>.j2` files in `dir`.
    pub fn with_overrides(dir: &Utf8Path) -> Result<Self, RenderError> {
        let mut renderer = Self::builtin()?;
        renderer.load_dir(dir)?;
        Ok(renderer)
    }

    /// Parse and register a template, replacing any previous one.
    pub fn insert(&mut self, id: &str, source: &str) -> Result<(), RenderError> {
        let template = Template::parse(id, source)?;
        self.templates.insert(id.to_string(), template);
        Ok(())
    }

    /// Register every `<id>.j2` file in a directory.
    pub fn load_dir(&mut self, dir: &Utf8Path) -> Result<usize, RenderError> {
        let read_err = |e: std::io::Error| RenderError::Read {
            path: dir.to_string(),
            message: e.to_string(),
        };
        let mut loaded = 0;
        let mut entries: Vec<_> = dir
            .read_dir_utf8()
            .map_err(read_err)?
            .collect::<Result<_, _>>()
            .map_err(read_err)?;
        entries.sort_by(|a, b| a.file_name().cmp(b.file_name()));

        for entry in entries {
            let path = entry.path();
            let Some(id) = entry
                .file_name()
                .strip_suffix(&format!(".{}", TEMPLATE_EXTENSION))
            else {
                continue;
            };
            let source = std::fs::read_to_string(path).map_err(|e| RenderError::Read {
                path: path.to_string(),
                message: e.to_string(),
            })?;
            if self.templates.contains_key(id) {
                tracing::info!("Template {} overridden by {}", id, path);
            }
            self.insert(id, &source)?;
            loaded += 1;
        }

        Ok(loaded)
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.get(id)
    }

    /// Registered template ids, sorted.
    pub fn template_ids(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    /// Render template `id` with the merged parameters.
    pub fn render_config(&self, id: &str, params: &Params) -> Result<String, RenderError> {
        self.get(id)
            .ok_or_else(|| RenderError::UnknownTemplate(id.to_string()))?
            .render(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_templates_parse() {
        let renderer = Renderer::builtin().unwrap();
        for id in ["eigs.xml", "peram.xml", "meson.xml", "disco.xml", "eigs.sh", "peram.sh"] {
            assert!(renderer.get(id).is_some(), "missing builtin {}", id);
        }
    }

    #[test]
    fn test_unknown_template() {
        let renderer = Renderer::new();
        assert_eq!(
            renderer.render_config("nope.xml", &Params::new()),
            Err(RenderError::UnknownTemplate("nope.xml".to_string()))
        );
    }

    #[test]
    fn test_eigs_without_parameters_fails() {
        let renderer = Renderer::builtin().unwrap();
        let params = Params::new();
        let err = renderer.render_config("eigs.xml", &params).unwrap_err();
        assert!(matches!(err, RenderError::MissingParameter { .. }));
    }

    #[test]
    fn test_override_directory() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        std::fs::write(dir.join("eigs.xml.j2"), "custom {{ NL }}").unwrap();
        std::fs::write(dir.join("extra.sh.j2"), "echo {{ msg }}").unwrap();
        std::fs::write(dir.join("README.md"), "ignored").unwrap();

        let renderer = Renderer::with_overrides(&dir).unwrap();
        let mut params = Params::new();
        params.insert("NL".to_string(), Value::from(24));
        params.insert("msg".to_string(), Value::from("hi"));
        let render = |id: &str| renderer.render_config(id, &params).unwrap();
        assert_eq!(render("eigs.xml"), "custom 24");
        assert_eq!(render("extra.sh"), "echo hi");
        assert!(renderer.get("README.md").is_none());
    }

    #[test]
    fn test_load_dir_counts_templates() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        std::fs::write(dir.join("b.sh.j2"), "{{ b }}").unwrap();
        std::fs::write(dir.join("a.xml.j2"), "{{ a }}").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let mut renderer = Renderer::new();
        assert_eq!(renderer.load_dir(&dir).unwrap(), 2);
        assert_eq!(renderer.template_ids(), vec!["a.xml", "b.sh"]);
    }

    #[test]
    fn test_missing_override_directory() {
        let mut renderer = Renderer::new();
        let err = renderer
            .load_dir(Utf8Path::new("/nonexistent/templates"))
            .unwrap_err();
        assert!(matches!(err, RenderError::Read { .. }));
    }
}
