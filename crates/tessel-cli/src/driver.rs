/// Render driver: template file + JSON data in, HTML out

use std::fs;
use std::path::PathBuf;

use tessel_bind::repeater::TEMPLATE_ATTR;
use tessel_bind::{bootstrap_with, Registry};
use tessel_dom::{normalize, parse_fragment, Node};
use tessel_expr::{assign, Object, Value};
use tracing::{debug, info};

use crate::error::{RenderError, Result};

/// Render output
#[derive(Debug, Clone)]
pub struct RenderOutput {
    /// Template file that was rendered
    pub source_file: PathBuf,
    /// Rendered (or only normalized) markup
    pub html: String,
    /// Widgets bound on the root scope; 0 when only normalizing
    pub widgets: usize,
}

/// Options for rendering
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Input template file
    pub input: PathBuf,
    /// JSON object seeding the root scope
    pub data_file: Option<PathBuf>,
    /// `key=value` overrides applied after the data file, in order
    pub overrides: Vec<(String, String)>,
    /// Output file (stdout when absent)
    pub output: Option<PathBuf>,
    /// Stop after normalization
    pub normalize_only: bool,
    /// Whether to log debug output
    pub verbose: bool,
}

impl RenderOptions {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            data_file: None,
            overrides: Vec::new(),
            output: None,
            normalize_only: false,
            verbose: false,
        }
    }

    pub fn data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_file = Some(path.into());
        self
    }

    /// Set `key` (a getter path such as `user.name`) to `value`. The value
    /// is read as JSON, falling back to a plain string.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn normalize_only(mut self, normalize_only: bool) -> Self {
        self.normalize_only = normalize_only;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Split a `KEY=VALUE` command line argument.
pub fn parse_override(arg: &str) -> Result<(String, String)> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(RenderError::InvalidSet(arg.to_string())),
    }
}

/// The tessel renderer
pub struct Renderer {
    options: RenderOptions,
    registry: Registry,
}

impl Renderer {
    /// Create a renderer with the stock directives
    pub fn new(options: RenderOptions) -> Result<Self> {
        Ok(Self::with_registry(options, Registry::with_defaults()?))
    }

    /// Create a renderer with a custom registry (extra directives, filters
    /// or controllers)
    pub fn with_registry(options: RenderOptions, registry: Registry) -> Self {
        Self { options, registry }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run the pipeline: parse, seed data, normalize, bind, serialize
    pub fn render(&self) -> Result<RenderOutput> {
        let root = self.parse()?;

        if self.options.normalize_only {
            normalize(&root).map_err(|source| self.markup_error(source))?;
            info!(file = %self.options.input.display(), "normalized");
            return Ok(RenderOutput {
                source_file: self.options.input.clone(),
                html: root.inner_html(),
                widgets: 0,
            });
        }

        let data = self.load_data()?;
        let scope = bootstrap_with(&root, &self.registry, data)?;
        info!(
            file = %self.options.input.display(),
            widgets = scope.widget_count(),
            "rendered"
        );

        Ok(RenderOutput {
            source_file: self.options.input.clone(),
            html: strip_templates(&root).inner_html(),
            widgets: scope.widget_count(),
        })
    }

    /// Render and write to the configured output, returning the output
    pub fn run(&self) -> Result<RenderOutput> {
        let output = self.render()?;
        if let Some(path) = &self.options.output {
            fs::write(path, &output.html).map_err(|source| RenderError::io(path, source))?;
            debug!(path = %path.display(), bytes = output.html.len(), "wrote output");
        }
        Ok(output)
    }

    /// Parse the template under a synthetic `<div>` root so that documents
    /// with several top-level elements are accepted.
    fn parse(&self) -> Result<Node> {
        let source =
            fs::read_to_string(&self.options.input).map_err(|source| RenderError::io(&self.options.input, source))?;
        let nodes = parse_fragment(&source).map_err(|source| self.markup_error(source))?;
        debug!(nodes = nodes.len(), "parsed template");

        let root = Node::element("div");
        for node in &nodes {
            root.append_child(node);
        }
        Ok(root)
    }

    fn load_data(&self) -> Result<Object> {
        let data = match &self.options.data_file {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|source| RenderError::io(path, source))?;
                let value = Value::from_json(&text).map_err(|source| RenderError::Data {
                    file: path.clone(),
                    source,
                })?;
                match value {
                    Value::Object(object) => object,
                    _ => return Err(RenderError::DataNotObject(path.clone())),
                }
            }
            None => Object::new(),
        };

        for (key, raw) in &self.options.overrides {
            let value = Value::from_json(raw).unwrap_or_else(|_| Value::from(raw.as_str()));
            debug!(key = %key, value = %value, "override");
            assign(key, value, &data)?;
        }
        Ok(data)
    }

    fn markup_error(&self, source: tessel_dom::MarkupError) -> RenderError {
        RenderError::Markup {
            file: self.options.input.clone(),
            source,
        }
    }
}

/// Copy of `root` without the retained repeater templates.
fn strip_templates(root: &Node) -> Node {
    let copy = root.clone_node(true);
    let mut templates = Vec::new();
    copy.walk_elements(&mut |element| {
        if element.has_attribute(TEMPLATE_ATTR) {
            templates.push(element.clone());
        }
    });
    for template in templates {
        template.detach();
    }
    copy
}
