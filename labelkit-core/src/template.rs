//! Templates, preview targets and render payloads

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LabelError, Result};

/// Filename used when the template has no body file yet
pub const DEFAULT_TEMPLATE_FILENAME: &str = "template.html";

/// Printable artifact definition as served by the template detail endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Template {
    pub pk: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Location of the template body file
    #[serde(default)]
    pub template: Option<String>,
    pub model_type: String,
    /// Comma separated `key=value` pairs restricting renderable instances
    #[serde(default)]
    pub filters: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Template {
    /// Last path segment of the body location
    pub fn filename(&self) -> Option<&str> {
        self.template
            .as_deref()
            .map(|url| url.split(['?', '#']).next().unwrap_or(url))
            .and_then(|path| path.rsplit('/').next())
            .filter(|name| !name.is_empty())
    }

    /// Filename to use when uploading an edited body
    pub fn upload_filename(&self) -> &str {
        self.filename().unwrap_or(DEFAULT_TEMPLATE_FILENAME)
    }

    /// Parsed filter pairs, skipping malformed entries
    pub fn filter_pairs(&self) -> Vec<(String, String)> {
        self.filters
            .split(',')
            .filter_map(|pair| {
                let (key, value) = pair.split_once('=')?;
                let key = key.trim();
                if key.is_empty() {
                    return None;
                }
                Some((key.to_string(), value.trim().to_string()))
            })
            .collect()
    }
}

/// Which family of templates is being edited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Label,
    Report,
}

impl TemplateKind {
    fn segment(&self) -> &'static str {
        match self {
            TemplateKind::Label => "label",
            TemplateKind::Report => "report",
        }
    }

    /// Detail endpoint for a template of this kind
    pub fn template_path(&self, pk: u64) -> String {
        format!("/{}/template/{}/", self.segment(), pk)
    }

    /// Print trigger endpoint for this kind
    pub fn print_path(&self) -> String {
        format!("/{}/print/", self.segment())
    }
}

impl FromStr for TemplateKind {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "label" => Ok(TemplateKind::Label),
            "report" => Ok(TemplateKind::Report),
            other => Err(LabelError::config(format!(
                "Unknown template kind '{}', expected 'label' or 'report'",
                other
            ))),
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// Everything a preview area needs to know about the template being edited
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub template: Template,
    pub kind: TemplateKind,
    /// Template CRUD URL used for body uploads
    pub template_url: String,
    /// Render/print trigger URL
    pub printing_url: String,
}

impl TemplateContext {
    /// Build the context using the standard endpoints under `api_prefix`
    pub fn new(template: Template, kind: TemplateKind, api_prefix: &str) -> Self {
        let prefix = api_prefix.trim_end_matches('/');
        Self {
            template_url: format!("{}{}", prefix, kind.template_path(template.pk)),
            printing_url: format!("{}{}", prefix, kind.print_path()),
            template,
            kind,
        }
    }
}

/// Record selected to render the template against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviewTarget {
    /// Render scoped to the whole model type
    Aggregate,
    Instance(u64),
}

impl FromStr for PreviewTarget {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("aggregate") {
            return Ok(PreviewTarget::Aggregate);
        }
        s.parse::<u64>()
            .map(PreviewTarget::Instance)
            .map_err(|_| LabelError::config(format!("Invalid preview target '{}'", s)))
    }
}

impl fmt::Display for PreviewTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviewTarget::Aggregate => f.write_str("aggregate"),
            PreviewTarget::Instance(pk) => write!(f, "{}", pk),
        }
    }
}

/// Body of a render/print trigger request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RenderPayload {
    Items { items: Vec<u64>, template: u64 },
    ModelType { model_type: String, template: u64 },
}

impl RenderPayload {
    pub fn for_target(target: &PreviewTarget, template: &Template) -> Self {
        match target {
            PreviewTarget::Aggregate => RenderPayload::ModelType {
                model_type: template.model_type.clone(),
                template: template.pk,
            },
            PreviewTarget::Instance(pk) => RenderPayload::Items {
                items: vec![*pk],
                template: template.pk,
            },
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// List endpoint for the instances of a model type
pub fn model_list_path(model_type: &str) -> Option<&'static str> {
    match model_type {
        "part" => Some("/part/"),
        "stockitem" => Some("/stock/"),
        "stocklocation" => Some("/stock/location/"),
        "build" => Some("/build/"),
        "buildline" => Some("/build/line/"),
        "purchaseorder" => Some("/order/po/"),
        "salesorder" => Some("/order/so/"),
        "returnorder" => Some("/order/ro/"),
        "salesordershipment" => Some("/order/so/shipment/"),
        _ => None,
    }
}

/// Entry in the preview target picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewTargetOption {
    pub pk: u64,
    pub label: String,
}

impl PreviewTargetOption {
    /// Build an option from a list row, picking the most descriptive field
    pub fn from_row(row: &serde_json::Value) -> Option<Self> {
        let pk = row.get("pk").and_then(|v| v.as_u64())?;
        let label = ["full_name", "name", "reference", "serial", "title"]
            .iter()
            .find_map(|key| {
                row.get(*key)
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
            })
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", pk));
        Some(Self { pk, label })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> Template {
        Template {
            pk: 42,
            name: "Stock label".to_string(),
            description: String::new(),
            template: Some("/media/label/template/stock_label.html".to_string()),
            model_type: "stockitem".to_string(),
            filters: "part=3, status = 10,broken".to_string(),
            enabled: true,
        }
    }

    #[test]
    fn test_filename_and_default() {
        let mut t = template();
        assert_eq!(t.upload_filename(), "stock_label.html");

        t.template = None;
        assert_eq!(t.upload_filename(), DEFAULT_TEMPLATE_FILENAME);

        t.template = Some("/media/label/".to_string());
        assert_eq!(t.upload_filename(), DEFAULT_TEMPLATE_FILENAME);
    }

    #[test]
    fn test_filter_pairs() {
        assert_eq!(
            template().filter_pairs(),
            vec![
                ("part".to_string(), "3".to_string()),
                ("status".to_string(), "10".to_string())
            ]
        );
    }

    #[test]
    fn test_aggregate_payload_uses_model_type() {
        let payload = RenderPayload::for_target(&"aggregate".parse().unwrap(), &template());
        assert_eq!(
            payload.to_json(),
            serde_json::json!({"model_type": "stockitem", "template": 42})
        );
    }

    #[test]
    fn test_instance_payload_uses_items() {
        let payload = RenderPayload::for_target(&"7".parse().unwrap(), &template());
        assert_eq!(
            payload.to_json(),
            serde_json::json!({"items": [7], "template": 42})
        );
        assert!("seven".parse::<PreviewTarget>().is_err());
    }

    #[test]
    fn test_context_endpoints() {
        let ctx = TemplateContext::new(template(), TemplateKind::Label, "/api/");
        assert_eq!(ctx.template_url, "/api/label/template/42/");
        assert_eq!(ctx.printing_url, "/api/label/print/");

        let ctx = TemplateContext::new(template(), TemplateKind::Report, "/api");
        assert_eq!(ctx.printing_url, "/api/report/print/");
    }

    #[test]
    fn test_target_option_label() {
        let row = serde_json::json!({"pk": 5, "name": "", "reference": "PO-0005"});
        let option = PreviewTargetOption::from_row(&row).unwrap();
        assert_eq!(option.label, "PO-0005");
        let bare = PreviewTargetOption::from_row(&serde_json::json!({"pk": 9})).unwrap();
        assert_eq!(bare.label, "#9");
    }
}
