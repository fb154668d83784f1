//! Service self-description
//!
//! Every site registers a zero-argument describe procedure (by default
//! `system.describe`) returning a [`ServiceDescription`]:
//!
//! ```json
//! {
//!   "sdversion": "1.0",
//!   "name": "calculator",
//!   "id": "urn:uuid:0f9c...",
//!   "summary": "Arithmetic over JSON-RPC",
//!   "version": "1.0",
//!   "procs": [
//!     {
//!       "name": "add",
//!       "summary": "Add two numbers",
//!       "idempotent": true,
//!       "params": [{"name": "a", "type": "Number"}, {"name": "b", "type": "Number"}],
//!       "return": {"type": "Number"}
//!     }
//!   ]
//! }
//! ```
//!
//! The describe procedure never lists itself. Summaries are normalised with
//! [`trim_docstring`].

use crate::procedure::{CallContext, Handler, HandlerResult, Output, Procedure};
use crate::registry::{Registry, WeakRegistry};
use polyrpc_core::codec::{describe_params, ParamDescription};
use polyrpc_core::{Arguments, Error, TypeTag};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Version of the description format
pub const SD_VERSION: &str = "1.0";

const TAB_WIDTH: usize = 8;

/// Identity of a site, as shown in its description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: String,
    pub id: String,
    pub summary: String,
    pub version: String,
}

impl ServiceInfo {
    /// Identity with a fresh `urn:uuid:` id
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            id: format!("urn:uuid:{}", uuid::Uuid::new_v4()),
            summary: summary.into(),
            version: version.into(),
        }
    }
}

/// Description of the whole service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescription {
    pub sdversion: String,
    pub name: String,
    pub id: String,
    pub summary: String,
    pub version: String,
    pub procs: Vec<ProcedureDescription>,
}

/// Description of one procedure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureDescription {
    pub name: String,
    pub summary: String,
    pub idempotent: bool,
    pub params: Vec<ParamDescription>,
    #[serde(rename = "return")]
    pub returns: ReturnDescription,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnDescription {
    #[serde(rename = "type")]
    pub kind: TypeTag,
}

impl ProcedureDescription {
    pub fn of(procedure: &Procedure) -> Self {
        Self {
            name: procedure.name().to_string(),
            summary: trim_docstring(procedure.summary_text()),
            idempotent: procedure.is_safe(),
            params: describe_params(procedure.declared()),
            returns: ReturnDescription {
                kind: procedure.declared().return_type(),
            },
        }
    }
}

/// Describe a registry under the given identity
pub fn describe_service(info: &ServiceInfo, registry: &Registry) -> ServiceDescription {
    ServiceDescription {
        sdversion: SD_VERSION.to_string(),
        name: info.name.clone(),
        id: info.id.clone(),
        summary: trim_docstring(&info.summary),
        version: info.version.clone(),
        procs: registry
            .procedures()
            .iter()
            .filter(|procedure| !procedure.describes_site())
            .map(|procedure| ProcedureDescription::of(procedure))
            .collect(),
    }
}

/// Normalise a free-text summary
///
/// Tabs are expanded to 8-column stops. The common indentation of the
/// non-blank lines is removed; a first line that starts flush with the
/// margin does not count towards it. Trailing whitespace and leading and
/// trailing blank lines are dropped.
///
/// ```rust
/// use polyrpc_server::trim_docstring;
///
/// assert_eq!(trim_docstring("  Line1\n    Line2\n  "), "Line1\n  Line2");
/// assert_eq!(trim_docstring("Summary.\n\n    Details here.\n"), "Summary.\n\nDetails here.");
/// ```
pub fn trim_docstring(docstring: &str) -> String {
    if docstring.trim().is_empty() {
        return String::new();
    }

    let lines: Vec<String> = docstring.lines().map(expand_tabs).collect();

    let first_counts = lines.first().is_some_and(|first| indentation(first) > 0);
    let skip = if first_counts { 0 } else { 1 };
    let indent = lines
        .iter()
        .skip(skip)
        .filter(|line| !line.trim().is_empty())
        .map(|line| indentation(line))
        .min();

    let mut trimmed: Vec<String> = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        let kept = match (index, indent) {
            (0, _) => line.trim().to_string(),
            (_, Some(indent)) => line.chars().skip(indent).collect::<String>().trim_end().to_string(),
            (_, None) => line.trim_end().to_string(),
        };
        trimmed.push(kept);
    }

    while trimmed.last().is_some_and(|line| line.is_empty()) {
        trimmed.pop();
    }
    let leading = trimmed.iter().take_while(|line| line.is_empty()).count();

    trimmed[leading..].join("\n")
}

fn indentation(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

fn expand_tabs(line: &str) -> String {
    let mut expanded = String::with_capacity(line.len());
    let mut column = 0;
    for c in line.chars() {
        if c == '\t' {
            let pad = TAB_WIDTH - column % TAB_WIDTH;
            expanded.extend(std::iter::repeat(' ').take(pad));
            column += pad;
        } else {
            expanded.push(c);
            column += 1;
        }
    }
    expanded
}

/// Handler behind the describe procedure
///
/// Holds the registry weakly: the registry owns this handler, so a strong
/// reference would keep both alive forever.
pub struct DescribeHandler {
    info: Arc<ServiceInfo>,
    registry: WeakRegistry,
}

impl DescribeHandler {
    pub fn new(info: Arc<ServiceInfo>, registry: &Registry) -> Self {
        Self {
            info,
            registry: registry.downgrade(),
        }
    }

    /// Procedure registering this handler under `method`
    pub fn procedure(self, method: impl Into<String>) -> Procedure {
        Procedure::new(method, Box::new(self))
            .returns(TypeTag::Object)
            .summary("Describe the service and the procedures it offers")
            .safe(true)
            .describing_site()
    }
}

impl Handler for DescribeHandler {
    fn call(&self, _ctx: CallContext, _args: Arguments) -> HandlerResult {
        let described = self
            .registry
            .upgrade()
            .ok_or_else(|| Error::Internal("registry no longer exists".to_string()))
            .and_then(|registry| {
                serde_json::to_value(describe_service(&self.info, &registry)).map_err(Error::from)
            });
        Box::pin(async move { described.map(Output::Value) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::from_fn;
    use serde_json::json;

    #[test]
    fn test_trim_docstring_indented_first_line() {
        assert_eq!(trim_docstring("  Line1\n    Line2\n  "), "Line1\n  Line2");
    }

    #[test]
    fn test_trim_docstring_flush_first_line() {
        let doc = "Add two numbers.\n\n        Both must be integers.\n          Overflow wraps.\n    ";
        assert_eq!(
            trim_docstring(doc),
            "Add two numbers.\n\nBoth must be integers.\n  Overflow wraps."
        );
    }

    #[test]
    fn test_trim_docstring_edge_cases() {
        assert_eq!(trim_docstring(""), "");
        assert_eq!(trim_docstring("   \n  \n"), "");
        assert_eq!(trim_docstring("one line  "), "one line");
        assert_eq!(trim_docstring("\n\n  body\n"), "body");
        assert_eq!(trim_docstring("x\n\tindented"), "x\nindented");
    }

    #[test]
    fn test_expand_tabs() {
        assert_eq!(expand_tabs("\tx"), "        x");
        assert_eq!(expand_tabs("ab\tx"), "ab      x");
    }

    fn site_registry() -> (Registry, Arc<ServiceInfo>) {
        let registry = Registry::new();
        let info = Arc::new(ServiceInfo::new("calculator", "2.1", "Arithmetic"));
        registry.register(
            Procedure::new("add", from_fn(|_, _| async { Ok(json!(0)) }))
                .param("a", TypeTag::Number)
                .param("b", TypeTag::Number)
                .returns(TypeTag::Number)
                .summary("Add two numbers")
                .safe(true),
        );
        registry.register(DescribeHandler::new(Arc::clone(&info), &registry).procedure("system.describe"));
        (registry, info)
    }

    #[test]
    fn test_describe_service_excludes_itself() {
        let (registry, info) = site_registry();
        let described = describe_service(&info, &registry);

        assert_eq!(described.sdversion, "1.0");
        assert_eq!(described.name, "calculator");
        assert!(described.id.starts_with("urn:uuid:"));
        assert_eq!(described.procs.len(), 1);
        assert_eq!(described.procs[0].name, "add");
        assert!(registry.contains("system.describe"));
    }

    #[test]
    fn test_procedure_description_wire_shape() {
        let (registry, info) = site_registry();
        let described = serde_json::to_value(describe_service(&info, &registry)).unwrap();

        assert_eq!(
            described["procs"][0],
            json!({
                "name": "add",
                "summary": "Add two numbers",
                "idempotent": true,
                "params": [{"name": "a", "type": "Number"}, {"name": "b", "type": "Number"}],
                "return": {"type": "Number"}
            })
        );
    }

    #[tokio::test]
    async fn test_describe_handler() {
        let (registry, info) = site_registry();
        let procedure = registry.get("system.describe").unwrap();
        assert!(procedure.describes_site());

        let output = procedure
            .handler()
            .call(CallContext::new(), Arguments::default())
            .await
            .unwrap();
        match output {
            Output::Value(value) => assert_eq!(value["id"], json!(info.id)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_service_ids_are_unique() {
        let a = ServiceInfo::new("a", "1.0", "");
        let b = ServiceInfo::new("a", "1.0", "");
        assert_ne!(a.id, b.id);
    }
}
