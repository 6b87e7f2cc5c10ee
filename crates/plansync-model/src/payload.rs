//! Planning document payload
//!
//! The persistence layer only cares about the minimal shape of a document:
//! a list of work items, a list of swimlanes and the camera/view state.
//! Everything inside a work item or swimlane, and any extra top-level field,
//! is carried through untouched.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current payload schema version
pub const PLAN_DOCUMENT_VERSION: u32 = 1;

/// Opaque work item (a JSON object)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItem(Map<String, Value>);

impl WorkItem {
    /// Wrap a JSON object
    #[inline]
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Item identifier, when the document gives one
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// All fields
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Opaque swimlane (a JSON object)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Swimlane(Map<String, Value>);

impl Swimlane {
    /// Wrap a JSON object
    #[inline]
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// All fields
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Camera/view state of the canvas (a JSON object)
///
/// `x`, `y` and `zoom` must be numbers when present; every field,
/// including ones this layer does not know, is kept as given.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraState(Map<String, Value>);

impl CameraState {
    /// Wrap a JSON object
    #[inline]
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    #[inline]
    #[must_use]
    pub fn x(&self) -> Option<f64> {
        self.0.get("x").and_then(Value::as_f64)
    }

    #[inline]
    #[must_use]
    pub fn y(&self) -> Option<f64> {
        self.0.get("y").and_then(Value::as_f64)
    }

    #[inline]
    #[must_use]
    pub fn zoom(&self) -> Option<f64> {
        self.0.get("zoom").and_then(Value::as_f64)
    }

    /// All fields
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Planning document payload
///
/// Optional top-level keys stay absent when the source omits them, so
/// encoding a decoded document gives back the raw project data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDocument {
    /// Schema version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Work items
    pub tasks: Vec<WorkItem>,
    /// Swimlanes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swimlanes: Option<Vec<Swimlane>>,
    /// View state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraState>,
    /// Fields this layer does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlanDocument {
    /// Document with no work items
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: Some(PLAN_DOCUMENT_VERSION),
            tasks: Vec::new(),
            swimlanes: None,
            camera: None,
            extra: Map::new(),
        }
    }

    /// Schema version, [`PLAN_DOCUMENT_VERSION`] when the document has none
    #[inline]
    #[must_use]
    pub fn schema_version(&self) -> u32 {
        self.version.unwrap_or(PLAN_DOCUMENT_VERSION)
    }

    /// Swimlanes, empty when the document has none
    #[inline]
    #[must_use]
    pub fn swimlanes(&self) -> &[Swimlane] {
        self.swimlanes.as_deref().unwrap_or_default()
    }

    /// Validate the shape of raw project data and decode it
    ///
    /// Only structure is checked: `tasks` must be a list of objects,
    /// `swimlanes` (optional) a list of objects, `camera` (optional) an
    /// object with numeric coordinates.
    ///
    /// # Errors
    /// `ValidationError` describing the first structural problem found
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        let map = match &value {
            Value::Object(map) => map,
            Value::Null => return Err(ValidationError::EmptyPayload),
            other => {
                return Err(ValidationError::malformed(format!(
                    "expected an object, found {}",
                    json_kind(other)
                )))
            }
        };
        if map.is_empty() {
            return Err(ValidationError::EmptyPayload);
        }

        match map.get("tasks") {
            None => return Err(ValidationError::MissingField("tasks")),
            Some(tasks) => check_object_list("tasks", tasks)?,
        }
        if let Some(lanes) = map.get("swimlanes") {
            check_object_list("swimlanes", lanes)?;
        }
        if let Some(camera) = map.get("camera") {
            check_camera(camera)?;
        }

        serde_json::from_value(value).map_err(|e| ValidationError::malformed(e.to_string()))
    }

    /// Encode as raw project data
    ///
    /// # Errors
    /// `ValidationError::MalformedPayload` if an opaque field cannot be encoded
    pub fn to_value(&self) -> Result<Value, ValidationError> {
        serde_json::to_value(self).map_err(|e| ValidationError::malformed(e.to_string()))
    }

    /// Number of work items
    #[inline]
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the document holds neither work items nor swimlanes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.swimlanes().is_empty()
    }
}

impl Default for PlanDocument {
    fn default() -> Self {
        Self::empty()
    }
}

fn check_object_list(field: &str, value: &Value) -> Result<(), ValidationError> {
    let Value::Array(items) = value else {
        return Err(ValidationError::malformed(format!(
            "{field} must be a list, found {}",
            json_kind(value)
        )));
    };
    if let Some(index) = items.iter().position(|item| !item.is_object()) {
        return Err(ValidationError::malformed(format!(
            "{field}[{index}] must be an object"
        )));
    }
    Ok(())
}

fn check_camera(camera: &Value) -> Result<(), ValidationError> {
    let Value::Object(fields) = camera else {
        return Err(ValidationError::malformed(format!(
            "camera must be an object, found {}",
            json_kind(camera)
        )));
    };
    for key in ["x", "y", "zoom"] {
        match fields.get(key) {
            None | Some(Value::Number(_)) => {}
            Some(other) => {
                return Err(ValidationError::malformed(format!(
                    "camera.{key} must be a number, found {}",
                    json_kind(other)
                )))
            }
        }
    }
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn accepts_minimal_document() {
        let doc = PlanDocument::from_value(json!({ "tasks": [] })).unwrap();
        assert_eq!(doc.schema_version(), PLAN_DOCUMENT_VERSION);
        assert_eq!(doc.task_count(), 0);
        assert_eq!(doc.camera, None);
        assert!(doc.is_empty());
        assert_eq!(doc.to_value().unwrap(), json!({ "tasks": [] }));
    }

    #[test]
    fn keeps_opaque_fields() {
        let raw = json!({
            "tasks": [{ "id": "t1", "title": "Ship", "estimate": 3 }],
            "swimlanes": [{ "id": "lane-a", "color": "#ff0" }],
            "camera": { "x": 12.5, "y": 3.0, "zoom": 0.75 },
            "theme": "dark"
        });
        let doc = PlanDocument::from_value(raw).unwrap();

        assert_eq!(doc.tasks[0].id(), Some("t1"));
        assert_eq!(doc.tasks[0].fields()["estimate"], json!(3));
        assert_eq!(doc.swimlanes().len(), 1);
        assert_eq!(doc.camera.as_ref().and_then(CameraState::zoom), Some(0.75));
        assert_eq!(doc.extra["theme"], json!("dark"));

        let encoded = doc.to_value().unwrap();
        assert_eq!(PlanDocument::from_value(encoded).unwrap(), doc);
    }

    #[test]
    fn encodes_back_to_the_raw_value() {
        let raw = json!({
            "tasks": [{ "id": "t1" }],
            "camera": { "x": 10, "y": 20, "zoom": 1, "rotation": 45 }
        });
        let doc = PlanDocument::from_value(raw.clone()).unwrap();
        assert_eq!(doc.version, None);
        assert_eq!(doc.swimlanes, None);
        assert_eq!(doc.camera.as_ref().and_then(CameraState::x), Some(10.0));
        assert_eq!(doc.to_value().unwrap(), raw);
    }

    #[test]
    fn rejects_empty_payloads() {
        assert_eq!(
            PlanDocument::from_value(Value::Null),
            Err(ValidationError::EmptyPayload)
        );
        assert_eq!(
            PlanDocument::from_value(json!({})),
            Err(ValidationError::EmptyPayload)
        );
    }

    #[test]
    fn rejects_missing_tasks() {
        assert_eq!(
            PlanDocument::from_value(json!({ "camera": {} })),
            Err(ValidationError::MissingField("tasks"))
        );
    }

    #[test]
    fn rejects_wrong_shapes() {
        let cases = [
            json!([1, 2, 3]),
            json!({ "tasks": "nope" }),
            json!({ "tasks": [1] }),
            json!({ "tasks": [], "swimlanes": {} }),
            json!({ "tasks": [], "camera": [0, 0] }),
            json!({ "tasks": [], "camera": { "zoom": "far" } }),
        ];
        for raw in cases {
            let result = PlanDocument::from_value(raw.clone());
            assert!(
                matches!(result, Err(ValidationError::MalformedPayload(_))),
                "expected malformed for {raw}, got {result:?}"
            );
        }
    }
}
