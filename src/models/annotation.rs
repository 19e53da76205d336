use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Axis-aligned box in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// One labelled region or text span on an image.
///
/// Annotations are exchanged wholesale with every write and carry no identity
/// beyond the image that holds them; `id` is whatever the client assigned.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct Annotation {
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub gt: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<Point>>,
    #[serde(default)]
    pub text: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// Provenance envelope attached to uploads and finalized images.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct Meta {
    #[serde(default)]
    pub tool: String,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub timestamp: String,
}

impl Meta {
    pub fn now(tool: &str, lang: &str) -> Self {
        Self {
            tool: tool.to_string(),
            lang: lang.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_wire_shape() {
        let raw = r#"{"id":"a1","label":"cat","rect":{"x":10,"y":10,"w":20,"h":20},"type":"box","gt":"","text":""}"#;
        let ann: Annotation = serde_json::from_str(raw).unwrap();
        assert_eq!(ann.kind, "box");
        assert_eq!(ann.rect.w, 20.0);
        assert_eq!(ann.accuracy, None);

        let value = serde_json::to_value(&ann).unwrap();
        assert_eq!(value["type"], "box");
        assert!(value.get("points").is_none());
        assert!(value["accuracy"].is_null());
    }

    #[test]
    fn polygon_points_survive() {
        let raw = r#"[{"id":"p","type":"polygon","points":[{"x":1,"y":2},{"x":3.5,"y":4}]}]"#;
        let anns: Vec<Annotation> = serde_json::from_str(raw).unwrap();
        let points = anns[0].points.as_ref().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1], Point { x: 3.5, y: 4.0 });
    }

    #[test]
    fn meta_timestamp_is_rfc3339() {
        let meta = Meta::now("tool", "khm");
        assert!(chrono::DateTime::parse_from_rfc3339(&meta.timestamp).is_ok());
        assert_eq!(meta.lang, "khm");
    }
}
