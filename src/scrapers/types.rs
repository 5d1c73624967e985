use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Listing states requested when the caller does not say otherwise
pub const DEFAULT_STATUSES: &[&str] = &["APPLICATIONS_SUBMISSION", "PUBLISHED"];
pub const DEFAULT_CATEGORY: &str = "Земельные участки";

/// Search filters for one registry query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    /// Category name, resolved to a code through the reference tables
    pub category: Option<String>,
    /// Listing states, sent comma-joined
    pub statuses: Vec<String>,
    /// Free-text filter
    pub text: Option<String>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            category: Some(DEFAULT_CATEGORY.to_string()),
            statuses: DEFAULT_STATUSES.iter().map(|s| s.to_string()).collect(),
            text: None,
        }
    }
}

/// Raw HTTP answer, kept as text because the registry may answer with HTML
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One page of the registry search envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub total_pages: u32,
    #[serde(default)]
    pub content: Vec<Value>,
}

/// `{code, name}` object used by the registry for categorical fields
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedCode {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Characteristic {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub characteristic_value: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attribute {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
}

/// A search result record. Only `id` is mandatory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLot {
    pub id: String,
    #[serde(default)]
    pub lot_name: Option<String>,
    #[serde(default)]
    pub lot_description: Option<String>,
    #[serde(default)]
    pub create_date: Option<String>,
    #[serde(default)]
    pub bidd_end_time: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub timezone_offset: Option<String>,
    #[serde(default)]
    pub timezone_name: Option<String>,
    #[serde(default, rename = "subjectRFCode", deserialize_with = "opt_string_or_number")]
    pub subject_rf_code: Option<String>,
    #[serde(default)]
    pub category: Option<NamedCode>,
    #[serde(default)]
    pub bidd_type: Option<NamedCode>,
    #[serde(default)]
    pub bidd_form: Option<NamedCode>,
    #[serde(default)]
    pub price_min: Option<f64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub characteristics: Vec<Characteristic>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub attributes: Vec<Attribute>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub lot_images: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotAttachment {
    pub file_name: String,
    pub file_id: String,
}

/// Per-lot detail document. The attachment list is required.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotDetail {
    #[serde(default)]
    pub auction_start_date: Option<String>,
    #[serde(default)]
    pub bidd_start_time: Option<String>,
    #[serde(default)]
    pub etp_url: Option<String>,
    #[serde(default)]
    pub price_step: Option<f64>,
    #[serde(default)]
    pub deposit: Option<f64>,
    pub lot_attachments: Vec<LotAttachment>,
}

/// Geoportal search answer; `data` is missing when nothing matched
#[derive(Debug, Clone, Deserialize)]
pub struct GeoportalAnswer {
    #[serde(default)]
    pub data: Option<FeatureCollection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub geometry: Option<FeatureGeometry>,
    #[serde(default)]
    pub properties: FeatureProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureProperties {
    #[serde(default)]
    pub options: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub coordinates: Value,
    #[serde(default)]
    pub crs: Option<NamedCrs>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedCrs {
    pub properties: NamedCrsProperties,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedCrsProperties {
    pub name: String,
}

/// Render a scalar JSON leaf as text; `null`, arrays and objects are absent.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Accept `"180"`, `180` or `null`.
pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_text))
}

/// Treat an explicit `null` list like a missing one
pub fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_lot_tolerates_missing_and_numeric_fields() {
        let lot: RawLot = serde_json::from_value(json!({
            "id": "22000001",
            "timezoneOffset": 180,
            "subjectRFCode": "50",
            "attributes": null,
            "characteristics": [{"code": "SquareZU", "characteristicValue": 1200.5}]
        }))
        .unwrap();

        assert_eq!(lot.timezone_offset.as_deref(), Some("180"));
        assert_eq!(lot.subject_rf_code.as_deref(), Some("50"));
        assert!(lot.category.is_none());
        assert!(lot.attributes.is_empty());
        assert_eq!(
            lot.characteristics[0].characteristic_value.as_ref().and_then(scalar_text),
            Some("1200.5".to_string())
        );
    }

    #[test]
    fn detail_requires_attachment_list() {
        let missing = serde_json::from_value::<LotDetail>(json!({"priceStep": 10.0}));
        assert!(missing.is_err());
    }
}
