use std::collections::HashMap;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{info, warn};

use crate::models::{LotRecord, FILE_STORE_URL, LOT_PAGE_URL};
use crate::pipeline::artifact::RawArtifact;
use crate::pipeline::timestamp::Timestamp;
use crate::reference::ReferenceData;
use crate::scrapers::types::{scalar_text, Attribute, Characteristic, RawLot, SearchPage};

const CADASTRAL_CODE: &str = "CadastralNumber";
const AREA_CODE: &str = "SquareZU";
const RENT_PERIOD_CODE: &str = "DA_contractDate_EA(ZK)";
/// Placeholder the registry uses for "no cadastral number"
const NO_VALUE: &str = "-";

fn cadastral_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b\d{2}:\d{2}:\d{6,7}(?::\d{1,4})?(?::\d)?(?::[А-Яа-я\d]*)?\b").unwrap()
    })
}

fn characteristic(characteristics: &[Characteristic], code: &str) -> Option<String> {
    characteristics
        .iter()
        .find(|c| c.code.as_deref() == Some(code))
        .and_then(|c| c.characteristic_value.as_ref())
        .and_then(scalar_text)
}

fn attribute(attributes: &[Attribute], code: &str) -> Option<String> {
    attributes
        .iter()
        .find(|a| a.code.as_deref() == Some(code))
        .and_then(|a| a.value.as_ref())
        .and_then(scalar_text)
}

/// Cadastral number of a lot.
///
/// The explicit characteristic wins; `"-"` there means the lot has none.
/// Without a characteristic the first number found in the description is used.
pub fn extract_cadastral_number(characteristics: &[Characteristic], description: Option<&str>) -> Option<String> {
    match characteristic(characteristics, CADASTRAL_CODE) {
        Some(value) if value.trim() == NO_VALUE => None,
        Some(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => description
            .and_then(|text| cadastral_pattern().find(text))
            .map(|m| m.as_str().trim().to_string()),
    }
}

fn to_record(raw: RawLot, reference: &ReferenceData) -> LotRecord {
    let cadastral_number = extract_cadastral_number(&raw.characteristics, raw.lot_description.as_deref());
    let subject = raw
        .subject_rf_code
        .as_deref()
        .and_then(|code| reference.regions.name_for_code(code))
        .map(str::to_string);
    let timezone_offset = raw
        .timezone_offset
        .as_deref()
        .and_then(|offset| offset.trim().parse::<i64>().ok());

    LotRecord {
        link: format!("{}{}", LOT_PAGE_URL, raw.id),
        images: raw
            .lot_images
            .iter()
            .map(|file_id| format!("{}{}?disposition=inline", FILE_STORE_URL, file_id))
            .collect(),
        area: characteristic(&raw.characteristics, AREA_CODE),
        rent_period: attribute(&raw.attributes, RENT_PERIOD_CODE),
        category: raw.category.and_then(|c| c.name),
        bid_type: raw.bidd_type.and_then(|c| c.name),
        bid_form: raw.bidd_form.and_then(|c| c.name),
        create_date: raw.create_date.map(Timestamp::Raw),
        bid_end_time: raw.bidd_end_time.map(Timestamp::Raw),
        auction_start_date: None,
        bid_start_date: None,
        timezone_offset,
        timezone_name: raw.timezone_name,
        cadastral_number,
        subject,
        coords_center: None,
        address: None,
        price_min: raw.price_min,
        price_step: None,
        deposit_price: None,
        files: Vec::new(),
        auction_link: None,
        cadastral_map_link: None,
        id: raw.id,
        lot_name: raw.lot_name,
        lot_description: raw.lot_description,
    }
}

/// Keep the most recently created record per cadastral number, newest first.
///
/// Ties keep the record seen first. Records without a number are dropped.
pub fn deduplicate(records: Vec<LotRecord>) -> Vec<LotRecord> {
    let mut best: HashMap<String, LotRecord> = HashMap::new();

    for record in records {
        let Some(key) = record.cadastral_number.clone() else {
            continue;
        };
        let created = record.create_date.as_ref().and_then(Timestamp::instant);
        let newer = match best.get(&key) {
            Some(kept) => kept.create_date.as_ref().and_then(Timestamp::instant) < created,
            None => true,
        };
        if newer {
            best.insert(key, record);
        }
    }

    let mut unique: Vec<LotRecord> = best.into_values().collect();
    unique.sort_by(|a, b| {
        let a_created = a.create_date.as_ref().and_then(Timestamp::instant);
        let b_created = b.create_date.as_ref().and_then(Timestamp::instant);
        b_created.cmp(&a_created).then_with(|| a.id.cmp(&b.id))
    });
    unique
}

/// Flatten an artifact's pages into deduplicated lot records.
///
/// Takes the artifact by value: its file is gone once this returns, whether
/// or not the payload could be read.
pub fn normalize(artifact: RawArtifact, reference: &ReferenceData) -> Result<Vec<LotRecord>> {
    let pages: Vec<SearchPage> = serde_json::from_str(&artifact.read()?)
        .with_context(|| format!("Malformed artifact {}", artifact.path().display()))?;

    let mut records = Vec::new();
    for raw in pages.into_iter().flat_map(|page| page.content) {
        match serde_json::from_value::<RawLot>(raw) {
            Ok(lot) => records.push(to_record(lot, reference)),
            Err(e) => warn!(error = %e, "skipping unreadable search record"),
        }
    }

    let total = records.len();
    let without_number = records.iter().filter(|r| r.cadastral_number.is_none()).count();
    let unique = deduplicate(records);

    info!(
        "Normalized {} records: {} unique parcels, {} without cadastral number",
        total,
        unique.len(),
        without_number
    );
    Ok(unique)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::scratch_dir;
    use crate::reference::tests::sample;
    use serde_json::json;

    fn chars(value: serde_json::Value) -> Vec<Characteristic> {
        serde_json::from_value(value).unwrap()
    }

    fn lot(id: &str, cadastral: Option<&str>, created: &str) -> LotRecord {
        let raw: RawLot = serde_json::from_value(json!({"id": id, "createDate": created})).unwrap();
        LotRecord {
            cadastral_number: cadastral.map(str::to_string),
            ..to_record(raw, &sample())
        }
    }

    #[test]
    fn placeholder_means_no_number() {
        let c = chars(json!([{"code": "CadastralNumber", "characteristicValue": "-"}]));
        assert_eq!(extract_cadastral_number(&c, Some("участок 50:10:000000:123")), None);
    }

    #[test]
    fn explicit_value_is_trimmed() {
        let c = chars(json!([{"code": "CadastralNumber", "characteristicValue": " 58:29:1007004:77 "}]));
        assert_eq!(extract_cadastral_number(&c, None), Some("58:29:1007004:77".to_string()));
    }

    #[test]
    fn description_is_searched_when_value_is_missing() {
        let description = "Земельный участок с кадастровым номером 50:10:000000:123, затем 50:10:000000:456";

        let empty = chars(json!([{"code": "CadastralNumber", "characteristicValue": ""}]));
        assert_eq!(extract_cadastral_number(&empty, Some(description)), Some("50:10:000000:123".to_string()));
        assert_eq!(extract_cadastral_number(&[], Some(description)), Some("50:10:000000:123".to_string()));
        assert_eq!(extract_cadastral_number(&[], Some("без номера")), None);
    }

    #[test]
    fn nested_fields_are_extracted_by_code() {
        let raw: RawLot = serde_json::from_value(json!({
            "id": "21000005",
            "subjectRFCode": "58",
            "timezoneOffset": "180",
            "category": {"code": "2", "name": "Земли сельскохозяйственного назначения"},
            "biddType": {"code": "ZK", "name": "Аренда"},
            "characteristics": [
                {"code": "SquareZU", "characteristicValue": 15000},
                {"code": "CadastralNumber", "characteristicValue": "58:29:1007004:77"}
            ],
            "attributes": [{"code": "DA_contractDate_EA(ZK)", "value": "49 лет"}],
            "lotImages": ["img1"]
        }))
        .unwrap();

        let record = to_record(raw, &sample());
        assert_eq!(record.subject.as_deref(), Some("Пензенская обл"));
        assert_eq!(record.area.as_deref(), Some("15000"));
        assert_eq!(record.rent_period.as_deref(), Some("49 лет"));
        assert_eq!(record.bid_type.as_deref(), Some("Аренда"));
        assert_eq!(record.bid_form, None);
        assert_eq!(record.timezone_offset, Some(180));
        assert_eq!(record.link, "https://torgi.gov.ru/new/public/lots/lot/21000005");
        assert_eq!(record.images, vec!["https://torgi.gov.ru/new/file-store/v1/img1?disposition=inline"]);
    }

    #[test]
    fn newest_record_wins_per_parcel() {
        let records = vec![
            lot("old", Some("50:10:000000:123"), "2024-01-01T00:00:00"),
            lot("other", Some("50:10:000000:999"), "2024-01-15T00:00:00"),
            lot("new", Some("50:10:000000:123"), "2024-02-01T00:00:00"),
            lot("orphan", None, "2024-03-01T00:00:00"),
        ];

        let unique = deduplicate(records);
        let ids: Vec<&str> = unique.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "other"]);
        assert_eq!(unique[0].create_date.as_ref().unwrap().to_string(), "2024-02-01T00:00:00");
    }

    #[test]
    fn one_record_per_number_with_max_creation_date() {
        let dates = ["2024-05-02", "2023-12-31", "2024-05-01", "2024-01-10", "2024-05-02T00:00:01"];
        let numbers = ["50:10:000000:1", "50:10:000000:2", "50:10:000000:3"];
        let records: Vec<LotRecord> = (0..15)
            .map(|i| lot(&format!("lot{i}"), Some(numbers[i % 3]), dates[i % 5]))
            .collect();

        let unique = deduplicate(records.clone());
        assert_eq!(unique.len(), numbers.len());
        for kept in &unique {
            let group_max = records
                .iter()
                .filter(|r| r.cadastral_number == kept.cadastral_number)
                .filter_map(|r| r.create_date.as_ref().and_then(Timestamp::instant))
                .max();
            assert_eq!(kept.create_date.as_ref().and_then(Timestamp::instant), group_max);
        }
    }

    #[test]
    fn artifact_pages_are_flattened() {
        let dir = scratch_dir("normalize-pages");
        let pages = json!([
            {"totalPages": 2, "content": [
                {"id": "a", "createDate": "2024-01-01T00:00:00.000Z", "lotDescription": "КН 50:10:000000:123"},
                {"lotName": "без id"}
            ]},
            {"totalPages": 2, "content": [
                {"id": "b", "createDate": "2024-02-01T00:00:00.000Z", "lotDescription": "КН 50:10:000000:123"}
            ]}
        ]);
        let artifact = RawArtifact::create(&dir, "TORGI_pages.json", &pages).unwrap();

        let records = normalize(artifact, &sample()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "b");
    }

    #[test]
    fn malformed_artifact_is_removed_anyway() {
        let dir = scratch_dir("normalize-malformed");
        let artifact = RawArtifact::create(&dir, "TORGI_broken.json", &json!({"error": "not a page list"})).unwrap();
        let path = artifact.path().to_path_buf();

        assert!(normalize(artifact, &sample()).is_err());
        assert!(!path.exists());
    }
}
