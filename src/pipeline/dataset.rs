use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::models::LotRecord;
use crate::pipeline::timestamp::Timestamp;

const DATASET_PREFIX: &str = "TORGI_";
const DATASET_EXT: &str = "csv";

/// Header row, in `DatasetRow` field order
const COLUMNS: &[&str] = &[
    "id",
    "lot_name",
    "cadastral_number",
    "category",
    "bid_type",
    "bid_form",
    "subject",
    "area",
    "rent_period",
    "create_date",
    "bid_end_time",
    "auction_start_date",
    "bid_start_date",
    "timezone_offset",
    "timezone_name",
    "coords_center",
    "address",
    "price_min",
    "price_step",
    "deposit_price",
    "files",
    "images",
    "link",
    "auction_link",
    "cadastral_map_link",
    "lot_description",
];

/// Flat CSV row; list-valued fields are JSON text in their cell
#[derive(Debug, Serialize)]
struct DatasetRow<'a> {
    id: &'a str,
    lot_name: Option<&'a str>,
    cadastral_number: Option<&'a str>,
    category: Option<&'a str>,
    bid_type: Option<&'a str>,
    bid_form: Option<&'a str>,
    subject: Option<&'a str>,
    area: Option<&'a str>,
    rent_period: Option<&'a str>,
    create_date: Option<&'a Timestamp>,
    bid_end_time: Option<&'a Timestamp>,
    auction_start_date: Option<&'a Timestamp>,
    bid_start_date: Option<&'a Timestamp>,
    timezone_offset: Option<i64>,
    timezone_name: Option<&'a str>,
    coords_center: Option<String>,
    address: Option<&'a str>,
    price_min: Option<f64>,
    price_step: Option<f64>,
    deposit_price: Option<f64>,
    files: String,
    images: String,
    link: &'a str,
    auction_link: Option<&'a str>,
    cadastral_map_link: Option<&'a str>,
    lot_description: Option<&'a str>,
}

impl<'a> DatasetRow<'a> {
    fn from_record(lot: &'a LotRecord) -> Result<Self> {
        let files: Vec<[&str; 2]> = lot.files.iter().map(|f| [f.name.as_str(), f.url.as_str()]).collect();

        Ok(Self {
            id: &lot.id,
            lot_name: lot.lot_name.as_deref(),
            cadastral_number: lot.cadastral_number.as_deref(),
            category: lot.category.as_deref(),
            bid_type: lot.bid_type.as_deref(),
            bid_form: lot.bid_form.as_deref(),
            subject: lot.subject.as_deref(),
            area: lot.area.as_deref(),
            rent_period: lot.rent_period.as_deref(),
            create_date: lot.create_date.as_ref(),
            bid_end_time: lot.bid_end_time.as_ref(),
            auction_start_date: lot.auction_start_date.as_ref(),
            bid_start_date: lot.bid_start_date.as_ref(),
            timezone_offset: lot.timezone_offset,
            timezone_name: lot.timezone_name.as_deref(),
            coords_center: lot.coords_center.map(|c| format!("[{}, {}]", c.lon, c.lat)),
            address: lot.address.as_deref(),
            price_min: lot.price_min,
            price_step: lot.price_step,
            deposit_price: lot.deposit_price,
            files: serde_json::to_string(&files)?,
            images: serde_json::to_string(&lot.images)?,
            link: &lot.link,
            auction_link: lot.auction_link.as_deref(),
            cadastral_map_link: lot.cadastral_map_link.as_deref(),
            lot_description: lot.lot_description.as_deref(),
        })
    }
}

/// File name of the dataset written at `run_stamp`
pub fn dataset_file_name(run_stamp: &str) -> String {
    format!("{}{}.{}", DATASET_PREFIX, run_stamp, DATASET_EXT)
}

/// Write all lots as one CSV file in `dir`. The header is written even when `lots` is empty.
pub fn write_dataset(dir: &Path, run_stamp: &str, lots: &[LotRecord]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output dir {}", dir.display()))?;

    let path = dir.join(dataset_file_name(run_stamp));
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)
        .with_context(|| format!("Failed to open dataset {}", path.display()))?;
    writer.write_record(COLUMNS)?;
    for lot in lots {
        writer.serialize(DatasetRow::from_record(lot)?)?;
    }
    writer.flush()?;

    info!("💾 Saved {} lots to {}", lots.len(), path.display());
    Ok(path)
}

/// Delete all but the `keep` newest datasets in `dir`; returns what was removed.
///
/// Names embed a sortable run stamp, so name order is age order.
pub fn prune_datasets(dir: &Path, keep: usize) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut datasets: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension().is_some_and(|ext| ext == DATASET_EXT)
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(DATASET_PREFIX))
        })
        .collect();
    datasets.sort();

    let stale = datasets.len().saturating_sub(keep);
    let mut removed = Vec::with_capacity(stale);
    for path in datasets.into_iter().take(stale) {
        std::fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
        info!("Removed old dataset {}", path.display());
        removed.push(path);
    }
    Ok(removed)
}
