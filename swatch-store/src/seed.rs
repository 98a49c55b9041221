//! Sample catalog data
//!
//! Used by `swatch seed` to populate an empty store for local runs.

use std::path::Path;

use swatch_core::Record;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse seed file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("seed file contains duplicate id: {0}")]
    DuplicateId(String),
}

const IMAGE_BASE: &str = "http://demandware.edgesuite.net/sits_pod20/dw/image/v2/AAID_PRD/on/demandware.static/Sites-pier1_us-Site/Sites-pier1_master/default/v1430339361406/images";
const ITEM_BASE: &str = "http://www.pier1.com";

/// (sku, title, image sku)
const SAMPLE_PRODUCTS: &[(&str, &str, &str)] = &[
    ("2874842", "Cabana Poms Lumbar Pillow - Cobalt", "2874842"),
    ("2879481", "Calliope Button Lumbar Pillow - Clay", "2874842"),
    ("2745465", "Cabana Petal Lumbar Pillow - Orange", "2745465"),
    ("2520402", "Flounce Pillow - Purple", "2520402"),
    ("2714003", "Plush Pillow - Red", "2741348"),
    ("2741348", "Cabana Pillow - Citrus", "2741348"),
    ("2911526", "Herringbone Chenille Pillow - Indigo", "2911526"),
];

/// Returns the bundled sample catalog
pub fn sample_records() -> Vec<Record> {
    SAMPLE_PRODUCTS
        .iter()
        .map(|(sku, title, image_sku)| {
            let image_url =
                format!("{IMAGE_BASE}/{image_sku}/{image_sku}_1.jpg?sw=1200&sh=1200");
            let slug = title.replace(' ', "-");
            let item_url = format!("{ITEM_BASE}/{slug}/{sku},default,pd.html");

            Record::new(*sku, Some(image_url))
                .with_attribute("title", *title)
                .with_attribute("itemUrl", item_url)
        })
        .collect()
}

/// Loads records from a JSON file containing an array of records
pub fn load_records(path: &Path) -> Result<Vec<Record>, SeedError> {
    let content = std::fs::read_to_string(path)?;
    let records: Vec<Record> = serde_json::from_str(&content)?;

    let mut seen = std::collections::HashSet::new();
    for record in &records {
        if !seen.insert(record.id.as_str()) {
            return Err(SeedError::DuplicateId(record.id.clone()));
        }
    }

    Ok(records)
}
