use crate::error::{RecommenderError, Result};
use crate::models::Interaction;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

const REQUIRED_COLUMNS: [&str; 3] = ["user_id", "item_id", "quantity"];

/// Loads a purchase log CSV. Columns other than the interaction fields are ignored.
pub fn load_interactions<P: AsRef<Path>>(path: P) -> Result<Vec<Interaction>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let records = read_interactions(file)?;

    info!(
        path = %path.display(),
        records = records.len(),
        "Interactions loaded"
    );

    Ok(records)
}

pub fn read_interactions<R: Read>(reader: R) -> Result<Vec<Interaction>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(RecommenderError::Schema(format!(
                "missing required column '{}'",
                column
            )));
        }
    }

    let mut records = Vec::new();
    for (position, row) in csv_reader.deserialize::<Interaction>().enumerate() {
        let record = row.map_err(|e| {
            RecommenderError::Schema(format!("record {} (line {}): {}", position + 1, position + 2, e))
        })?;
        records.push(record);
    }

    Ok(records)
}
