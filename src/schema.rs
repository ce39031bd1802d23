use crate::error::SchemaResolutionError;

/// Semantic fields a batch header is resolved against, in resolution order.
pub const REQUIRED_FIELDS: [&str; 3] = ["timestamp", "x", "y"];
pub const OPTIONAL_TAG_FIELD: &str = "tag_id";
const VELOCITY_FIELD: &str = "velocity";

/// Column index for each semantic field of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub timestamp: usize,
    pub x: usize,
    pub y: usize,
    pub tag_id: Option<usize>,
    pub velocity: Option<usize>,
}

fn normalize(column: &str) -> String {
    column.trim().to_lowercase()
}

/// First column (in header order) whose trimmed, lowercased name equals or
/// contains `field`.
fn find_column(normalized: &[String], field: &str) -> Option<usize> {
    normalized
        .iter()
        .position(|column| column == field || column.contains(field))
}

/// Resolve free-form headers to semantic fields.
///
/// Each field is matched independently, so two fields may land on the same
/// column (a header `"x_y"` satisfies both `x` and `y`). Every missing
/// required field is reported together with the headers actually seen.
pub fn resolve<S: AsRef<str>>(header: &[S]) -> Result<ColumnMap, SchemaResolutionError> {
    let normalized: Vec<String> = header.iter().map(|c| normalize(c.as_ref())).collect();

    let mut found = [None; REQUIRED_FIELDS.len()];
    let mut missing = Vec::new();
    for (slot, field) in found.iter_mut().zip(REQUIRED_FIELDS) {
        *slot = find_column(&normalized, field);
        if slot.is_none() {
            missing.push(field.to_string());
        }
    }

    let [Some(timestamp), Some(x), Some(y)] = found else {
        let headers: Vec<String> = header.iter().map(|c| c.as_ref().to_string()).collect();
        log::warn!(
            "[SCHEMA] Missing required column(s) {:?} in headers {:?}",
            missing,
            headers
        );
        return Err(SchemaResolutionError::MissingColumns {
            fields: missing,
            headers,
        });
    };

    let map = ColumnMap {
        timestamp,
        x,
        y,
        tag_id: find_column(&normalized, OPTIONAL_TAG_FIELD),
        velocity: normalized.iter().position(|c| c.contains(VELOCITY_FIELD)),
    };

    log::debug!(
        "[SCHEMA] Resolved timestamp={} x={} y={} tag_id={:?} velocity={:?}",
        map.timestamp,
        map.x,
        map.y,
        map.tag_id,
        map.velocity
    );
    if map.x == map.y || map.timestamp == map.x || map.timestamp == map.y {
        log::warn!("[SCHEMA] Several fields share one column: {:?}", map);
    }

    Ok(map)
}
