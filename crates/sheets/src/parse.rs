//! Grid parsing: raw spreadsheet rows into domain types.
//!
//! The criteria tab is a four-column grid `category | value | min | max`
//! with a header row. The roster tab has a header row naming the id
//! column, one column per category, and any configured address columns.

use std::collections::HashMap;

use sortia_core::criteria::{Category, Criteria, ValueQuota};
use sortia_core::roster::Person;
use sortia_core::settings::SettingsSnapshot;

use crate::error::SheetsError;

/// Parse the criteria grid.
pub fn parse_criteria(grid: &[Vec<String>]) -> Result<Criteria, SheetsError> {
    let mut rows = grid.iter();
    let header = rows
        .next()
        .ok_or_else(|| SheetsError::Validation("Criteria tab is empty".to_string()))?;
    if header.len() < 4 {
        return Err(SheetsError::Validation(format!(
            "Criteria tab needs columns category/value/min/max, found {} columns",
            header.len()
        )));
    }

    let mut categories: Vec<Category> = Vec::new();
    for (row_idx, row) in rows.enumerate() {
        let line = row_idx + 2; // 1-based, after the header
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        if row.len() < 4 {
            return Err(SheetsError::Validation(format!(
                "Criteria row {line} is incomplete"
            )));
        }

        let category_name = row[0].trim();
        let value_name = row[1].trim();
        if category_name.is_empty() || value_name.is_empty() {
            return Err(SheetsError::Validation(format!(
                "Criteria row {line} has an empty category or value"
            )));
        }
        let min: u32 = row[2].trim().parse().map_err(|_| {
            SheetsError::Validation(format!("Criteria row {line}: min \"{}\" is not a number", row[2]))
        })?;
        let max: u32 = row[3].trim().parse().map_err(|_| {
            SheetsError::Validation(format!("Criteria row {line}: max \"{}\" is not a number", row[3]))
        })?;

        let quota = ValueQuota {
            name: value_name.to_string(),
            min,
            max,
        };
        match categories.iter_mut().find(|c| c.name == category_name) {
            Some(category) => category.values.push(quota),
            None => categories.push(Category {
                name: category_name.to_string(),
                values: vec![quota],
            }),
        }
    }

    Ok(Criteria { categories })
}

/// Parse a people grid (roster or already-selected tab) against the
/// criteria and snapshot configuration.
pub fn parse_people(
    grid: &[Vec<String>],
    criteria: &Criteria,
    snapshot: &SettingsSnapshot,
) -> Result<Vec<Person>, SheetsError> {
    let mut rows = grid.iter();
    let header = rows
        .next()
        .ok_or_else(|| SheetsError::Validation("People tab is empty".to_string()))?;

    let column_index: HashMap<&str, usize> = header
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim(), i))
        .collect();

    let id_idx = *column_index.get(snapshot.id_column.as_str()).ok_or_else(|| {
        SheetsError::Validation(format!(
            "People tab has no \"{}\" column",
            snapshot.id_column
        ))
    })?;

    let mut category_indices = Vec::with_capacity(criteria.categories.len());
    for category in &criteria.categories {
        let idx = *column_index.get(category.name.as_str()).ok_or_else(|| {
            SheetsError::Validation(format!(
                "People tab has no column for category \"{}\"",
                category.name
            ))
        })?;
        category_indices.push((category.name.as_str(), idx));
    }

    let mut address_indices = Vec::with_capacity(snapshot.address_columns.len());
    if snapshot.check_same_address {
        for column in &snapshot.address_columns {
            let idx = *column_index.get(column.as_str()).ok_or_else(|| {
                SheetsError::Validation(format!(
                    "People tab has no address column \"{column}\""
                ))
            })?;
            address_indices.push(idx);
        }
    }

    let mut people = Vec::new();
    for (row_idx, row) in rows.enumerate() {
        let line = row_idx + 2;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let id = row
            .get(id_idx)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                SheetsError::Validation(format!("People row {line} has an empty id"))
            })?;

        let mut attributes = HashMap::with_capacity(category_indices.len());
        for (name, idx) in &category_indices {
            let value = row.get(*idx).map(|c| c.trim()).unwrap_or_default();
            attributes.insert((*name).to_string(), value.to_string());
        }

        let address_key = if snapshot.check_same_address {
            let joined = address_indices
                .iter()
                .map(|idx| row.get(*idx).map(|c| c.trim()).unwrap_or_default())
                .collect::<Vec<_>>()
                .join("|")
                .to_lowercase();
            Some(joined)
        } else {
            None
        };

        people.push(Person {
            id: id.to_string(),
            attributes,
            address_key,
        });
    }

    Ok(people)
}
