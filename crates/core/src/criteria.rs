//! Stratification criteria: categories, values, and per-value quotas.
//!
//! A criteria set is a list of categories (e.g. "gender", "age bracket"),
//! each with the values that appear in the roster and a [min, max] count of
//! how many selected people may carry that value.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::roster::Person;

/// One value within a category, with its selectable quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueQuota {
    pub name: String,
    /// Minimum number of selected people that must carry this value.
    pub min: u32,
    /// Maximum number of selected people that may carry this value.
    pub max: u32,
}

/// A stratification category and its values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub values: Vec<ValueQuota>,
}

impl Category {
    /// Sum of value minimums: the fewest selections this category permits.
    pub fn min_total(&self) -> u32 {
        self.values.iter().map(|v| v.min).sum()
    }

    /// Sum of value maximums: the most selections this category permits.
    pub fn max_total(&self) -> u32 {
        self.values.iter().map(|v| v.max).sum()
    }
}

/// The full criteria set loaded from the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    pub categories: Vec<Category>,
}

impl Criteria {
    /// Smallest panel size any category's minimums allow.
    ///
    /// Every category must independently reach its minimums, so the binding
    /// constraint is the largest per-category minimum total.
    pub fn min_selectable(&self) -> u32 {
        self.categories
            .iter()
            .map(Category::min_total)
            .max()
            .unwrap_or(0)
    }

    /// Largest panel size any category's maximums allow.
    pub fn max_selectable(&self) -> u32 {
        self.categories
            .iter()
            .map(Category::max_total)
            .min()
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Structural validation
// ---------------------------------------------------------------------------

/// Validate the internal structure of a loaded criteria set.
///
/// Rules:
/// - At least one category; every category has at least one value.
/// - No duplicate category names, no duplicate value names within a category.
/// - Every value has `min <= max`.
pub fn validate_structure(criteria: &Criteria) -> Result<(), CoreError> {
    if criteria.categories.is_empty() {
        return Err(CoreError::Validation(
            "Criteria must define at least one category".to_string(),
        ));
    }

    let mut seen_categories = std::collections::HashSet::new();
    for category in &criteria.categories {
        if !seen_categories.insert(category.name.as_str()) {
            return Err(CoreError::Validation(format!(
                "Duplicate category \"{}\" in criteria",
                category.name
            )));
        }
        if category.values.is_empty() {
            return Err(CoreError::Validation(format!(
                "Category \"{}\" has no values",
                category.name
            )));
        }

        let mut seen_values = std::collections::HashSet::new();
        for value in &category.values {
            if !seen_values.insert(value.name.as_str()) {
                return Err(CoreError::Validation(format!(
                    "Duplicate value \"{}\" in category \"{}\"",
                    value.name, category.name
                )));
            }
            if value.min > value.max {
                return Err(CoreError::Validation(format!(
                    "Value \"{}\" in category \"{}\" has min {} greater than max {}",
                    value.name, category.name, value.min, value.max
                )));
            }
        }
    }

    Ok(())
}

/// Validate that every roster person carries a known value for every
/// category (category coverage).
///
/// Returns the first offending person/category pair so the failure message
/// points at actionable source data.
pub fn validate_coverage(criteria: &Criteria, people: &[Person]) -> Result<(), CoreError> {
    for person in people {
        for category in &criteria.categories {
            match person.attributes.get(&category.name) {
                None => {
                    return Err(CoreError::Validation(format!(
                        "Person \"{}\" has no value for category \"{}\"",
                        person.id, category.name
                    )));
                }
                Some(value) => {
                    if !category.values.iter().any(|v| &v.name == value) {
                        return Err(CoreError::Validation(format!(
                            "Person \"{}\" has unknown value \"{}\" for category \"{}\"",
                            person.id, value, category.name
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Validate a requested panel size against what the criteria permit.
pub fn validate_target_count(criteria: &Criteria, target: u32) -> Result<(), CoreError> {
    let min = criteria.min_selectable();
    let max = criteria.max_selectable();
    if target < min || target > max {
        return Err(CoreError::InvalidSelection(format!(
            "Target count {target} is outside the selectable range [{min}, {max}]"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
