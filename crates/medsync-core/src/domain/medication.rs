//! Medication list entries and reconciliation results.

use serde::{Deserialize, Serialize};

use super::error::{MedsyncError, Result};

/// One medication on a patient's list.
///
/// Identity is `code` (e.g. `"RXNORM:111"`); `dose` is the attribute compared
/// for change detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MedicationItem {
    pub code: String,
    pub dose: String,
}

impl MedicationItem {
    pub fn new(code: impl Into<String>, dose: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            dose: dose.into(),
        }
    }

    /// Reject items the diff engine cannot meaningfully key or compare.
    pub fn validate(&self) -> Result<()> {
        if self.code.trim().is_empty() {
            return Err(MedsyncError::invalid("medication code must not be blank"));
        }
        if self.dose.trim().is_empty() {
            return Err(MedsyncError::invalid(format!(
                "dose for {} must not be blank",
                self.code
            )));
        }
        Ok(())
    }
}

/// A same-code entry whose dose differs between the snapshot and the new list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationChange {
    pub from: MedicationItem,
    pub to: MedicationItem,
}

/// Result of reconciling a new medication list against the stored snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationDiff {
    pub added: Vec<MedicationItem>,
    pub removed: Vec<MedicationItem>,
    pub changed: Vec<MedicationChange>,
}

impl MedicationDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Parse and validate a JSON array of `{code, dose}` objects.
///
/// This is the boundary check hosts run before handing a list to the diff
/// engine, which itself never fails.
pub fn parse_medication_list(json: &str) -> Result<Vec<MedicationItem>> {
    let items: Vec<MedicationItem> = serde_json::from_str(json)
        .map_err(|e| MedsyncError::invalid(format!("malformed medication list: {}", e)))?;
    for item in &items {
        item.validate()?;
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_well_formed_list() {
        let items = parse_medication_list(
            r#"[{"code":"RXNORM:111","dose":"10mg"},{"code":"RXNORM:222","dose":"5mg"}]"#,
        )
        .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], MedicationItem::new("RXNORM:111", "10mg"));
    }

    #[test]
    fn parse_rejects_missing_dose() {
        let err = parse_medication_list(r#"[{"code":"RXNORM:111"}]"#).unwrap_err();
        assert!(matches!(err, MedsyncError::InvalidArgument(_)));
    }

    #[test]
    fn parse_rejects_blank_code() {
        let err = parse_medication_list(r#"[{"code":"  ","dose":"5mg"}]"#).unwrap_err();
        assert!(err.to_string().contains("code must not be blank"));
    }

    #[test]
    fn parse_rejects_non_array() {
        assert!(parse_medication_list(r#"{"code":"X","dose":"1"}"#).is_err());
    }

    #[test]
    fn empty_diff_reports_empty() {
        assert!(MedicationDiff::default().is_empty());
    }
}
