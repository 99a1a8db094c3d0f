//! CSV column mapping: keyword auto-guess plus the user-editable mapping
//! that is submitted alongside the file.

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};

const DATE_KEYWORDS: &[&str] = &["date"];
const DESCRIPTION_KEYWORDS: &[&str] = &["desc", "narrative", "details"];
const AMOUNT_KEYWORDS: &[&str] = &["amount", "debit", "credit", "value"];
const SIGNED_AMOUNT_KEYWORDS: &[&str] = &["amount", "value"];
const DEBIT_KEYWORDS: &[&str] = &["debit"];
const CREDIT_KEYWORDS: &[&str] = &["credit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MappingMode {
    /// One signed amount column.
    #[default]
    Single,
    /// Separate debit and credit columns.
    Split,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingField {
    Date,
    Description,
    Amount,
    Debit,
    Credit,
}

impl MappingField {
    pub fn name(&self) -> &'static str {
        match self {
            MappingField::Date => "date",
            MappingField::Description => "description",
            MappingField::Amount => "amount",
            MappingField::Debit => "debit",
            MappingField::Credit => "credit",
        }
    }

    /// Multipart field name expected by the CSV import endpoint.
    pub fn form_key(&self) -> &'static str {
        match self {
            MappingField::Date => "map_date",
            MappingField::Description => "map_desc",
            MappingField::Amount => "map_amount",
            MappingField::Debit => "map_debit",
            MappingField::Credit => "map_credit",
        }
    }
}

/// Working column mapping. Amount and debit/credit columns are kept side by
/// side so switching mode back and forth never loses a selection; only the
/// columns relevant to the current mode are validated and submitted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub mode: MappingMode,
    pub date_column: String,
    pub description_column: String,
    pub amount_column: Option<String>,
    pub debit_column: Option<String>,
    pub credit_column: Option<String>,
}

fn first_match(headers: &[String], keywords: &[&str]) -> Option<String> {
    headers
        .iter()
        .find(|header| {
            let lower = header.to_lowercase();
            keywords.iter().any(|k| lower.contains(k))
        })
        .cloned()
}

/// Seed a mapping from the preview headers.
///
/// Each field takes the first header whose lowercase text contains one of
/// its keywords. Fields are matched independently, so a header such as
/// "Credit Card Date" can land in both the date and credit slots.
pub fn guess_mapping(headers: &[String]) -> ColumnMapping {
    let debit_column = first_match(headers, DEBIT_KEYWORDS);
    let credit_column = first_match(headers, CREDIT_KEYWORDS);
    let has_signed_amount = first_match(headers, SIGNED_AMOUNT_KEYWORDS).is_some();

    let mode = if !has_signed_amount && (debit_column.is_some() || credit_column.is_some()) {
        MappingMode::Split
    } else {
        MappingMode::Single
    };

    ColumnMapping {
        mode,
        date_column: first_match(headers, DATE_KEYWORDS).unwrap_or_default(),
        description_column: first_match(headers, DESCRIPTION_KEYWORDS).unwrap_or_default(),
        amount_column: first_match(headers, AMOUNT_KEYWORDS),
        debit_column,
        credit_column,
    }
}

fn filled(column: &Option<String>) -> Option<&str> {
    column.as_deref().filter(|c| !c.trim().is_empty())
}

impl ColumnMapping {
    pub fn set_mode(&mut self, mode: MappingMode) {
        self.mode = mode;
    }

    /// Set or clear (with an empty string) the header used for `field`.
    pub fn set_column(&mut self, field: MappingField, header: impl Into<String>) {
        let header = header.into();
        let optional = if header.trim().is_empty() {
            None
        } else {
            Some(header.clone())
        };
        match field {
            MappingField::Date => self.date_column = header,
            MappingField::Description => self.description_column = header,
            MappingField::Amount => self.amount_column = optional,
            MappingField::Debit => self.debit_column = optional,
            MappingField::Credit => self.credit_column = optional,
        }
    }

    pub fn column(&self, field: MappingField) -> Option<&str> {
        match field {
            MappingField::Date => Some(self.date_column.as_str()).filter(|c| !c.trim().is_empty()),
            MappingField::Description => {
                Some(self.description_column.as_str()).filter(|c| !c.trim().is_empty())
            }
            MappingField::Amount => filled(&self.amount_column),
            MappingField::Debit => filled(&self.debit_column),
            MappingField::Credit => filled(&self.credit_column),
        }
    }

    /// Fields that must be filled before the mapping can be committed.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.column(MappingField::Date).is_none() {
            missing.push(MappingField::Date.name());
        }
        if self.column(MappingField::Description).is_none() {
            missing.push(MappingField::Description.name());
        }
        match self.mode {
            MappingMode::Single => {
                if self.column(MappingField::Amount).is_none() {
                    missing.push(MappingField::Amount.name());
                }
            }
            MappingMode::Split => {
                if self.column(MappingField::Debit).is_none()
                    && self.column(MappingField::Credit).is_none()
                {
                    missing.push("debit or credit");
                }
            }
        }
        missing
    }

    pub fn is_committable(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(IngestError::IncompleteMapping { missing })
        }
    }

    /// Mapping fields to submit for the current mode. Inactive columns are
    /// left out.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let fields: &[MappingField] = match self.mode {
            MappingMode::Single => &[
                MappingField::Date,
                MappingField::Description,
                MappingField::Amount,
            ],
            MappingMode::Split => &[
                MappingField::Date,
                MappingField::Description,
                MappingField::Debit,
                MappingField::Credit,
            ],
        };
        fields
            .iter()
            .filter_map(|field| {
                self.column(*field)
                    .map(|header| (field.form_key(), header.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_guess_narrative_debit_credit() {
        let mapping = guess_mapping(&headers(&["Date", "Narrative", "Debit", "Credit"]));
        assert_eq!(mapping.date_column, "Date");
        assert_eq!(mapping.description_column, "Narrative");
        assert_eq!(mapping.debit_column.as_deref(), Some("Debit"));
        assert_eq!(mapping.credit_column.as_deref(), Some("Credit"));
        assert_eq!(mapping.mode, MappingMode::Split);
        assert!(mapping.is_committable());
    }

    #[test]
    fn test_guess_single_amount() {
        let mapping = guess_mapping(&headers(&["Transaction Date", "Details", "Amount"]));
        assert_eq!(mapping.mode, MappingMode::Single);
        assert_eq!(mapping.date_column, "Transaction Date");
        assert_eq!(mapping.description_column, "Details");
        assert_eq!(mapping.amount_column.as_deref(), Some("Amount"));
        assert!(mapping.debit_column.is_none());
    }

    #[test]
    fn test_guess_is_case_insensitive_and_first_wins() {
        let mapping = guess_mapping(&headers(&["POSTED DATE", "value date", "DESCRIPTION", "VALUE"]));
        assert_eq!(mapping.date_column, "POSTED DATE");
        assert_eq!(mapping.description_column, "DESCRIPTION");
        // "value date" contains "value" and precedes "VALUE"
        assert_eq!(mapping.amount_column.as_deref(), Some("value date"));
    }

    #[test]
    fn test_guess_date_only_from_date_headers() {
        let mapping = guess_mapping(&headers(&["When", "Memo", "Sum"]));
        assert!(mapping.date_column.is_empty());
        assert!(mapping.description_column.is_empty());
        assert!(mapping.amount_column.is_none());
        assert_eq!(mapping.mode, MappingMode::Single);
    }

    #[test]
    fn test_guess_shared_header_matches_several_fields() {
        let mapping = guess_mapping(&headers(&["Credit Card Date", "Details", "Amount"]));
        assert_eq!(mapping.date_column, "Credit Card Date");
        assert_eq!(mapping.credit_column.as_deref(), Some("Credit Card Date"));
        assert_eq!(mapping.amount_column.as_deref(), Some("Credit Card Date"));
    }

    #[test]
    fn test_single_mode_requires_amount() {
        let mut mapping = guess_mapping(&headers(&["Transaction Date", "Details", "Amount"]));
        assert!(mapping.is_committable());
        mapping.set_column(MappingField::Amount, "");
        assert!(!mapping.is_committable());
        match mapping.validate() {
            Err(IngestError::IncompleteMapping { missing }) => assert_eq!(missing, vec!["amount"]),
            other => panic!("expected incomplete mapping, got {:?}", other),
        }
    }

    #[test]
    fn test_split_mode_needs_one_side() {
        let mut mapping = ColumnMapping {
            mode: MappingMode::Split,
            date_column: "Date".to_string(),
            description_column: "Memo".to_string(),
            ..Default::default()
        };
        assert_eq!(mapping.missing_fields(), vec!["debit or credit"]);
        mapping.set_column(MappingField::Credit, "Paid In");
        assert!(mapping.is_committable());
    }

    #[test]
    fn test_mode_switch_keeps_inactive_columns() {
        let mut mapping = guess_mapping(&headers(&["Date", "Narrative", "Debit", "Credit"]));
        mapping.set_column(MappingField::Debit, "Credit");
        mapping.set_mode(MappingMode::Single);
        mapping.set_column(MappingField::Amount, "Debit");
        mapping.set_mode(MappingMode::Split);
        assert_eq!(mapping.debit_column.as_deref(), Some("Credit"));
        assert_eq!(mapping.amount_column.as_deref(), Some("Debit"));

        let keys: Vec<_> = mapping.form_fields().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["map_date", "map_desc", "map_debit", "map_credit"]);
    }

    #[test]
    fn test_form_fields_skip_empty_side() {
        let mut mapping = ColumnMapping {
            mode: MappingMode::Split,
            date_column: "Date".to_string(),
            description_column: "Memo".to_string(),
            ..Default::default()
        };
        mapping.set_column(MappingField::Debit, "Out");
        assert_eq!(
            mapping.form_fields(),
            vec![
                ("map_date", "Date".to_string()),
                ("map_desc", "Memo".to_string()),
                ("map_debit", "Out".to_string()),
            ]
        );
    }
}
