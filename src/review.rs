use crate::error::{IngestError, Result};
use crate::schema::{
    Bucket, BucketId, BucketRef, CandidateTransaction, ConfirmEntry, ReviewStatus, TransactionId,
};
use log::warn;
use std::collections::HashMap;

/// Editable list of extracted transactions awaiting confirmation.
///
/// Rows live in a map keyed by transaction id; `order` keeps the sequence
/// the backend returned them in. Every mutation addresses a row by id, never
/// by position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewBuffer {
    order: Vec<TransactionId>,
    rows: HashMap<TransactionId, CandidateTransaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BufferTotals {
    pub outflow: f64,
    pub inflow: f64,
}

impl BufferTotals {
    pub fn net(&self) -> f64 {
        self.inflow + self.outflow
    }
}

impl ReviewBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a buffer from an extraction response. Rows without a spender
    /// inherit `attribution`; repeated ids keep their first occurrence.
    pub fn from_extracted(transactions: Vec<CandidateTransaction>, attribution: &str) -> Self {
        let mut buffer = Self::new();
        for mut txn in transactions {
            if buffer.rows.contains_key(&txn.id) {
                warn!("Dropping duplicate transaction id {} from extraction", txn.id);
                continue;
            }
            if txn.spender.trim().is_empty() {
                txn.spender = attribution.to_string();
            }
            buffer.order.push(txn.id);
            buffer.rows.insert(txn.id, txn);
        }
        buffer
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: TransactionId) -> Option<&CandidateTransaction> {
        self.rows.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateTransaction> {
        self.order.iter().filter_map(move |id| self.rows.get(id))
    }

    fn row_mut(&mut self, id: TransactionId) -> Result<&mut CandidateTransaction> {
        self.rows
            .get_mut(&id)
            .ok_or(IngestError::UnknownTransaction(id))
    }

    pub fn set_description(&mut self, id: TransactionId, text: impl Into<String>) -> Result<()> {
        self.row_mut(id)?.description = text.into();
        Ok(())
    }

    /// Change a row's category and keep its display object in step. A bucket
    /// id missing from `buckets` still sets the id but leaves no display.
    pub fn set_category(
        &mut self,
        id: TransactionId,
        bucket_id: Option<BucketId>,
        buckets: &[Bucket],
    ) -> Result<()> {
        let row = self.row_mut(id)?;
        row.bucket_id = bucket_id;
        row.bucket = bucket_id
            .and_then(|bid| buckets.iter().find(|b| b.id == bid))
            .map(BucketRef::from);
        Ok(())
    }

    pub fn set_attribution(&mut self, id: TransactionId, spender: impl Into<String>) -> Result<()> {
        self.row_mut(id)?.spender = spender.into();
        Ok(())
    }

    pub fn remove(&mut self, id: TransactionId) -> Result<CandidateTransaction> {
        let row = self
            .rows
            .remove(&id)
            .ok_or(IngestError::UnknownTransaction(id))?;
        self.order.retain(|existing| *existing != id);
        Ok(row)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.rows.clear();
    }

    pub fn needs_review_count(&self) -> usize {
        self.iter()
            .filter(|txn| txn.status() == ReviewStatus::Review)
            .count()
    }

    pub fn totals(&self) -> BufferTotals {
        self.iter().fold(BufferTotals::default(), |mut acc, txn| {
            if txn.is_outflow() {
                acc.outflow += txn.amount;
            } else {
                acc.inflow += txn.amount;
            }
            acc
        })
    }

    /// Batch confirm payload, one verified entry per row in buffer order.
    pub fn confirm_payload(&self) -> Vec<ConfirmEntry> {
        self.iter().map(ConfirmEntry::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn txn(id: TransactionId, description: &str, amount: f64, confidence: f64) -> CandidateTransaction {
        CandidateTransaction {
            id,
            date: NaiveDate::from_ymd_opt(2024, 5, id as u32).unwrap(),
            description: description.to_string(),
            raw_description: description.to_uppercase(),
            amount,
            bucket_id: None,
            bucket: None,
            spender: String::new(),
            category_confidence: confidence,
        }
    }

    fn sample() -> ReviewBuffer {
        ReviewBuffer::from_extracted(
            vec![
                txn(3, "Groceries", -82.1, 0.95),
                txn(1, "Salary", 2500.0, 0.99),
                txn(2, "Hardware store", -40.0, 0.4),
            ],
            "Joint",
        )
    }

    fn groceries() -> Vec<Bucket> {
        vec![Bucket {
            id: 10,
            name: "Groceries".to_string(),
            group: Some("Living".to_string()),
        }]
    }

    #[test]
    fn test_keeps_backend_order() {
        let buffer = sample();
        let ids: Vec<_> = buffer.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert!(buffer.iter().all(|t| t.spender == "Joint"));
    }

    #[test]
    fn test_edit_is_isolated_to_one_row() {
        let mut buffer = sample();
        let before: Vec<_> = buffer.iter().cloned().collect();
        buffer.set_description(1, "Payroll").unwrap();

        for (old, new) in before.iter().zip(buffer.iter()) {
            if old.id == 1 {
                assert_eq!(new.description, "Payroll");
                assert_eq!(new.raw_description, old.raw_description);
            } else {
                assert_eq!(old, new);
            }
        }
        let ids: Vec<_> = buffer.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_set_category_updates_display() {
        let mut buffer = sample();
        buffer.set_category(2, Some(10), &groceries()).unwrap();
        let row = buffer.get(2).unwrap();
        assert_eq!(row.bucket_id, Some(10));
        assert_eq!(row.bucket.as_ref().map(|b| b.name.as_str()), Some("Groceries"));

        buffer.set_category(2, Some(99), &groceries()).unwrap();
        let row = buffer.get(2).unwrap();
        assert_eq!(row.bucket_id, Some(99));
        assert!(row.bucket.is_none());

        buffer.set_category(2, None, &groceries()).unwrap();
        assert!(buffer.get(2).unwrap().bucket_id.is_none());
    }

    #[test]
    fn test_unknown_id_is_an_error() {
        let mut buffer = sample();
        assert!(matches!(
            buffer.set_attribution(42, "User A"),
            Err(IngestError::UnknownTransaction(42))
        ));
    }

    #[test]
    fn test_remove_then_edit_by_id() {
        let mut buffer = sample();
        buffer.remove(3).unwrap();
        buffer.set_attribution(2, "User B").unwrap();
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.get(2).unwrap().spender, "User B");
        assert_eq!(buffer.get(1).unwrap().spender, "Joint");
        assert!(buffer.remove(3).is_err());
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let buffer = ReviewBuffer::from_extracted(
            vec![txn(1, "First", -1.0, 0.9), txn(1, "Second", -2.0, 0.9)],
            "Joint",
        );
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.get(1).unwrap().description, "First");
    }

    #[test]
    fn test_review_count_and_totals() {
        let buffer = sample();
        assert_eq!(buffer.needs_review_count(), 1);
        let totals = buffer.totals();
        assert!((totals.outflow + 122.1).abs() < 1e-9);
        assert!((totals.inflow - 2500.0).abs() < 1e-9);
        assert!((totals.net() - 2377.9).abs() < 1e-9);
    }

    #[test]
    fn test_confirm_payload_includes_low_confidence_rows() {
        let mut buffer = sample();
        buffer.set_category(3, Some(10), &groceries()).unwrap();
        let payload = buffer.confirm_payload();
        assert_eq!(payload.len(), 3);
        assert_eq!(payload[0].bucket_id, Some(10));
        assert!(payload.iter().all(|e| e.is_verified));
        assert_eq!(payload[2].id, 2);
    }

    #[test]
    fn test_clear_empties_buffer() {
        let mut buffer = sample();
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.iter().count(), 0);
    }
}
