//! Quotation negotiation helpers.
//!
//! A quotation round is all-or-nothing: the supplier's sheet is merged over
//! whatever was quoted in earlier rounds, and the submission stands only if
//! every item ends up with a cost. Partial sheets are fine across rounds
//! (quotes are retained), partial coverage at submission time is not.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use storeflow_core::{DomainError, DomainResult, ValueObject};

use crate::order::{PurchaseOrderItem, PurchaseOrderItemId};

/// Supplier-submitted sheet: proposed cost per item, in paise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QuoteSheet {
    quotes: BTreeMap<PurchaseOrderItemId, i64>,
}

impl QuoteSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (PurchaseOrderItemId, i64)>) -> Self {
        Self {
            quotes: pairs.into_iter().collect(),
        }
    }

    pub fn insert(&mut self, item_id: PurchaseOrderItemId, cost_paise: i64) {
        self.quotes.insert(item_id, cost_paise);
    }

    pub fn get(&self, item_id: PurchaseOrderItemId) -> Option<i64> {
        self.quotes.get(&item_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PurchaseOrderItemId, i64)> + '_ {
        self.quotes.iter().map(|(id, cost)| (*id, *cost))
    }
}

impl ValueObject for QuoteSheet {}

/// Cost settled for one item after merging a sheet over retained quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuote {
    pub item_id: PurchaseOrderItemId,
    pub cost_paise: i64,
}

/// Merge a submitted sheet over the quotes already on the items.
///
/// Previously quoted costs act as defaults; the sheet may overwrite any
/// subset. Returns one [`ItemQuote`] per item, in item order. Fails with
/// [`DomainError::IncompleteQuotation`] naming every item still without a
/// cost, so nothing is applied partially.
pub fn merge_quotes(
    items: &[PurchaseOrderItem],
    sheet: &QuoteSheet,
) -> DomainResult<Vec<ItemQuote>> {
    for (item_id, cost) in sheet.iter() {
        if !items.iter().any(|it| it.item_id == item_id) {
            return Err(DomainError::validation(format!(
                "quote for unknown item {item_id}"
            )));
        }
        if cost < 0 {
            return Err(DomainError::validation(format!(
                "quoted cost for item {item_id} cannot be negative"
            )));
        }
    }

    let mut merged = Vec::with_capacity(items.len());
    let mut missing: Vec<String> = Vec::new();
    for item in items {
        match sheet.get(item.item_id).or(item.quoted_cost_paise) {
            Some(cost_paise) => merged.push(ItemQuote {
                item_id: item.item_id,
                cost_paise,
            }),
            None => missing.push(item.item_id.to_string()),
        }
    }

    if !missing.is_empty() {
        return Err(DomainError::incomplete_quotation(format!(
            "items without a quoted cost: {}",
            missing.join(", ")
        )));
    }

    Ok(merged)
}

/// Subtotal of a fully quoted order: Σ item qty × quoted cost, in paise.
///
/// `quotes` must be the output of [`merge_quotes`] for the same items.
pub fn quoted_subtotal(items: &[PurchaseOrderItem], quotes: &[ItemQuote]) -> DomainResult<i64> {
    let mut total: i128 = 0;
    for (item, quote) in items.iter().zip(quotes) {
        total += item.qty as i128 * quote.cost_paise as i128;
    }
    i64::try_from(total).map_err(|_| DomainError::validation("quoted subtotal overflows"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use storeflow_catalog::ProductId;
    use storeflow_core::AggregateId;

    fn item(qty: i64, cost_paise: i64, quoted: Option<i64>) -> PurchaseOrderItem {
        PurchaseOrderItem {
            item_id: PurchaseOrderItemId::new(),
            product_id: ProductId::new(AggregateId::new()),
            qty,
            cost_paise,
            quoted_cost_paise: quoted,
        }
    }

    #[test]
    fn full_sheet_covers_all_items() {
        let items = vec![item(2, 100, None), item(5, 300, None)];
        let sheet = QuoteSheet::from_pairs([(items[0].item_id, 90), (items[1].item_id, 280)]);

        let quotes = merge_quotes(&items, &sheet).unwrap();

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].cost_paise, 90);
        assert_eq!(quotes[1].cost_paise, 280);
        assert_eq!(quoted_subtotal(&items, &quotes).unwrap(), 2 * 90 + 5 * 280);
    }

    #[test]
    fn missing_items_fail_the_whole_submission() {
        let items = vec![item(1, 100, None), item(1, 200, None), item(1, 300, None)];
        let sheet = QuoteSheet::from_pairs([(items[0].item_id, 90), (items[2].item_id, 310)]);

        let err = merge_quotes(&items, &sheet).unwrap_err();

        match err {
            DomainError::IncompleteQuotation(msg) => {
                assert!(msg.contains(&items[1].item_id.to_string()));
            }
            other => panic!("expected IncompleteQuotation, got {other:?}"),
        }
    }

    #[test]
    fn retained_quotes_fill_the_gaps() {
        let items = vec![item(1, 100, Some(95)), item(1, 200, None)];
        let sheet = QuoteSheet::from_pairs([(items[1].item_id, 180)]);

        let quotes = merge_quotes(&items, &sheet).unwrap();

        assert_eq!(quotes[0].cost_paise, 95);
        assert_eq!(quotes[1].cost_paise, 180);
    }

    #[test]
    fn sheet_overrides_a_retained_quote() {
        let items = vec![item(1, 100, Some(95))];
        let sheet = QuoteSheet::from_pairs([(items[0].item_id, 85)]);

        let quotes = merge_quotes(&items, &sheet).unwrap();

        assert_eq!(quotes[0].cost_paise, 85);
    }

    #[test]
    fn unknown_item_is_rejected() {
        let items = vec![item(1, 100, None)];
        let sheet = QuoteSheet::from_pairs([(PurchaseOrderItemId::new(), 50)]);

        let err = merge_quotes(&items, &sheet).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn negative_quote_is_rejected() {
        let items = vec![item(1, 100, None)];
        let sheet = QuoteSheet::from_pairs([(items[0].item_id, -1)]);

        let err = merge_quotes(&items, &sheet).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    proptest! {
        /// Property: a submission succeeds exactly when sheet and retained
        /// quotes together cover every item.
        #[test]
        fn merge_succeeds_iff_union_covers_items(
            n in 1usize..8,
            retained_mask in prop::collection::vec(any::<bool>(), 8),
            sheet_mask in prop::collection::vec(any::<bool>(), 8),
        ) {
            let items: Vec<PurchaseOrderItem> = (0..n)
                .map(|i| item(1, 100, retained_mask[i].then_some(50)))
                .collect();
            let sheet = QuoteSheet::from_pairs(
                items
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| sheet_mask[*i])
                    .map(|(_, it)| (it.item_id, 60)),
            );

            let covered = (0..n).all(|i| retained_mask[i] || sheet_mask[i]);
            let result = merge_quotes(&items, &sheet);

            prop_assert_eq!(result.is_ok(), covered);
        }
    }
}
