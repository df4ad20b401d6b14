use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::money::{checked_sum, ensure_positive};
use stockflow_core::{Amount, BusinessId, DomainError, DomainResult, Quantity, line_total};
use stockflow_orders::OrderId;
use stockflow_parties::CounterpartyId;
use stockflow_products::ProductId;

stockflow_core::domain_id!(LedgerEntryId, "Ledger entry identifier.");

/// Kind of stock-affecting financial event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryType {
    Purchase,
    Sale,
    StockIn,
}

impl LedgerEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryType::Purchase => "PURCHASE",
            LedgerEntryType::Sale => "SALE",
            LedgerEntryType::StockIn => "STOCK_IN",
        }
    }
}

impl core::fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerEntryType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PURCHASE" => Ok(LedgerEntryType::Purchase),
            "SALE" => Ok(LedgerEntryType::Sale),
            "STOCK_IN" => Ok(LedgerEntryType::StockIn),
            other => Err(DomainError::validation(format!("unknown ledger entry type: {other}"))),
        }
    }
}

/// Immutable ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub business_id: BusinessId,
    pub entry_type: LedgerEntryType,
    /// Negative only on reversal entries.
    pub quantity: Quantity,
    pub unit_price: Amount,
    /// Always `quantity × unit_price`.
    pub total_amount: Amount,
    pub description: String,
    pub product_id: Option<ProductId>,
    pub order_id: Option<OrderId>,
    pub counterparty_id: Option<CounterpartyId>,
    /// Entry this one offsets.
    pub reverses: Option<LedgerEntryId>,
    pub created_at: DateTime<Utc>,
}

/// Ledger entry as submitted, before it is given an id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntryDraft {
    pub entry_type: LedgerEntryType,
    pub quantity: Quantity,
    pub unit_price: Amount,
    pub total_amount: Amount,
    pub description: String,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub counterparty_id: Option<CounterpartyId>,
}

impl LedgerEntryDraft {
    /// Draft whose total is computed from quantity and unit price.
    pub fn priced(
        entry_type: LedgerEntryType,
        quantity: Quantity,
        unit_price: Amount,
        description: impl Into<String>,
    ) -> DomainResult<Self> {
        Ok(Self {
            entry_type,
            quantity,
            unit_price,
            total_amount: line_total(quantity, unit_price)?,
            description: description.into(),
            product_id: None,
            order_id: None,
            counterparty_id: None,
        })
    }

    pub fn with_product(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn with_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_counterparty(mut self, counterparty_id: CounterpartyId) -> Self {
        self.counterparty_id = Some(counterparty_id);
        self
    }
}

impl LedgerEntry {
    /// Validate a draft and turn it into an original (non-reversal) entry.
    pub fn post(
        business_id: BusinessId,
        draft: LedgerEntryDraft,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        ensure_positive(draft.quantity, "ledger quantity")?;
        if draft.unit_price < 0 {
            return Err(DomainError::invalid_quantity(format!(
                "unit price cannot be negative (got {})",
                draft.unit_price
            )));
        }
        let description = draft.description.trim();
        if description.is_empty() {
            return Err(DomainError::validation("ledger description cannot be empty"));
        }

        let entry = Self {
            id: LedgerEntryId::generate(),
            business_id,
            entry_type: draft.entry_type,
            quantity: draft.quantity,
            unit_price: draft.unit_price,
            total_amount: draft.total_amount,
            description: description.to_string(),
            product_id: draft.product_id,
            order_id: draft.order_id,
            counterparty_id: draft.counterparty_id,
            reverses: None,
            created_at,
        };
        entry.verify()?;
        Ok(entry)
    }

    /// Build the entry offsetting `self`.
    ///
    /// `already_reversed` tells whether the ledger already holds a reversal of
    /// this entry.
    pub fn reversal(
        &self,
        already_reversed: bool,
        reason: &str,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if self.reverses.is_some() {
            return Err(DomainError::invariant(format!(
                "entry {} is itself a reversal",
                self.id
            )));
        }
        if already_reversed {
            return Err(DomainError::invariant(format!(
                "entry {} has already been reversed",
                self.id
            )));
        }

        let reason = reason.trim();
        let description = if reason.is_empty() {
            format!("Reversal of {}", self.description)
        } else {
            format!("Reversal of {}: {}", self.description, reason)
        };

        let entry = Self {
            id: LedgerEntryId::generate(),
            business_id: self.business_id,
            entry_type: self.entry_type,
            quantity: -self.quantity,
            unit_price: self.unit_price,
            total_amount: -self.total_amount,
            description,
            product_id: self.product_id,
            order_id: self.order_id,
            counterparty_id: self.counterparty_id,
            reverses: Some(self.id),
            created_at,
        };
        entry.verify()?;
        Ok(entry)
    }

    /// Arithmetic invariant: `total_amount == quantity × unit_price`.
    pub fn verify(&self) -> DomainResult<()> {
        let expected = line_total(self.quantity, self.unit_price)?;
        if self.total_amount != expected {
            return Err(DomainError::invariant(format!(
                "ledger total {} does not equal {} x {} = {}",
                self.total_amount, self.quantity, self.unit_price, expected
            )));
        }
        if self.reverses.is_none() && self.quantity <= 0 {
            return Err(DomainError::invariant("original entries need a positive quantity"));
        }
        Ok(())
    }

    pub fn is_reversal(&self) -> bool {
        self.reverses.is_some()
    }
}

/// Totals over a set of ledger entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub count: usize,
    pub total_amount: Amount,
    pub total_quantity: Quantity,
}

impl LedgerSummary {
    pub fn from_entries<'a, I>(entries: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = &'a LedgerEntry>,
    {
        let entries: Vec<&LedgerEntry> = entries.into_iter().collect();
        Ok(Self {
            count: entries.len(),
            total_amount: checked_sum(entries.iter().map(|e| e.total_amount))?,
            total_quantity: checked_sum(entries.iter().map(|e| e.quantity))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_business_id() -> BusinessId {
        BusinessId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn sale(quantity: Quantity, unit_price: Amount) -> LedgerEntry {
        let draft = LedgerEntryDraft::priced(
            LedgerEntryType::Sale,
            quantity,
            unit_price,
            "Sale of Cotton via order PO-1",
        )
        .unwrap();
        LedgerEntry::post(test_business_id(), draft, test_time()).unwrap()
    }

    #[test]
    fn post_accepts_consistent_draft() {
        let entry = sale(20, 15);
        assert_eq!(entry.total_amount, 300);
        assert!(!entry.is_reversal());
    }

    #[test]
    fn mismatched_total_is_rejected() {
        let mut draft =
            LedgerEntryDraft::priced(LedgerEntryType::Purchase, 10, 7, "Purchase").unwrap();
        draft.total_amount = 71;

        let err = LedgerEntry::post(test_business_id(), draft, test_time()).unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) if msg.contains("does not equal") => {}
            other => panic!("expected invariant violation, got {other:?}"),
        }
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let draft = LedgerEntryDraft::priced(LedgerEntryType::StockIn, 0, 7, "Stock in").unwrap();
        let err = LedgerEntry::post(test_business_id(), draft, test_time()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity(_)));
    }

    #[test]
    fn reversal_negates_and_links() {
        let original = sale(20, 15);
        let reversal = original.reversal(false, "wrong customer", test_time()).unwrap();

        assert_eq!(reversal.entry_type, LedgerEntryType::Sale);
        assert_eq!(reversal.quantity, -20);
        assert_eq!(reversal.total_amount, -300);
        assert_eq!(reversal.reverses, Some(original.id));
        assert!(reversal.description.ends_with("wrong customer"));

        let net = LedgerSummary::from_entries([&original, &reversal]).unwrap();
        assert_eq!(net.total_amount, 0);
        assert_eq!(net.total_quantity, 0);
        assert_eq!(net.count, 2);
    }

    #[test]
    fn reversals_cannot_be_reversed_or_repeated() {
        let original = sale(1, 100);
        let reversal = original.reversal(false, "", test_time()).unwrap();

        assert!(matches!(
            reversal.reversal(false, "", test_time()),
            Err(DomainError::InvariantViolation(_))
        ));
        assert!(matches!(
            original.reversal(true, "", test_time()),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: every posted entry satisfies total = quantity × unit price,
        /// and a summary equals the sum of the individual totals.
        #[test]
        fn posted_entries_keep_arithmetic(
            lines in prop::collection::vec((1i64..10_000, 0i64..1_000_000), 1..20)
        ) {
            let business_id = test_business_id();
            let mut entries = Vec::new();
            for (quantity, unit_price) in &lines {
                let draft = LedgerEntryDraft::priced(
                    LedgerEntryType::Sale,
                    *quantity,
                    *unit_price,
                    "Sale",
                ).unwrap();
                let entry = LedgerEntry::post(business_id, draft, test_time()).unwrap();
                prop_assert_eq!(entry.total_amount, quantity * unit_price);
                entries.push(entry);
            }

            let summary = LedgerSummary::from_entries(&entries).unwrap();
            let expected: i64 = lines.iter().map(|(q, p)| q * p).sum();
            prop_assert_eq!(summary.total_amount, expected);
            prop_assert_eq!(summary.count, lines.len());
        }
    }
}
