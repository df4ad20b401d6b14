//! Quantity and money arithmetic.
//!
//! Quantities are whole units of a product's unit of measure; amounts are in the
//! smallest currency unit. Both are `i64` so reversal entries can carry negative
//! values. Every multiplication is checked: an overflow is reported as an
//! invariant violation instead of wrapping.

use crate::error::{DomainError, DomainResult};

/// Whole units of a product's unit of measure.
pub type Quantity = i64;

/// Money in the smallest currency unit (e.g. cents).
pub type Amount = i64;

/// `quantity × unit_price`, exactly.
pub fn line_total(quantity: Quantity, unit_price: Amount) -> DomainResult<Amount> {
    quantity.checked_mul(unit_price).ok_or_else(|| {
        DomainError::invariant(format!(
            "amount overflow computing {quantity} x {unit_price}"
        ))
    })
}

/// Checked sum of amounts or quantities.
pub fn checked_sum<I>(values: I) -> DomainResult<i64>
where
    I: IntoIterator<Item = i64>,
{
    values.into_iter().try_fold(0i64, |acc, v| {
        acc.checked_add(v)
            .ok_or_else(|| DomainError::invariant("sum overflow"))
    })
}

/// Reject zero or negative quantities.
pub fn ensure_positive(quantity: Quantity, what: &str) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::invalid_quantity(format!(
            "{what} must be positive (got {quantity})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_total_is_exact_product() {
        assert_eq!(line_total(20, 15).unwrap(), 300);
        assert_eq!(line_total(-3, 7).unwrap(), -21);
    }

    #[test]
    fn overflow_is_an_invariant_violation() {
        let err = line_total(i64::MAX, 2).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert!(checked_sum([i64::MAX, 1]).is_err());
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        assert!(ensure_positive(1, "quantity").is_ok());
        assert!(matches!(
            ensure_positive(0, "quantity"),
            Err(DomainError::InvalidQuantity(_))
        ));
    }
}
