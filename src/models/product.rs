use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    /// Price per gram.
    pub unit_price: f64,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Total for `amount_grams`, rounded half away from zero to cents.
    pub fn price_for(&self, amount_grams: u32) -> Result<f64, AppError> {
        let unit = Decimal::from_f64(self.unit_price).ok_or_else(|| {
            AppError::Internal(format!(
                "product {} has a non-representable unit price",
                self.id
            ))
        })?;

        (unit * Decimal::from(amount_grams))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            .to_f64()
            .ok_or_else(|| AppError::Internal("order total out of range".to_string()))
    }
}

pub fn validate_unit_price(unit_price: f64) -> Result<(), AppError> {
    if !unit_price.is_finite() || unit_price < 0.0 {
        return Err(AppError::Validation(format!(
            "unit_price must be a non-negative number, got {unit_price}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Product, validate_unit_price};

    fn product(unit_price: f64) -> Product {
        Product {
            id: 1,
            name: "test-product".to_string(),
            unit_price,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn hundred_grams_at_ten_cents_is_ten() {
        assert_eq!(product(0.10).price_for(100).unwrap(), 10.0);
    }

    #[test]
    fn totals_are_rounded_to_cents() {
        assert_eq!(product(0.0123).price_for(25).unwrap(), 0.31);
        assert_eq!(product(0.3333).price_for(30).unwrap(), 10.0);
    }

    #[test]
    fn negative_and_nan_prices_are_rejected() {
        assert!(validate_unit_price(-1.0).is_err());
        assert!(validate_unit_price(f64::NAN).is_err());
        assert!(validate_unit_price(0.0).is_ok());
    }
}
