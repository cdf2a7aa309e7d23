use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Payout {
    pub commission: f64,
    pub professional_earning: f64,
}

/// Splits a transaction amount between the platform and the
/// professional. Pure arithmetic; no money moves here.
pub fn compute(amount: f64, rate_percent: f64) -> Result<Payout, AppError> {
    if !(0.0..=100.0).contains(&rate_percent) {
        return Err(AppError::Validation(format!(
            "commission rate must be between 0 and 100, got {rate_percent}"
        )));
    }
    if amount < 0.0 {
        return Err(AppError::Validation(format!(
            "amount must not be negative, got {amount}"
        )));
    }

    let commission = round2(amount * rate_percent / 100.0);
    Ok(Payout {
        commission,
        professional_earning: round2(amount - commission),
    })
}

/// Round to 2 decimal places, half-up.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
