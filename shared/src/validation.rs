//! Validation utilities for the Distribution Ledger
//!
//! Includes Kenya-specific validations for M-Pesa payment references.

use rust_decimal::Decimal;

use crate::error::RuleViolation;
use crate::models::OrderLineInput;

// ============================================================================
// Ledger Validations
// ============================================================================

/// Validate a stock movement quantity is strictly positive
pub fn validate_quantity(quantity: i64) -> Result<(), RuleViolation> {
    if quantity <= 0 {
        return Err(RuleViolation::InvalidQuantity { quantity });
    }
    Ok(())
}

/// Validate a free-text reason is present; returns the trimmed text
pub fn validate_reason<'a>(
    reason: Option<&'a str>,
    operation: &'static str,
) -> Result<&'a str, RuleViolation> {
    match reason.map(str::trim) {
        Some(r) if !r.is_empty() => Ok(r),
        _ => Err(RuleViolation::MissingReason { operation }),
    }
}

/// Validate a reorder level is not negative
pub fn validate_reorder_level(level: i64) -> Result<(), RuleViolation> {
    if level < 0 {
        return Err(RuleViolation::Validation {
            field: "reorder_level",
            message: "Reorder level cannot be negative",
        });
    }
    Ok(())
}

// ============================================================================
// Order Validations
// ============================================================================

/// Validate requested order lines: at least one, every quantity positive
pub fn validate_order_lines(lines: &[OrderLineInput]) -> Result<(), RuleViolation> {
    if lines.is_empty() {
        return Err(RuleViolation::EmptyOrder);
    }
    for line in lines {
        validate_quantity(line.quantity)?;
    }
    Ok(())
}

/// Money is stored with two decimal places
const MONEY_SCALE: u32 = 2;

fn has_sub_cent_digits(value: Decimal) -> bool {
    value.normalize().scale() > MONEY_SCALE
}

/// Validate a money amount is strictly positive whole cents
pub fn validate_amount(amount: Decimal) -> Result<(), RuleViolation> {
    if amount <= Decimal::ZERO || has_sub_cent_digits(amount) {
        return Err(RuleViolation::InvalidAmount);
    }
    Ok(())
}

/// Validate a unit price is not negative and has at most two decimal places
pub fn validate_unit_price(price: Decimal) -> Result<(), RuleViolation> {
    if price < Decimal::ZERO {
        return Err(RuleViolation::Validation {
            field: "unit_price",
            message: "Unit price cannot be negative",
        });
    }
    if has_sub_cent_digits(price) {
        return Err(RuleViolation::Validation {
            field: "unit_price",
            message: "Unit price cannot have more than two decimal places",
        });
    }
    Ok(())
}

// ============================================================================
// Catalog Validations
// ============================================================================

/// Validate SKU format (3-32 uppercase alphanumeric or dashes)
pub fn validate_sku(sku: &str) -> Result<(), RuleViolation> {
    if sku.len() < 3 || sku.len() > 32 {
        return Err(RuleViolation::Validation {
            field: "sku",
            message: "SKU must be 3 to 32 characters",
        });
    }
    if !sku
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(RuleViolation::Validation {
            field: "sku",
            message: "SKU must be uppercase alphanumeric or dashes only",
        });
    }
    Ok(())
}

// ============================================================================
// Kenya-Specific Validations
// ============================================================================

/// Normalize a Kenyan mobile number to the 2547XXXXXXXX / 2541XXXXXXXX form M-Pesa uses.
/// Accepts: 0712345678, 0712 345 678, +254712345678, 254112345678
pub fn normalize_kenyan_phone(phone: &str) -> Option<String> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    let national = if digits.len() == 10 && digits.starts_with('0') {
        &digits[1..]
    } else if digits.len() == 12 && digits.starts_with("254") {
        &digits[3..]
    } else if digits.len() == 9 {
        &digits[..]
    } else {
        return None;
    };

    // Safaricom and Airtel mobile prefixes
    if national.starts_with('7') || national.starts_with('1') {
        Some(format!("254{}", national))
    } else {
        None
    }
}

/// Validate a Kenyan mobile number for M-Pesa
pub fn validate_kenyan_phone(phone: &str) -> Result<(), RuleViolation> {
    normalize_kenyan_phone(phone)
        .map(|_| ())
        .ok_or(RuleViolation::Validation {
            field: "mpesa_phone",
            message: "Invalid Kenyan mobile number",
        })
}

/// Validate an M-Pesa receipt number (10 uppercase alphanumeric characters)
pub fn validate_mpesa_receipt(receipt: &str) -> Result<(), RuleViolation> {
    if receipt.len() == 10
        && receipt
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        Ok(())
    } else {
        Err(RuleViolation::Validation {
            field: "mpesa_receipt_number",
            message: "M-Pesa receipt numbers are 10 uppercase alphanumeric characters",
        })
    }
}
