//! WebAssembly module for the Distribution Ledger
//!
//! Client-side previews of the rules the server enforces:
//! - Order totals from line quantities and unit prices
//! - Order number formatting and parsing
//! - Whether an order can be fulfilled yet
//! - Low-stock flags and M-Pesa phone checks for offline forms

use rust_decimal::Decimal;
use serde::Deserialize;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::log_1(&JsValue::from_str("distribution-ledger wasm loaded"));
}

#[derive(Deserialize)]
struct DraftLine {
    quantity: i64,
    unit_price: Decimal,
}

/// Total of draft order lines `[{ "quantity": 3, "unit_price": "120.50" }]`,
/// as a decimal string
#[wasm_bindgen]
pub fn calculate_order_total(lines_json: &str) -> Result<String, JsValue> {
    let lines: Vec<DraftLine> = serde_json::from_str(lines_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid lines JSON: {}", e)))?;

    let mut total = Decimal::ZERO;
    for line in &lines {
        validate_quantity(line.quantity).map_err(|e| JsValue::from_str(&e.to_string()))?;
        total += line_subtotal(line.quantity, line.unit_price);
    }
    Ok(total.to_string())
}

/// `ORD-{year}-{sequence}`
#[wasm_bindgen]
pub fn order_number(year: i32, sequence: i32) -> String {
    format_order_number(year, sequence)
}

/// `[year, sequence]` of an order number, or undefined if it is malformed
#[wasm_bindgen]
pub fn split_order_number(order_number: &str) -> Option<js_sys::Array> {
    let (year, sequence) = parse_order_number(order_number)?;
    let parts = js_sys::Array::new();
    parts.push(&JsValue::from(year));
    parts.push(&JsValue::from(sequence));
    Some(parts)
}

/// Why an order (as returned by the API) cannot be fulfilled yet, or
/// undefined if it can
#[wasm_bindgen]
pub fn fulfillment_blocker(order_json: &str) -> Result<Option<String>, JsValue> {
    let order: Order = serde_json::from_str(order_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid order JSON: {}", e)))?;
    Ok(order.check_fulfill().err().map(|e| e.to_string()))
}

/// Reorder levels are advisory; this only drives the warning badge
#[wasm_bindgen]
pub fn is_low_stock(quantity: i64, reorder_level: i64) -> bool {
    quantity <= reorder_level
}

/// Phone in the 254XXXXXXXXX form M-Pesa expects, or undefined if invalid
#[wasm_bindgen]
pub fn normalize_mpesa_phone(phone: &str) -> Option<String> {
    normalize_kenyan_phone(phone)
}

/// Error message for an invalid SKU, or undefined
#[wasm_bindgen]
pub fn sku_error(sku: &str) -> Option<String> {
    validate_sku(sku).err().map(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_total() {
        let total = calculate_order_total(
            r#"[{"quantity": 3, "unit_price": "120.50"}, {"quantity": 2, "unit_price": "75"}]"#,
        )
        .unwrap();
        assert_eq!(total.parse::<Decimal>().unwrap(), Decimal::new(51150, 2));
    }

    #[test]
    fn test_order_number() {
        assert_eq!(order_number(2024, 7), "ORD-2024-0007");
        assert_eq!(order_number(2024, 12345), "ORD-2024-12345");
    }

    #[test]
    fn test_low_stock() {
        assert!(is_low_stock(10, 10));
        assert!(is_low_stock(0, 5));
        assert!(!is_low_stock(11, 10));
    }

    #[test]
    fn test_mpesa_phone() {
        assert_eq!(
            normalize_mpesa_phone("0712345678").as_deref(),
            Some("254712345678")
        );
        assert_eq!(
            normalize_mpesa_phone("+254 110 123 456").as_deref(),
            Some("254110123456")
        );
        assert!(normalize_mpesa_phone("12345").is_none());
    }

    #[test]
    fn test_sku_error() {
        assert!(sku_error("MANGO-1L").is_none());
        assert!(sku_error("mango").is_some());
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn test_split_order_number() {
        let parts = split_order_number("ORD-2024-0042").unwrap();
        assert_eq!(parts.length(), 2);
        assert_eq!(parts.get(0).as_f64(), Some(2024.0));
        assert_eq!(parts.get(1).as_f64(), Some(42.0));
        assert!(split_order_number("not-an-order").is_none());
    }

    #[wasm_bindgen_test]
    fn test_invalid_lines_json_is_an_error() {
        let err = calculate_order_total("not json").unwrap_err();
        assert!(err.as_string().unwrap().starts_with("Invalid lines JSON"));
    }

    #[wasm_bindgen_test]
    fn test_unpaid_order_is_blocked() {
        let order = serde_json::json!({
            "id": "6f1c2a7e-8a47-4a52-9d1e-2f0f3f6b8a10",
            "order_number": "ORD-2024-0001",
            "order_type": "WAREHOUSE_TO_DISTRIBUTOR",
            "source_owner_id": "0b9d6a52-3c1e-4e8f-a0b4-8d2f6c1e7a31",
            "destination_owner_id": "9c3e5f71-2d4b-4a6c-b8e0-1f7a3d5c9e42",
            "status": "PENDING",
            "payment_status": "UNPAID",
            "total_amount": "3600.00",
            "notes": null,
            "placed_by": "4a2b8c6d-1e3f-4d5a-9b7c-0e8f2a4c6b53",
            "created_at": "2024-03-01T08:00:00Z",
            "updated_at": "2024-03-01T08:00:00Z",
            "processing_at": null,
            "fulfilled_at": null,
            "received_at": null,
            "cancelled_at": null,
            "cancel_reason": null
        });
        let blocker = fulfillment_blocker(&order.to_string()).unwrap();
        assert!(blocker.is_some());
    }
}
