//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Units left at or below which a product is shown as running low.
const LOW_STOCK: i64 = 2;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// CSS class for a remaining-units cell.
///
/// Usage in templates: `<td class="{{ product.remaining|stock_class }}">`
#[askama::filter_fn]
pub fn stock_class(value: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(stock_class_for(&value.to_string()))
}

fn stock_class_for(remaining: &str) -> &'static str {
    match remaining.parse::<i64>() {
        Ok(n) if n <= 0 => "stock-out",
        Ok(n) if n <= LOW_STOCK => "stock-low",
        Ok(_) => "stock-ok",
        Err(_) => "",
    }
}
