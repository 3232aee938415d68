//! TPOS OData payloads.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// OData collection envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct ODataList<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

/// A product from `/odata/Product`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TposProduct {
    pub id: i64,
    pub default_code: Option<String>,
    pub name: String,
    #[serde(default)]
    pub list_price: Decimal,
}

/// A `SaleOnline_Order` as returned by TPOS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SaleOnlineOrder {
    pub id: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(rename = "Facebook_PostId", default)]
    pub facebook_post_id: Option<String>,
    #[serde(rename = "Facebook_CommentId", default)]
    pub facebook_comment_id: Option<String>,
    #[serde(default)]
    pub total_quantity: Decimal,
}

impl SaleOnlineOrder {
    /// Total quantity as whole units.
    #[must_use]
    pub fn total_units(&self) -> i64 {
        self.total_quantity.round().to_i64().unwrap_or_default()
    }
}

/// A line of a new `SaleOnline_Order`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SaleOnlineOrderDetail {
    pub product_id: Option<i64>,
    pub product_code: String,
    pub product_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: i32,
}

/// Body of `POST /odata/SaleOnline_Order`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SaleOnlineOrderInput {
    pub name: String,
    pub telephone: Option<String>,
    pub address: Option<String>,
    #[serde(rename = "Facebook_PostId")]
    pub facebook_post_id: Option<String>,
    #[serde(rename = "Facebook_ASUserId")]
    pub facebook_user_id: Option<String>,
    #[serde(rename = "Facebook_UserName")]
    pub facebook_user_name: Option<String>,
    #[serde(rename = "Facebook_CommentId")]
    pub facebook_comment_id: Option<String>,
    pub note: String,
    pub total_quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub details: Vec<SaleOnlineOrderDetail>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_deserializes_pascal_case() {
        let product: TposProduct = serde_json::from_str(
            r#"{"Id": 42, "DefaultCode": "AO01", "Name": "Áo thun", "ListPrice": 150000}"#,
        )
        .unwrap();

        assert_eq!(product.id, 42);
        assert_eq!(product.default_code.as_deref(), Some("AO01"));
        assert_eq!(product.list_price, Decimal::from(150_000));
    }

    #[test]
    fn test_sale_online_order_total_units() {
        let order: SaleOnlineOrder = serde_json::from_str(
            r#"{"Id": "abc", "Code": "SO001", "Facebook_PostId": "1001_555", "TotalQuantity": 3.0}"#,
        )
        .unwrap();

        assert_eq!(order.total_units(), 3);
        assert_eq!(order.facebook_post_id.as_deref(), Some("1001_555"));
    }

    #[test]
    fn test_order_input_field_names() {
        let input = SaleOnlineOrderInput {
            name: "Lan".to_string(),
            telephone: Some("0912345678".to_string()),
            address: None,
            facebook_post_id: Some("555".to_string()),
            facebook_user_id: Some("999".to_string()),
            facebook_user_name: Some("Lan".to_string()),
            facebook_comment_id: Some("555_1".to_string()),
            note: "A1".to_string(),
            total_quantity: 2,
            total_amount: Decimal::from(300_000),
            details: vec![],
        };

        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["Facebook_ASUserId"], "999");
        assert_eq!(json["Facebook_CommentId"], "555_1");
        assert_eq!(json["Telephone"], "0912345678");
        assert_eq!(json["TotalQuantity"], 2);
        assert_eq!(json["TotalAmount"], 300_000.0);
    }
}
