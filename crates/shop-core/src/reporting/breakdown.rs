//! Per-product and per-location breakdowns.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use shop_types::Order;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPerformance {
	pub product_id: String,
	pub name: String,
	/// Σ price × quantity over confirmed orders.
	pub revenue: Decimal,
	pub quantity: u32,
	/// Confirmed orders containing the product.
	pub orders: usize,
}

/// Best sellers by revenue over confirmed orders, at most `limit` entries.
pub fn product_performance(orders: &[Order], limit: usize) -> Vec<ProductPerformance> {
	let mut by_product: BTreeMap<&str, ProductPerformance> = BTreeMap::new();
	for order in orders.iter().filter(|o| o.payment_confirmed) {
		for item in &order.products {
			let entry = by_product
				.entry(item.id.as_str())
				.or_insert_with(|| ProductPerformance {
					product_id: item.id.clone(),
					name: item.name.clone(),
					revenue: Decimal::ZERO,
					quantity: 0,
					orders: 0,
				});
			entry.revenue += item.sale_total();
			entry.quantity += item.quantity;
			entry.orders += 1;
		}
	}

	let mut ranked: Vec<ProductPerformance> = by_product.into_values().collect();
	ranked.sort_by(|a, b| {
		b.revenue
			.cmp(&a.revenue)
			.then_with(|| a.product_id.cmp(&b.product_id))
	});
	ranked.truncate(limit);
	ranked
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationStat {
	pub location: String,
	pub order_count: usize,
	pub cancel_count: usize,
}

/// Orders grouped by delivery location, busiest first.
///
/// Locations are compared case-insensitively; the label of the first order
/// seen for a location is kept.
pub fn order_locations(orders: &[Order]) -> Vec<LocationStat> {
	let mut by_location: BTreeMap<String, LocationStat> = BTreeMap::new();
	for order in orders {
		let label = location_label(order.address.as_deref());
		let entry = by_location
			.entry(label.to_lowercase())
			.or_insert_with(|| LocationStat {
				location: label,
				order_count: 0,
				cancel_count: 0,
			});
		entry.order_count += 1;
		if order.cancelled {
			entry.cancel_count += 1;
		}
	}

	let mut stats: Vec<LocationStat> = by_location.into_values().collect();
	stats.sort_by(|a, b| {
		b.order_count
			.cmp(&a.order_count)
			.then_with(|| a.location.to_lowercase().cmp(&b.location.to_lowercase()))
	});
	stats
}

const LOCATION_FIELDS: [&str; 4] = ["city", "location", "address", "line1"];

/// Extracts a location from a free-form address.
///
/// Structured (JSON object) addresses use the first non-empty of `city`,
/// `location`, `address`, `line1`. Plain text uses everything before the
/// first comma.
fn location_label(address: Option<&str>) -> String {
	let address = address.map(str::trim).unwrap_or_default();
	if address.is_empty() {
		return "Unknown".to_string();
	}

	let label = match serde_json::from_str::<Value>(address) {
		Ok(Value::Object(fields)) => LOCATION_FIELDS
			.iter()
			.filter_map(|key| fields.get(*key).and_then(Value::as_str))
			.map(str::trim)
			.find(|value| !value.is_empty())
			.map(str::to_string),
		Ok(Value::String(text)) => text.split(',').next().map(|s| s.trim().to_string()),
		_ => address.split(',').next().map(|s| s.trim().to_string()),
	};

	match label {
		Some(label) if !label.is_empty() => label,
		_ => "Unknown".to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{line_item, sample_order};

	#[test]
	fn test_location_extraction() {
		assert_eq!(location_label(None), "Unknown");
		assert_eq!(location_label(Some("  ")), "Unknown");
		assert_eq!(location_label(Some("Hall 3, Room 12")), "Hall 3");
		assert_eq!(location_label(Some(r#"{"city":"Zaria","line1":"Hall 3"}"#)), "Zaria");
		assert_eq!(location_label(Some(r#"{"line1":"Hall 3"}"#)), "Hall 3");
		assert_eq!(location_label(Some(r#"{"phone":"0800"}"#)), "Unknown");
	}

	#[test]
	fn test_locations_group_case_insensitively() {
		let mut a = sample_order("a", Some("u1"));
		a.address = Some("Hall 3, Room 1".into());
		let mut b = sample_order("b", Some("u2"));
		b.address = Some("hall 3, Room 9".into());
		b.cancelled = true;
		let mut c = sample_order("c", None);
		c.address = None;

		let stats = order_locations(&[a, b, c]);
		assert_eq!(
			stats,
			vec![
				LocationStat {
					location: "Hall 3".into(),
					order_count: 2,
					cancel_count: 1,
				},
				LocationStat {
					location: "Unknown".into(),
					order_count: 1,
					cancel_count: 0,
				},
			]
		);
	}

	#[test]
	fn test_top_products_over_confirmed_orders() {
		let mut orders = Vec::new();
		for (i, (id, price, quantity)) in [("p1", 1000, 1), ("p2", 500, 4), ("p1", 1000, 2), ("p3", 50, 1)]
			.into_iter()
			.enumerate()
		{
			let mut order = sample_order(&format!("o{}", i), Some("u1"));
			order.products = vec![line_item(id, price, 0, quantity)];
			order.payment_confirmed = true;
			orders.push(order);
		}
		let mut unpaid = sample_order("unpaid", Some("u1"));
		unpaid.products = vec![line_item("p3", 100_000, 0, 1)];
		orders.push(unpaid);

		let top = product_performance(&orders, 2);
		assert_eq!(top.len(), 2);
		assert_eq!(top[0].product_id, "p1");
		assert_eq!(top[0].revenue, Decimal::from(3000));
		assert_eq!((top[0].quantity, top[0].orders), (3, 2));
		assert_eq!(top[1].product_id, "p2");

		assert_eq!(product_performance(&orders, 2), top);
	}
}
