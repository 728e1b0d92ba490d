//! Product catalog types and the stock ledger rules.
//!
//! A product tracks the lifetime quantity received (`stock`), the quantity
//! still sellable (`remaining_stock`) and the derived `in_stock` flag. Every
//! mutation goes through the methods here so that
//! `remaining_stock <= stock` and `in_stock == (remaining_stock > 0)` hold
//! after each write.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One image of a product, optionally tied to a color variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
	#[serde(default)]
	pub color: String,
	#[serde(default)]
	pub color_code: String,
	pub image: String,
}

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
	pub id: String,
	pub name: String,
	pub description: String,
	pub brand: String,
	pub category: String,
	/// Base price per unit.
	pub price: Decimal,
	/// Absolute amount taken off the base price.
	#[serde(default)]
	pub discount: Decimal,
	/// Per-unit surcharge passed through to a third party.
	#[serde(default)]
	pub dmc: Decimal,
	/// Lifetime quantity received.
	pub stock: u32,
	/// Quantity still available for sale.
	pub remaining_stock: u32,
	pub in_stock: bool,
	#[serde(default = "default_visible")]
	pub is_visible: bool,
	#[serde(default)]
	pub images: Vec<ProductImage>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

fn default_visible() -> bool {
	true
}

/// A storefront category products are filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
	pub id: String,
	pub label: String,
	/// Icon name the storefront renders next to the label.
	pub icon: String,
	pub created_at: DateTime<Utc>,
}

/// Payload for creating a category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCategory {
	#[serde(default)]
	pub label: String,
	#[serde(default)]
	pub icon: String,
}

impl NewCategory {
	/// Trims both fields and requires them to be present.
	pub fn normalized(self) -> Result<Self, String> {
		let label = self.label.trim().to_string();
		let icon = self.icon.trim().to_string();
		if label.is_empty() || icon.is_empty() {
			return Err("Missing label or icon".to_string());
		}
		Ok(Self { label, icon })
	}
}

impl Category {
	/// Whether `name` refers to this category, ignoring case.
	pub fn matches(&self, name: &str) -> bool {
		self.label.eq_ignore_ascii_case(name.trim())
	}
}

/// Payload for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
	pub name: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub brand: String,
	#[serde(default)]
	pub category: String,
	pub price: Decimal,
	#[serde(default)]
	pub discount: Decimal,
	#[serde(default)]
	pub dmc: Decimal,
	#[serde(default)]
	pub stock: u32,
	pub is_visible: Option<bool>,
	#[serde(default)]
	pub images: Vec<ProductImage>,
}

/// Partial admin edit of a product. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
	pub name: Option<String>,
	pub description: Option<String>,
	pub brand: Option<String>,
	pub category: Option<String>,
	pub price: Option<Decimal>,
	pub discount: Option<Decimal>,
	pub dmc: Option<Decimal>,
	pub stock: Option<u32>,
	pub remaining_stock: Option<u32>,
	pub is_visible: Option<bool>,
	pub images: Option<Vec<ProductImage>>,
}

fn validate_pricing(price: Decimal, discount: Decimal, dmc: Decimal) -> Result<(), String> {
	if price.is_sign_negative() {
		return Err("Price cannot be negative".to_string());
	}
	if dmc.is_sign_negative() {
		return Err("DMC cannot be negative".to_string());
	}
	if discount.is_sign_negative() || discount > price {
		return Err("Discount must be between zero and the price".to_string());
	}
	Ok(())
}

impl NewProduct {
	/// Checks the payload before it becomes a product.
	pub fn validate(&self) -> Result<(), String> {
		if self.name.trim().is_empty() {
			return Err("Product name is required".to_string());
		}
		validate_pricing(self.price, self.discount, self.dmc)
	}
}

impl Product {
	/// Builds a new product with its full stock available.
	pub fn new(id: impl Into<String>, draft: NewProduct, now: DateTime<Utc>) -> Self {
		Self {
			id: id.into(),
			name: draft.name,
			description: draft.description,
			brand: draft.brand,
			category: draft.category,
			price: draft.price,
			discount: draft.discount,
			dmc: draft.dmc,
			stock: draft.stock,
			remaining_stock: draft.stock,
			in_stock: draft.stock > 0,
			is_visible: draft.is_visible.unwrap_or(true),
			images: draft.images,
			created_at: now,
			updated_at: now,
		}
	}

	/// Whether `quantity` units can currently be sold.
	pub fn can_fulfil(&self, quantity: u32) -> bool {
		self.remaining_stock >= quantity
	}

	/// Removes sold units, flooring at zero. Returns the new remaining stock.
	pub fn take_stock(&mut self, quantity: u32, now: DateTime<Utc>) -> u32 {
		self.remaining_stock = self.remaining_stock.saturating_sub(quantity);
		self.touch(now);
		self.remaining_stock
	}

	/// Puts units back after a cancellation, never above the lifetime stock.
	pub fn return_stock(&mut self, quantity: u32, now: DateTime<Utc>) -> u32 {
		self.remaining_stock = self
			.remaining_stock
			.saturating_add(quantity)
			.min(self.stock);
		self.touch(now);
		self.remaining_stock
	}

	/// Applies an admin edit.
	///
	/// When only `stock` is given the remaining stock is reset to it, and an
	/// explicit `remaining_stock` is clamped to the (possibly new) stock.
	pub fn apply_update(&mut self, update: ProductUpdate, now: DateTime<Utc>) -> Result<(), String> {
		let price = update.price.unwrap_or(self.price);
		let discount = update.discount.unwrap_or(self.discount);
		let dmc = update.dmc.unwrap_or(self.dmc);
		validate_pricing(price, discount, dmc)?;

		if let Some(name) = update.name {
			if name.trim().is_empty() {
				return Err("Product name is required".to_string());
			}
			self.name = name;
		}
		if let Some(description) = update.description {
			self.description = description;
		}
		if let Some(brand) = update.brand {
			self.brand = brand;
		}
		if let Some(category) = update.category {
			self.category = category;
		}
		if let Some(images) = update.images {
			self.images = images;
		}
		if let Some(is_visible) = update.is_visible {
			self.is_visible = is_visible;
		}
		self.price = price;
		self.discount = discount;
		self.dmc = dmc;

		if let Some(stock) = update.stock {
			self.stock = stock;
		}
		match (update.remaining_stock, update.stock) {
			(Some(remaining), _) => self.remaining_stock = remaining,
			(None, Some(stock)) => self.remaining_stock = stock,
			(None, None) => {},
		}
		self.remaining_stock = self.remaining_stock.min(self.stock);
		self.touch(now);
		Ok(())
	}

	fn touch(&mut self, now: DateTime<Utc>) {
		self.in_stock = self.remaining_stock > 0;
		self.updated_at = now;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn draft(stock: u32) -> NewProduct {
		NewProduct {
			name: "Indomie Carton".into(),
			description: "40 packs".into(),
			brand: "Indomie".into(),
			category: "Food".into(),
			price: Decimal::from(9500),
			discount: Decimal::ZERO,
			dmc: Decimal::from(200),
			stock,
			is_visible: None,
			images: vec![],
		}
	}

	#[test]
	fn test_category_payload_needs_label_and_icon() {
		let category = NewCategory {
			label: "  Snacks ".into(),
			icon: "MdFastfood".into(),
		}
		.normalized()
		.unwrap();
		assert_eq!(category.label, "Snacks");

		let err = NewCategory {
			label: "Snacks".into(),
			icon: " ".into(),
		}
		.normalized()
		.unwrap_err();
		assert_eq!(err, "Missing label or icon");
	}

	#[test]
	fn test_new_product_is_fully_stocked() {
		let product = Product::new("p1", draft(5), Utc::now());
		assert_eq!(product.remaining_stock, 5);
		assert!(product.in_stock);
		assert!(product.is_visible);

		let empty = Product::new("p2", draft(0), Utc::now());
		assert!(!empty.in_stock);
	}

	#[test]
	fn test_take_stock_floors_at_zero() {
		let mut product = Product::new("p1", draft(3), Utc::now());
		assert_eq!(product.take_stock(2, Utc::now()), 1);
		assert!(product.in_stock);
		assert_eq!(product.take_stock(5, Utc::now()), 0);
		assert!(!product.in_stock);
	}

	#[test]
	fn test_return_stock_is_capped_by_lifetime_stock() {
		let mut product = Product::new("p1", draft(3), Utc::now());
		product.take_stock(1, Utc::now());
		assert_eq!(product.return_stock(10, Utc::now()), 3);
		assert!(product.in_stock);
	}

	#[test]
	fn test_update_stock_resets_and_clamps_remaining() {
		let mut product = Product::new("p1", draft(10), Utc::now());
		product.take_stock(4, Utc::now());

		let update = ProductUpdate {
			stock: Some(20),
			..Default::default()
		};
		product.apply_update(update, Utc::now()).unwrap();
		assert_eq!(product.remaining_stock, 20);

		let update = ProductUpdate {
			stock: Some(5),
			remaining_stock: Some(8),
			..Default::default()
		};
		product.apply_update(update, Utc::now()).unwrap();
		assert_eq!(product.stock, 5);
		assert_eq!(product.remaining_stock, 5);
	}

	#[test]
	fn test_update_rejects_discount_above_price() {
		let mut product = Product::new("p1", draft(1), Utc::now());
		let update = ProductUpdate {
			discount: Some(Decimal::from(10_000)),
			..Default::default()
		};
		assert!(product.apply_update(update, Utc::now()).is_err());
		assert_eq!(product.discount, Decimal::ZERO);
	}
}
