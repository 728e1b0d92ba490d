//! Catalog handler for admin product and category management and
//! storefront reads.
//!
//! Once any category exists, a product's category must name one of them.

use super::access::require_admin;
use super::OrderError;
use chrono::Utc;
use shop_storage::StorageService;
use shop_types::{
	generate_id, truncate_id, Caller, Category, NewCategory, NewProduct, Product, ProductUpdate,
	StorageKey,
};
use std::sync::Arc;
use tracing::instrument;

pub struct CatalogHandler {
	storage: Arc<StorageService>,
}

impl CatalogHandler {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Products newest first. Hidden products are only listed for staff.
	pub async fn list(&self, caller: &Caller) -> Result<Vec<Product>, OrderError> {
		let mut products: Vec<Product> = self.storage.list(StorageKey::Products).await?;
		if !caller.is_staff() {
			products.retain(|p| p.is_visible);
		}
		products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		Ok(products)
	}

	pub async fn get(&self, caller: &Caller, product_id: &str) -> Result<Product, OrderError> {
		let product: Option<Product> = self.storage.find(StorageKey::Products, product_id).await?;
		match product {
			Some(product) if product.is_visible || caller.is_staff() => Ok(product),
			_ => Err(OrderError::NotFound("Product not found".into())),
		}
	}

	#[instrument(skip_all)]
	pub async fn create(&self, caller: &Caller, mut draft: NewProduct) -> Result<Product, OrderError> {
		require_admin(caller)?;
		draft.validate().map_err(OrderError::Validation)?;
		draft.category = self.resolve_category(&draft.category).await?;

		let product = Product::new(generate_id(), draft, Utc::now());
		self.storage
			.store(StorageKey::Products, &product.id, &product)
			.await?;
		tracing::info!(product_id = %truncate_id(&product.id), stock = product.stock, "Product created");
		Ok(product)
	}

	#[instrument(skip_all, fields(product_id = %truncate_id(product_id)))]
	pub async fn update(
		&self,
		caller: &Caller,
		product_id: &str,
		mut update: ProductUpdate,
	) -> Result<Product, OrderError> {
		require_admin(caller)?;
		if let Some(category) = update.category.take() {
			update.category = Some(self.resolve_category(&category).await?);
		}
		let now = Utc::now();
		let product = self
			.storage
			.modify(StorageKey::Products, product_id, |product: &mut Product| {
				product
					.apply_update(update.clone(), now)
					.map_err(OrderError::Validation)
			})
			.await
			.map_err(|e: OrderError| e.or_not_found("Product"))?;

		tracing::info!(remaining = product.remaining_stock, "Product updated");
		Ok(product)
	}

	#[instrument(skip_all, fields(product_id = %truncate_id(product_id)))]
	pub async fn delete(&self, caller: &Caller, product_id: &str) -> Result<Product, OrderError> {
		require_admin(caller)?;
		let product = self
			.storage
			.remove_if(StorageKey::Products, product_id, |_: &Product| Ok::<(), OrderError>(()))
			.await
			.map_err(|e| e.or_not_found("Product"))?;
		tracing::info!("Product deleted");
		Ok(product)
	}

	/// Every category, ordered by label.
	pub async fn categories(&self) -> Result<Vec<Category>, OrderError> {
		let mut categories: Vec<Category> = self.storage.list(StorageKey::Categories).await?;
		categories.sort_by(|a, b| {
			a.label
				.to_lowercase()
				.cmp(&b.label.to_lowercase())
				.then_with(|| a.label.cmp(&b.label))
		});
		Ok(categories)
	}

	#[instrument(skip_all)]
	pub async fn create_category(
		&self,
		caller: &Caller,
		draft: NewCategory,
	) -> Result<Category, OrderError> {
		require_admin(caller)?;
		let draft = draft.normalized().map_err(OrderError::Validation)?;
		if self.categories().await?.iter().any(|c| c.matches(&draft.label)) {
			return Err(OrderError::Validation(format!(
				"Category {} already exists",
				draft.label
			)));
		}

		let category = Category {
			id: generate_id(),
			label: draft.label,
			icon: draft.icon,
			created_at: Utc::now(),
		};
		self.storage
			.store(StorageKey::Categories, &category.id, &category)
			.await?;
		tracing::info!(category = %category.label, "Category created");
		Ok(category)
	}

	/// Removes a category. Products filed under it keep their label.
	#[instrument(skip_all, fields(category_id = %truncate_id(category_id)))]
	pub async fn delete_category(&self, caller: &Caller, category_id: &str) -> Result<Category, OrderError> {
		require_admin(caller)?;
		if category_id.trim().is_empty() {
			return Err(OrderError::Validation("Missing id".into()));
		}
		let category = self
			.storage
			.remove_if(StorageKey::Categories, category_id, |_: &Category| {
				Ok::<(), OrderError>(())
			})
			.await
			.map_err(|e| e.or_not_found("Category"))?;
		tracing::info!(category = %category.label, "Category deleted");
		Ok(category)
	}

	/// Maps a product's category onto the catalog's spelling of it. Any
	/// value is accepted while no categories are defined.
	async fn resolve_category(&self, name: &str) -> Result<String, OrderError> {
		let categories = self.categories().await?;
		if categories.is_empty() {
			return Ok(name.trim().to_string());
		}
		categories
			.into_iter()
			.find(|c| c.matches(name))
			.map(|c| c.label)
			.ok_or_else(|| OrderError::Validation(format!("Unknown category: {}", name.trim())))
	}
}
