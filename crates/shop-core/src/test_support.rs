//! Fixtures shared by the unit tests.

use crate::builder::{ShopBuilder, ShopFactories};
use crate::engine::event_bus::EventBus;
use crate::engine::ShopEngine;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use shop_config::ConfigBuilder;
use shop_notify::NotificationService;
use shop_storage::implementations::memory::MemoryStorage;
use shop_storage::{StorageError, StorageInterface, StorageService};
use shop_types::{
	AuthenticatedUser, Caller, CheckoutItem, ConfigSchema, DeliveryStatus, LineItem, NewOrder,
	NewProduct, Order, Product, Role, StorageKey,
};
use std::sync::{Arc, Mutex};

pub fn storage() -> Arc<StorageService> {
	Arc::new(StorageService::new(Box::new(MemoryStorage::new())))
}

fn caller(id: &str, role: Role) -> Caller {
	Caller::User(AuthenticatedUser {
		id: id.into(),
		role,
		name: Some(format!("User {}", id)),
		email: Some(format!("{}@example.com", id)),
	})
}

pub fn admin() -> Caller {
	caller("admin", Role::Admin)
}

pub fn manager() -> Caller {
	caller("manager", Role::Manager)
}

pub fn customer(id: &str) -> Caller {
	caller(id, Role::User)
}

pub fn line_item(id: &str, price: i64, dmc: i64, quantity: u32) -> LineItem {
	LineItem {
		id: id.into(),
		name: format!("Product {}", id),
		description: String::new(),
		category: String::new(),
		brand: String::new(),
		selected_img: None,
		quantity,
		price: Decimal::from(price),
		dmc: Decimal::from(dmc),
	}
}

/// A pending order for one unit at 1000 + 100 DMC with a 100 service fee.
pub fn sample_order(id: &str, user_id: Option<&str>) -> Order {
	let now = Utc::now();
	Order {
		id: id.into(),
		user_id: user_id.map(str::to_string),
		guest_email: None,
		guest_name: None,
		guest_token: None,
		amount: Decimal::from(1200),
		total_dmc: Some(Decimal::from(100)),
		spf: Some(Decimal::from(100)),
		currency: "NGN".into(),
		products: vec![line_item("p1", 1000, 100, 1)],
		address: Some("Hall 3, Room 12".into()),
		create_date: now,
		updated_at: now,
		payment_intent_id: format!("mock_payment_{}", id),
		payment_claimed: false,
		payment_confirmed: false,
		delivery_status: DeliveryStatus::Pending,
		admin_confirmed_availability: false,
		admin_confirmed_availability_at: None,
		user_confirmed_delivery: false,
		user_confirmed_delivery_at: None,
		cancelled: false,
		cancelled_at: None,
		refund_amount: None,
		reimbursed: false,
		reimbursed_at: None,
	}
}

pub fn sample_product(id: &str, price: i64, dmc: i64, stock: u32) -> Product {
	let draft = NewProduct {
		name: format!("Product {}", id),
		description: String::new(),
		brand: String::new(),
		category: "Food".into(),
		price: Decimal::from(price),
		discount: Decimal::ZERO,
		dmc: Decimal::from(dmc),
		stock,
		is_visible: Some(true),
		images: vec![],
	};
	Product::new(id, draft, Utc::now())
}

pub async fn put_product(storage: &StorageService, id: &str, price: i64, dmc: i64, stock: u32) {
	storage
		.store(StorageKey::Products, id, &sample_product(id, price, dmc, stock))
		.await
		.unwrap();
}

pub async fn remaining(storage: &StorageService, id: &str) -> u32 {
	let product: Product = storage.retrieve(StorageKey::Products, id).await.unwrap();
	product.remaining_stock
}

/// Engine over memory storage with the log gateway, NGN and a 100 fee.
pub async fn test_engine() -> ShopEngine {
	let factories = ShopFactories {
		storage_factories: shop_storage::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect(),
		notifier_factories: shop_notify::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect(),
	};
	ShopBuilder::new(ConfigBuilder::new().build())
		.build(factories)
		.unwrap()
}

/// Switch that makes [`FaultyStorage`] refuse writes to keys starting with
/// a prefix such as `"products:p2"`.
#[derive(Clone, Default)]
pub struct WriteFault(Arc<Mutex<Option<String>>>);

impl WriteFault {
	pub fn fail_writes_to(&self, prefix: &str) {
		*self.0.lock().unwrap() = Some(prefix.to_string());
	}

	pub fn heal(&self) {
		*self.0.lock().unwrap() = None;
	}

	fn check(&self, key: &str) -> Result<(), StorageError> {
		match self.0.lock().unwrap().as_deref() {
			Some(prefix) if key.starts_with(prefix) => {
				Err(StorageError::Backend(format!("write to {} refused", key)))
			},
			_ => Ok(()),
		}
	}
}

/// Memory storage whose writes can be made to fail on demand.
pub struct FaultyStorage {
	inner: MemoryStorage,
	fault: WriteFault,
}

#[async_trait]
impl StorageInterface for FaultyStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.inner.get_bytes(key).await
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		self.fault.check(key)?;
		self.inner.set_bytes(key, value).await
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.fault.check(key)?;
		self.inner.delete(key).await
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		self.inner.exists(key).await
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		self.inner.list_keys(prefix).await
	}

	async fn compare_and_swap(
		&self,
		key: &str,
		expected: Option<&[u8]>,
		new: Option<Vec<u8>>,
	) -> Result<bool, StorageError> {
		self.fault.check(key)?;
		self.inner.compare_and_swap(key, expected, new).await
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		self.inner.config_schema()
	}
}

/// Engine like [`test_engine`] over storage whose writes can be broken.
pub fn engine_with_faults() -> (ShopEngine, WriteFault) {
	let fault = WriteFault::default();
	let storage = Arc::new(StorageService::new(Box::new(FaultyStorage {
		inner: MemoryStorage::new(),
		fault: fault.clone(),
	})));
	let engine = ShopEngine::new(
		ConfigBuilder::new().build(),
		storage,
		Arc::new(NotificationService::disabled()),
		EventBus::new(64),
	);
	(engine, fault)
}

/// Checks out `items` as `(product id, price, dmc, quantity)` and returns
/// the order id and guest token.
pub async fn place_order(
	engine: &ShopEngine,
	caller: &Caller,
	items: &[(&str, i64, i64, u32)],
) -> (String, Option<String>) {
	let items = items
		.iter()
		.map(|(id, price, dmc, quantity)| CheckoutItem {
			id: id.to_string(),
			name: format!("Product {}", id),
			description: None,
			category: None,
			brand: None,
			selected_img: None,
			price: Decimal::from(*price),
			dmc: Some(Decimal::from(*dmc)),
			quantity: *quantity,
		})
		.collect();
	let guest = caller.user().is_none();
	let request = NewOrder {
		items,
		guest_email: guest.then(|| "guest@example.com".to_string()),
		guest_name: guest.then(|| "Guest".to_string()),
		address: Some("Hall 3, Room 12".into()),
	};
	let receipt = engine.checkout().checkout(caller, request).await.unwrap();
	(receipt.order_id, receipt.guest_token)
}
