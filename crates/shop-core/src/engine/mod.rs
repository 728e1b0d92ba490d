//! Core shop engine that wires the handlers together.
//!
//! The engine owns the storage service, the event bus and every handler.
//! Request-facing layers call the handlers through the accessors; the run
//! loop listens on the event bus and hands committed events to the
//! notification handler on background tasks.

pub mod event_bus;
pub mod lifecycle;

use crate::handlers::{
	CatalogHandler, CheckoutHandler, NotificationHandler, OrderHandler, ReimbursementHandler,
	ReportHandler, SettingsHandler, UserDirectory,
};
use crate::state::{OrderStateMachine, StockLedger};
use shop_config::Config;
use shop_notify::NotificationService;
use shop_storage::StorageService;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Semaphore;

/// Upper bound on notification tasks in flight.
const MAX_CONCURRENT_HANDLERS: usize = 100;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
	#[error("Handler error: {0}")]
	Handler(String),
}

/// Main shop engine.
#[derive(Clone)]
pub struct ShopEngine {
	pub(crate) config: Config,
	pub(crate) storage: Arc<StorageService>,
	pub(crate) event_bus: event_bus::EventBus,
	pub(crate) state_machine: Arc<OrderStateMachine>,
	pub(crate) ledger: Arc<StockLedger>,
	pub(crate) checkout: Arc<CheckoutHandler>,
	pub(crate) orders: Arc<OrderHandler>,
	pub(crate) reimbursements: Arc<ReimbursementHandler>,
	pub(crate) settings: Arc<SettingsHandler>,
	pub(crate) catalog: Arc<CatalogHandler>,
	pub(crate) users: Arc<UserDirectory>,
	pub(crate) reports: Arc<ReportHandler>,
	pub(crate) notifications: Arc<NotificationHandler>,
}

impl ShopEngine {
	/// Creates a new engine over the given services.
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		notifier: Arc<NotificationService>,
		event_bus: event_bus::EventBus,
	) -> Self {
		let shop = &config.shop;
		let state_machine = Arc::new(OrderStateMachine::new(storage.clone()));
		let ledger = Arc::new(StockLedger::new(storage.clone()));
		let users = Arc::new(UserDirectory::new(storage.clone()));
		let settings = Arc::new(SettingsHandler::new(storage.clone(), shop.default_spf));

		let checkout = Arc::new(CheckoutHandler::new(
			state_machine.clone(),
			ledger.clone(),
			settings.clone(),
			users.clone(),
			event_bus.clone(),
			shop.currency.clone(),
			shop.minor_units,
		));

		let orders = Arc::new(OrderHandler::new(
			state_machine.clone(),
			ledger.clone(),
			event_bus.clone(),
		));

		let reimbursements = Arc::new(ReimbursementHandler::new(
			storage.clone(),
			state_machine.clone(),
			event_bus.clone(),
		));

		let reports = Arc::new(ReportHandler::new(
			state_machine.clone(),
			reimbursements.clone(),
			users.clone(),
		));

		let notifications = Arc::new(NotificationHandler::new(
			storage.clone(),
			state_machine.clone(),
			users.clone(),
			notifier,
			shop.currency.clone(),
			Some(config.notifications.admin_url.clone()).filter(|url| !url.is_empty()),
		));

		let catalog = Arc::new(CatalogHandler::new(storage.clone()));

		Self {
			config,
			storage,
			event_bus,
			state_machine,
			ledger,
			checkout,
			orders,
			reimbursements,
			settings,
			catalog,
			users,
			reports,
			notifications,
		}
	}

	/// Main loop: delivers committed events to the notification handler
	/// until ctrl-c.
	pub async fn run(&self) -> Result<(), EngineError> {
		let mut event_receiver = self.event_bus.subscribe();
		let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_HANDLERS));

		loop {
			tokio::select! {
				received = event_receiver.recv() => {
					match received {
						Ok(event) => {
							self.spawn_handler(&semaphore, move |engine| async move {
								engine
									.notifications
									.handle(&event)
									.await
									.map_err(|e| EngineError::Handler(format!("Failed to notify: {}", e)))
							})
							.await;
						}
						Err(RecvError::Lagged(skipped)) => {
							tracing::warn!(skipped, "Notification listener lagged, events dropped");
						}
						Err(RecvError::Closed) => {
							tracing::info!("Event bus closed");
							break;
						}
					}
				}

				_ = tokio::signal::ctrl_c() => {
					break;
				}
			}
		}

		Ok(())
	}

	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub fn state_machine(&self) -> &Arc<OrderStateMachine> {
		&self.state_machine
	}

	pub fn stock(&self) -> &Arc<StockLedger> {
		&self.ledger
	}

	pub fn checkout(&self) -> &Arc<CheckoutHandler> {
		&self.checkout
	}

	pub fn orders(&self) -> &Arc<OrderHandler> {
		&self.orders
	}

	pub fn reimbursements(&self) -> &Arc<ReimbursementHandler> {
		&self.reimbursements
	}

	pub fn settings(&self) -> &Arc<SettingsHandler> {
		&self.settings
	}

	pub fn catalog(&self) -> &Arc<CatalogHandler> {
		&self.catalog
	}

	pub fn users(&self) -> &Arc<UserDirectory> {
		&self.users
	}

	pub fn reports(&self) -> &Arc<ReportHandler> {
		&self.reports
	}

	pub fn notifications(&self) -> &Arc<NotificationHandler> {
		&self.notifications
	}

	/// Spawns `handler` on its own task once a permit is available.
	async fn spawn_handler<F, Fut>(&self, semaphore: &Arc<Semaphore>, handler: F)
	where
		F: FnOnce(ShopEngine) -> Fut + Send + 'static,
		Fut: Future<Output = Result<(), EngineError>> + Send,
	{
		let engine = self.clone();
		match semaphore.clone().acquire_owned().await {
			Ok(permit) => {
				tokio::spawn(async move {
					let _permit = permit;
					if let Err(e) = handler(engine).await {
						tracing::error!("Handler error: {}", e);
					}
				});
			},
			Err(e) => {
				tracing::error!("Failed to acquire semaphore permit: {}", e);
			},
		}
	}
}

