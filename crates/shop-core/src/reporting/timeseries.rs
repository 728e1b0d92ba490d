//! Time-bucketed series for the dashboard charts.
//!
//! Buckets are UTC calendar days, or calendar months for
//! [`TimeRange::Year`], and every bucket in the window is present even when
//! no order falls into it.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shop_types::{DeliveryStatus, Order, UserProfile};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Window of the revenue chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRange {
	#[default]
	#[serde(rename = "7days")]
	SevenDays,
	#[serde(rename = "30days")]
	ThirtyDays,
	#[serde(rename = "3months")]
	ThreeMonths,
	#[serde(rename = "year")]
	Year,
}

impl TimeRange {
	pub fn as_str(&self) -> &'static str {
		match self {
			TimeRange::SevenDays => "7days",
			TimeRange::ThirtyDays => "30days",
			TimeRange::ThreeMonths => "3months",
			TimeRange::Year => "year",
		}
	}

	/// First and last bucket keys for a window ending on `today`.
	fn window(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
		match self {
			TimeRange::SevenDays => (today - Days::new(6), today),
			TimeRange::ThirtyDays => (today - Days::new(29), today),
			TimeRange::ThreeMonths => (today - Months::new(3), today),
			TimeRange::Year => {
				let this_month = month_start(today);
				(this_month - Months::new(12), this_month)
			},
		}
	}

	fn is_monthly(&self) -> bool {
		matches!(self, TimeRange::Year)
	}

	fn label(&self, date: NaiveDate) -> String {
		match self {
			TimeRange::Year => date.format("%b %y").to_string(),
			TimeRange::ThreeMonths => date.format("%b %d").to_string(),
			_ => date.format("%a").to_string(),
		}
	}
}

impl fmt::Display for TimeRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for TimeRange {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"7days" => Ok(TimeRange::SevenDays),
			"30days" => Ok(TimeRange::ThirtyDays),
			"3months" => Ok(TimeRange::ThreeMonths),
			"year" => Ok(TimeRange::Year),
			other => Err(format!("Invalid time range: {}", other)),
		}
	}
}

fn month_start(date: NaiveDate) -> NaiveDate {
	date.with_day(1).unwrap_or(date)
}

/// Day keys from `start` to `end` inclusive.
fn days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
	start.iter_days().take_while(move |d| *d <= end)
}

/// Month-start keys from `start` to `end` inclusive.
fn months(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
	std::iter::successors(Some(month_start(start)), |m| m.checked_add_months(Months::new(1)))
		.take_while(move |m| *m <= end)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueBucket {
	pub label: String,
	/// First day of the bucket, `YYYY-MM-DD`.
	pub date: String,
	pub revenue: Decimal,
	pub dmc: Decimal,
	pub spf: Decimal,
	pub orders: usize,
	pub paid_orders: usize,
	pub unpaid_orders: usize,
	pub refunds: Decimal,
}

/// Revenue per bucket over `range`.
///
/// Revenue, DMC and SPF count confirmed orders; `orders` counts every order
/// placed in the bucket, split into paid and unpaid; refunds come from
/// cancelled orders.
pub fn revenue_series(orders: &[Order], range: TimeRange, now: DateTime<Utc>) -> Vec<RevenueBucket> {
	let (start, end) = range.window(now.date_naive());
	let keys: Vec<NaiveDate> = if range.is_monthly() {
		months(start, end).collect()
	} else {
		days(start, end).collect()
	};

	let mut buckets: BTreeMap<NaiveDate, RevenueBucket> = keys
		.into_iter()
		.map(|key| {
			(
				key,
				RevenueBucket {
					label: range.label(key),
					date: key.format("%Y-%m-%d").to_string(),
					revenue: Decimal::ZERO,
					dmc: Decimal::ZERO,
					spf: Decimal::ZERO,
					orders: 0,
					paid_orders: 0,
					unpaid_orders: 0,
					refunds: Decimal::ZERO,
				},
			)
		})
		.collect();

	for order in orders {
		let day = order.create_date.date_naive();
		let key = if range.is_monthly() { month_start(day) } else { day };
		let Some(bucket) = buckets.get_mut(&key) else {
			continue;
		};
		bucket.orders += 1;
		if order.payment_confirmed {
			let financials = order.financials();
			bucket.paid_orders += 1;
			bucket.revenue += financials.amount();
			bucket.dmc += financials.total_dmc();
			bucket.spf += financials.spf();
		} else {
			bucket.unpaid_orders += 1;
		}
		if order.cancelled {
			bucket.refunds += order.refund_amount.unwrap_or_default();
		}
	}

	buckets.into_values().collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBucket {
	pub label: String,
	pub date: String,
	pub pending: usize,
	pub dispatched: usize,
	pub delivered: usize,
	pub cancelled: usize,
}

/// Orders placed on each of the last 31 days by current delivery status.
pub fn order_status_series(orders: &[Order], now: DateTime<Utc>) -> Vec<StatusBucket> {
	let today = now.date_naive();
	let mut buckets: BTreeMap<NaiveDate, StatusBucket> = days(today - Days::new(30), today)
		.map(|day| {
			(
				day,
				StatusBucket {
					label: day.format("%b %d").to_string(),
					date: day.format("%Y-%m-%d").to_string(),
					pending: 0,
					dispatched: 0,
					delivered: 0,
					cancelled: 0,
				},
			)
		})
		.collect();

	for order in orders {
		let Some(bucket) = buckets.get_mut(&order.create_date.date_naive()) else {
			continue;
		};
		match (order.cancelled, order.delivery_status) {
			(true, _) | (_, DeliveryStatus::Cancelled) => bucket.cancelled += 1,
			(_, DeliveryStatus::Delivered) => bucket.delivered += 1,
			(_, DeliveryStatus::Dispatched) => bucket.dispatched += 1,
			(_, DeliveryStatus::Pending) => bucket.pending += 1,
		}
	}

	buckets.into_values().collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthBucket {
	pub label: String,
	pub date: String,
	pub new_users: usize,
	/// New users of the day who have placed more than one order.
	pub repeat_customers: usize,
}

/// Sign-ups per day over the last 31 days.
pub fn user_growth_series(users: &[UserProfile], orders: &[Order], now: DateTime<Utc>) -> Vec<GrowthBucket> {
	let today = now.date_naive();
	let mut order_counts: HashMap<&str, usize> = HashMap::new();
	for user_id in orders.iter().filter_map(|o| o.user_id.as_deref()) {
		*order_counts.entry(user_id).or_default() += 1;
	}

	let mut buckets: BTreeMap<NaiveDate, GrowthBucket> = days(today - Days::new(30), today)
		.map(|day| {
			(
				day,
				GrowthBucket {
					label: day.format("%b %d").to_string(),
					date: day.format("%Y-%m-%d").to_string(),
					new_users: 0,
					repeat_customers: 0,
				},
			)
		})
		.collect();

	for user in users {
		let Some(bucket) = buckets.get_mut(&user.created_at.date_naive()) else {
			continue;
		};
		bucket.new_users += 1;
		if order_counts.get(user.id.as_str()).copied().unwrap_or(0) > 1 {
			bucket.repeat_customers += 1;
		}
	}

	buckets.into_values().collect()
}
