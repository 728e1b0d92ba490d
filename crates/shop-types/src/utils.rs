//! Money rounding, identifier and display helpers.

use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

/// Rounds a money value to the currency's minor unit, half away from zero.
pub fn round_to_minor_units(value: Decimal, minor_units: u32) -> Decimal {
	value.round_dp_with_strategy(minor_units, RoundingStrategy::MidpointAwayFromZero)
}

/// Fresh record identifier.
pub fn generate_id() -> String {
	Uuid::new_v4().simple().to_string()
}

/// Guest bearer token: 32 random bytes rendered as 64 lowercase hex chars.
pub fn generate_guest_token() -> String {
	let mut bytes = [0u8; 32];
	bytes[..16].copy_from_slice(Uuid::new_v4().as_bytes());
	bytes[16..].copy_from_slice(Uuid::new_v4().as_bytes());
	hex::encode(bytes)
}

/// Shortens an identifier for log lines and notification text.
///
/// Shows only the first 8 characters followed by ".." for longer strings.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(8) {
		Some((cut, _)) => format!("{}..", &id[..cut]),
		None => id.to_string(),
	}
}

/// Formats an amount with thousands separators, e.g. `NGN 5,100.00`.
pub fn format_price(amount: Decimal, currency: &str) -> String {
	let rounded = round_to_minor_units(amount, 2);
	let text = format!("{:.2}", rounded.abs());
	let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

	let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
	for (i, digit) in whole.chars().enumerate() {
		if i > 0 && (whole.len() - i) % 3 == 0 {
			grouped.push(',');
		}
		grouped.push(digit);
	}

	let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
		"-"
	} else {
		""
	};
	format!("{} {}{}.{}", currency, sign, grouped, fraction)
}
