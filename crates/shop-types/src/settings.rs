//! Shop-wide settings singleton.
//!
//! A single record keyed `settings` holds bank details, hostels, the service
//! fee, the next delivery window, the WhatsApp contact and the home banner.
//! Reads fall back to [`Settings::default`] when nothing was ever written and
//! every write is an upsert of only the supplied fields.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier of the settings record.
pub const SETTINGS_ID: &str = "settings";

/// Service fee applied when none was configured.
pub const DEFAULT_SPF: i64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
	pub id: String,
	#[serde(default)]
	pub bank_name: String,
	#[serde(default)]
	pub bank_account_number: String,
	#[serde(default)]
	pub account_holder_name: String,
	#[serde(default)]
	pub hostels: Vec<String>,
	pub spf: Decimal,
	#[serde(default)]
	pub next_delivery_time: Option<DateTime<Utc>>,
	#[serde(default)]
	pub next_delivery_enabled: bool,
	#[serde(default)]
	pub whatsapp_number: Option<String>,
	pub banner_title: String,
	pub banner_subtitle: String,
	pub banner_discount: String,
	#[serde(default)]
	pub banner_image: Option<String>,
	pub banner_colors: Vec<String>,
	pub banner_visible: bool,
	pub updated_at: Option<DateTime<Utc>>,
}

impl Default for Settings {
	fn default() -> Self {
		Self::with_spf(Decimal::from(DEFAULT_SPF))
	}
}

impl Settings {
	/// Default settings with the given service fee.
	pub fn with_spf(spf: Decimal) -> Self {
		Self {
			id: SETTINGS_ID.to_string(),
			bank_name: String::new(),
			bank_account_number: String::new(),
			account_holder_name: String::new(),
			hostels: Vec::new(),
			spf,
			next_delivery_time: None,
			next_delivery_enabled: false,
			whatsapp_number: None,
			banner_title: "Summer Sale!".to_string(),
			banner_subtitle: "Enjoy discounts on selected items".to_string(),
			banner_discount: "GET 20% OFF".to_string(),
			banner_image: None,
			banner_colors: vec!["blue".to_string(), "indigo".to_string()],
			banner_visible: true,
			updated_at: None,
		}
	}

	/// Applies the supplied fields of `patch`.
	pub fn apply(&mut self, patch: SettingsPatch, now: DateTime<Utc>) -> Result<(), String> {
		if let Some(spf) = patch.spf {
			if spf.is_sign_negative() {
				return Err("Invalid SPF value".to_string());
			}
			self.spf = spf;
		}
		if let Some(bank_name) = patch.bank_name {
			self.bank_name = bank_name;
		}
		if let Some(number) = patch.bank_account_number {
			self.bank_account_number = number;
		}
		if let Some(holder) = patch.account_holder_name {
			self.account_holder_name = holder;
		}
		if let Some(hostels) = patch.hostels {
			self.hostels = hostels
				.into_iter()
				.map(|h| h.trim().to_string())
				.filter(|h| !h.is_empty())
				.collect();
		}
		if let Some(time) = patch.next_delivery_time {
			self.next_delivery_time = Some(time);
		}
		if let Some(enabled) = patch.next_delivery_enabled {
			self.next_delivery_enabled = enabled;
		}
		if let Some(number) = patch.whatsapp_number {
			if number.trim().is_empty() {
				return Err("WhatsApp number is required".to_string());
			}
			self.whatsapp_number = Some(number);
		}
		if let Some(title) = patch.banner_title {
			self.banner_title = title;
		}
		if let Some(subtitle) = patch.banner_subtitle {
			self.banner_subtitle = subtitle;
		}
		if let Some(discount) = patch.banner_discount {
			self.banner_discount = discount;
		}
		if let Some(image) = patch.banner_image {
			self.banner_image = Some(image);
		}
		if let Some(colors) = patch.banner_colors {
			self.banner_colors = colors;
		}
		if let Some(visible) = patch.banner_visible {
			self.banner_visible = visible;
		}
		self.updated_at = Some(now);
		Ok(())
	}
}

/// Partial settings write. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
	pub bank_name: Option<String>,
	pub bank_account_number: Option<String>,
	pub account_holder_name: Option<String>,
	pub hostels: Option<Vec<String>>,
	pub spf: Option<Decimal>,
	pub next_delivery_time: Option<DateTime<Utc>>,
	pub next_delivery_enabled: Option<bool>,
	pub whatsapp_number: Option<String>,
	pub banner_title: Option<String>,
	pub banner_subtitle: Option<String>,
	pub banner_discount: Option<String>,
	pub banner_image: Option<String>,
	pub banner_colors: Option<Vec<String>>,
	pub banner_visible: Option<bool>,
}

/// Bank details and hostels edit.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralSettingsUpdate {
	pub bank_name: Option<String>,
	pub bank_account_number: Option<String>,
	pub account_holder_name: Option<String>,
	pub hostels: Option<Vec<String>>,
}

impl From<GeneralSettingsUpdate> for SettingsPatch {
	fn from(update: GeneralSettingsUpdate) -> Self {
		Self {
			bank_name: update.bank_name,
			bank_account_number: update.bank_account_number,
			account_holder_name: update.account_holder_name,
			hostels: update.hostels,
			..Default::default()
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpfUpdate {
	pub spf: Option<Decimal>,
}

impl TryFrom<SpfUpdate> for SettingsPatch {
	type Error = String;

	fn try_from(update: SpfUpdate) -> Result<Self, Self::Error> {
		match update.spf {
			Some(spf) if !spf.is_sign_negative() => Ok(Self {
				spf: Some(spf),
				..Default::default()
			}),
			_ => Err("Invalid SPF value".to_string()),
		}
	}
}

/// Next delivery window edit. The time accepts RFC 3339 or the
/// `YYYY-MM-DDTHH:MM[:SS]` form of a datetime-local input, read as UTC.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryTimeUpdate {
	pub next_delivery_time: Option<String>,
	pub next_delivery_enabled: Option<bool>,
}

fn parse_delivery_time(raw: &str) -> Result<DateTime<Utc>, String> {
	if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
		return Ok(time.with_timezone(&Utc));
	}
	["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
		.iter()
		.find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
		.map(|naive| naive.and_utc())
		.ok_or_else(|| "Invalid delivery time format".to_string())
}

impl TryFrom<DeliveryTimeUpdate> for SettingsPatch {
	type Error = String;

	fn try_from(update: DeliveryTimeUpdate) -> Result<Self, Self::Error> {
		let time = update
			.next_delivery_time
			.filter(|raw| !raw.is_empty());
		if time.is_none() && update.next_delivery_enabled.is_none() {
			return Err("Missing fields".to_string());
		}
		Ok(Self {
			next_delivery_time: time.as_deref().map(parse_delivery_time).transpose()?,
			next_delivery_enabled: update.next_delivery_enabled,
			..Default::default()
		})
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsappUpdate {
	pub whatsapp_number: Option<String>,
}

impl TryFrom<WhatsappUpdate> for SettingsPatch {
	type Error = String;

	fn try_from(update: WhatsappUpdate) -> Result<Self, Self::Error> {
		match update.whatsapp_number {
			Some(number) if !number.trim().is_empty() => Ok(Self {
				whatsapp_number: Some(number),
				..Default::default()
			}),
			_ => Err("WhatsApp number is required".to_string()),
		}
	}
}

/// Home banner edit. Title, subtitle and discount are always required.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerUpdate {
	pub banner_title: Option<String>,
	pub banner_subtitle: Option<String>,
	pub banner_discount: Option<String>,
	pub banner_image: Option<String>,
	pub banner_colors: Option<Vec<String>>,
	pub banner_visible: Option<bool>,
}

impl TryFrom<BannerUpdate> for SettingsPatch {
	type Error = String;

	fn try_from(update: BannerUpdate) -> Result<Self, Self::Error> {
		let required = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
		let (Some(title), Some(subtitle), Some(discount)) = (
			required(update.banner_title),
			required(update.banner_subtitle),
			required(update.banner_discount),
		) else {
			return Err("All banner fields are required".to_string());
		};
		Ok(Self {
			banner_title: Some(title),
			banner_subtitle: Some(subtitle),
			banner_discount: Some(discount),
			banner_image: update.banner_image.filter(|i| !i.is_empty()),
			banner_colors: update.banner_colors,
			banner_visible: update.banner_visible,
			..Default::default()
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let settings = Settings::default();
		assert_eq!(settings.id, SETTINGS_ID);
		assert_eq!(settings.spf, Decimal::from(100));
		assert_eq!(settings.banner_title, "Summer Sale!");
		assert_eq!(settings.banner_colors, vec!["blue", "indigo"]);
		assert!(settings.banner_visible);
		assert!(settings.hostels.is_empty());
	}

	#[test]
	fn test_patch_only_touches_supplied_fields() {
		let mut settings = Settings::default();
		let patch = SettingsPatch {
			bank_name: Some("GTBank".into()),
			hostels: Some(vec![" Hall 1 ".into(), "".into()]),
			..Default::default()
		};
		settings.apply(patch, Utc::now()).unwrap();

		assert_eq!(settings.bank_name, "GTBank");
		assert_eq!(settings.hostels, vec!["Hall 1"]);
		assert_eq!(settings.spf, Decimal::from(100));
		assert!(settings.updated_at.is_some());
	}

	#[test]
	fn test_spf_must_be_non_negative() {
		let patch = SettingsPatch::try_from(SpfUpdate {
			spf: Some(Decimal::from(-1)),
		});
		assert!(patch.is_err());
		assert!(SettingsPatch::try_from(SpfUpdate { spf: None }).is_err());
		assert!(SettingsPatch::try_from(SpfUpdate {
			spf: Some(Decimal::ZERO)
		})
		.is_ok());
	}

	#[test]
	fn test_delivery_time_accepts_datetime_local_input() {
		let patch = SettingsPatch::try_from(DeliveryTimeUpdate {
			next_delivery_time: Some("2024-06-01T14:30".into()),
			next_delivery_enabled: None,
		})
		.unwrap();
		let time = patch.next_delivery_time.unwrap();
		assert_eq!(time.to_rfc3339(), "2024-06-01T14:30:00+00:00");

		assert!(SettingsPatch::try_from(DeliveryTimeUpdate::default()).is_err());
		assert!(SettingsPatch::try_from(DeliveryTimeUpdate {
			next_delivery_time: Some("tomorrow".into()),
			next_delivery_enabled: Some(true),
		})
		.is_err());
	}

	#[test]
	fn test_banner_requires_core_fields() {
		let missing = BannerUpdate {
			banner_title: Some("Sale".into()),
			..Default::default()
		};
		assert!(SettingsPatch::try_from(missing).is_err());

		let full = BannerUpdate {
			banner_title: Some("Sale".into()),
			banner_subtitle: Some("Big".into()),
			banner_discount: Some("10% OFF".into()),
			banner_visible: Some(false),
			..Default::default()
		};
		let mut settings = Settings::default();
		settings
			.apply(SettingsPatch::try_from(full).unwrap(), Utc::now())
			.unwrap();
		assert!(!settings.banner_visible);
		assert_eq!(settings.banner_colors, vec!["blue", "indigo"]);
	}
}
