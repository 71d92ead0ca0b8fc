//! Priced offers returned by the quote selector.
//!
//! Prices are held canonically in atomic units of the payment asset (USDC,
//! six decimals). The pricing service speaks decimal USD; that conversion
//! happens once, at the pricing-client boundary, never here.

use crate::payment::PaymentRequirements;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Decimals of the payment asset. All quote prices are atomic USDC units.
pub const USDC_DECIMALS: u32 = 6;

/// A priced offer for a specific operation from a specific provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
	pub provider: String,
	/// Price in atomic units of the payment asset (USDC, 6 decimals).
	pub price: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub estimated_duration_seconds: Option<u64>,
	pub available: bool,
	/// Provider-side payment requirement, when the provider itself is paid
	/// over x402 (surfaced as `x402_instructions` by the pricing service).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub payment: Option<PaymentRequirements>,
	/// Provider-specific metadata, passed through untouched.
	#[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
	pub metadata: serde_json::Value,
}

impl Quote {
	/// Price expressed as decimal USD, for logs and display only.
	pub fn price_usd(&self) -> Decimal {
		Decimal::from_i128_with_scale(self.price as i128, USDC_DECIMALS)
	}
}

/// One or more quotes with a designated best offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSet {
	pub quotes: Vec<Quote>,
	pub best: Quote,
	pub count: usize,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn price_usd_is_six_decimal_usdc() {
		let quote = Quote {
			provider: "openx402".into(),
			price: 10_000,
			estimated_duration_seconds: None,
			available: true,
			payment: None,
			metadata: serde_json::Value::Null,
		};
		assert_eq!(quote.price_usd().to_string(), "0.010000");
	}

	#[test]
	fn price_usd_stays_exact_beyond_i64() {
		let quote = Quote {
			provider: "openx402".into(),
			price: u64::MAX,
			estimated_duration_seconds: None,
			available: true,
			payment: None,
			metadata: serde_json::Value::Null,
		};
		assert_eq!(quote.price_usd().to_string(), "18446744073709.551615");
	}

	#[test]
	fn null_metadata_is_omitted() {
		let quote = Quote {
			provider: "xcache".into(),
			price: 500_000,
			estimated_duration_seconds: Some(5),
			available: true,
			payment: None,
			metadata: serde_json::Value::Null,
		};
		let json = serde_json::to_value(&quote).unwrap();
		assert!(json.get("metadata").is_none());
		assert_eq!(json["estimatedDurationSeconds"], 5);
	}
}
