//! Quote selection for the x402 broker.
//!
//! The quote selector asks an external pricing service for one or more
//! candidate provider quotes and designates the cheapest eligible one as
//! best. Specs are validated locally before any network call; transport
//! failures and "no quote available" are distinct errors so the API can map
//! them to distinct status codes.

use async_trait::async_trait;
use broker_types::{Quote, QuoteSet};
use thiserror::Error;

pub mod implementations {
	pub mod http;
	pub mod mock;
}

pub use implementations::http::HttpQuoteSource;
pub use implementations::mock::StaticQuoteSource;

/// Errors that can occur during quote selection.
#[derive(Debug, Error)]
pub enum PricingError {
	/// The spec is missing required fields; rejected before any network call.
	#[error("invalid quote spec: {0}")]
	InvalidSpec(String),
	/// Transport failure talking to the pricing service. No retries here;
	/// resilience belongs to the pricing service itself.
	#[error("pricing service unreachable: {0}")]
	Network(String),
	/// The pricing service answered but offered no quotes.
	#[error("no quotes available")]
	NoQuotes,
	/// The pricing service answered with something unparseable.
	#[error("invalid pricing data: {0}")]
	InvalidData(String),
}

/// Operation-specific quote request.
#[derive(Debug, Clone)]
pub enum QuoteSpec {
	Store {
		/// Size of the decoded payload in bytes.
		file_size: u64,
		permanent: bool,
		ttl: Option<u64>,
		/// Used by the pricing service for content-type sniffing.
		filename: Option<String>,
	},
	Run {
		code_size: u64,
		language: String,
	},
	Cache {
		region: String,
	},
}

impl QuoteSpec {
	/// Local validation, before any network call.
	pub fn validate(&self) -> Result<(), PricingError> {
		match self {
			QuoteSpec::Store { file_size, .. } => {
				if *file_size == 0 {
					return Err(PricingError::InvalidSpec("fileSize must be non-zero".into()));
				}
			},
			QuoteSpec::Run {
				code_size,
				language,
			} => {
				if *code_size == 0 {
					return Err(PricingError::InvalidSpec("codeSize must be non-zero".into()));
				}
				if language.trim().is_empty() {
					return Err(PricingError::InvalidSpec("language is required".into()));
				}
			},
			QuoteSpec::Cache { region } => {
				if region.trim().is_empty() {
					return Err(PricingError::InvalidSpec("region is required".into()));
				}
			},
		}
		Ok(())
	}

	/// The operation family, for logging.
	pub fn family(&self) -> &'static str {
		match self {
			QuoteSpec::Store { .. } => "store",
			QuoteSpec::Run { .. } => "run",
			QuoteSpec::Cache { .. } => "cache",
		}
	}
}

/// Trait for fetching candidate quotes from a pricing backend.
///
/// Quotes are returned in the order the backend produced them; the service
/// relies on that order for deterministic tie-breaking.
#[async_trait]
#[cfg_attr(feature = "testing", mockall::automock)]
pub trait QuoteSource: Send + Sync {
	async fn fetch(&self, spec: &QuoteSpec) -> Result<Vec<Quote>, PricingError>;
}

/// Service that validates specs, fetches quotes and designates the best one.
pub struct QuoteService {
	source: Box<dyn QuoteSource>,
}

impl QuoteService {
	pub fn new(source: Box<dyn QuoteSource>) -> Self {
		Self { source }
	}

	/// Fetches quotes for `spec`, optionally pinned to one provider.
	///
	/// Best = lowest price; on a tie, the first quote in backend order wins.
	pub async fn get_quote(
		&self,
		spec: &QuoteSpec,
		provider: Option<&str>,
	) -> Result<QuoteSet, PricingError> {
		spec.validate()?;

		let mut quotes = self.source.fetch(spec).await?;
		if let Some(name) = provider {
			quotes.retain(|q| q.provider == name);
		}
		quotes.retain(|q| q.available);

		let best = quotes
			.iter()
			.enumerate()
			.min_by_key(|(index, quote)| (quote.price, *index))
			.map(|(_, quote)| quote.clone())
			.ok_or(PricingError::NoQuotes)?;

		tracing::info!(
			family = spec.family(),
			provider = %best.provider,
			price_usd = %best.price_usd(),
			candidates = quotes.len(),
			"quote selected"
		);

		let count = quotes.len();
		Ok(QuoteSet {
			quotes,
			best,
			count,
		})
	}
}
