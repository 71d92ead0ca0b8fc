//! Static quote source for tests and local development.

use crate::{PricingError, QuoteSource, QuoteSpec};
use async_trait::async_trait;
use broker_types::Quote;

/// Quote source that returns a fixed list of quotes for every spec.
#[derive(Default)]
pub struct StaticQuoteSource {
	quotes: Vec<Quote>,
}

impl StaticQuoteSource {
	pub fn new(quotes: Vec<Quote>) -> Self {
		Self { quotes }
	}
}

#[async_trait]
impl QuoteSource for StaticQuoteSource {
	async fn fetch(&self, _spec: &QuoteSpec) -> Result<Vec<Quote>, PricingError> {
		Ok(self.quotes.clone())
	}
}
