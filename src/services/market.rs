use dashmap::DashMap;

use crate::models::{Quote, SymbolInfo};

use super::QuoteSource;

struct Listing {
    info: SymbolInfo,
    quote: Quote,
}

/// In-memory quote book
///
/// Quotes only change through [`InMemoryQuoteSource::upsert`]; there is no feed.
pub struct InMemoryQuoteSource {
    listings: DashMap<String, Listing>,
}

impl InMemoryQuoteSource {
    pub fn new() -> Self {
        Self {
            listings: DashMap::new(),
        }
    }

    /// Quote book seeded with the demo HOSE listings
    pub fn with_demo_listings() -> Self {
        let source = Self::new();
        let seed: [(&str, &str, i64, i64, i64, i64, u64); 8] = [
            ("VNM", "Vinamilk", 85_200, 91_100, 79_300, 84_000, 2_500_000),
            ("FPT", "FPT Corp", 92_100, 98_600, 85_700, 92_580, 1_800_000),
            ("VIC", "Vingroup", 42_500, 45_500, 39_500, 41_600, 3_200_000),
            ("HPG", "Hòa Phát", 25_800, 27_600, 24_000, 25_500, 5_600_000),
            ("VCB", "Vietcombank", 98_500, 105_400, 91_700, 98_000, 980_000),
            ("TCB", "Techcombank", 32_100, 34_400, 29_900, 32_200, 2_800_000),
            ("MWG", "Thế Giới Di Động", 52_000, 55_700, 48_400, 54_400, 1_900_000),
            ("SSI", "SSI Securities", 32_500, 34_800, 30_200, 31_700, 2_900_000),
        ];

        for (symbol, name, last, ceiling, floor, reference, volume) in seed {
            source.upsert(
                name,
                Quote {
                    symbol: symbol.to_string(),
                    last,
                    ceiling,
                    floor,
                    reference,
                    volume,
                },
            );
        }
        source
    }

    /// Add a listing or replace its quote
    pub fn upsert(&self, name: &str, quote: Quote) {
        if !quote.is_consistent() {
            tracing::warn!(
                symbol = %quote.symbol,
                floor = quote.floor,
                reference = quote.reference,
                ceiling = quote.ceiling,
                "Quote reference price outside its band"
            );
        }
        let info = SymbolInfo {
            symbol: quote.symbol.clone(),
            name: name.to_string(),
        };
        self.listings.insert(quote.symbol.clone(), Listing { info, quote });
    }
}

impl Default for InMemoryQuoteSource {
    fn default() -> Self {
        Self::new()
    }
}

impl QuoteSource for InMemoryQuoteSource {
    fn get_quote(&self, symbol: &str) -> Option<Quote> {
        self.listings
            .get(&symbol.to_uppercase())
            .map(|listing| listing.quote.clone())
    }

    fn search(&self, query: &str) -> Vec<SymbolInfo> {
        let query = query.trim();
        let mut matches: Vec<SymbolInfo> = self
            .listings
            .iter()
            .filter(|listing| listing.info.matches(query))
            .map(|listing| listing.info.clone())
            .collect();
        matches.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        matches
    }
}
