//! Static content shown on the landing page: supported corridors and the fee
//! comparison against incumbent providers.

use serde::Serialize;

/// A destination country money can be sent to.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Country {
    pub name: &'static str,
    pub code: &'static str,
    pub currency: &'static str,
    pub description: &'static str,
}

/// One row of the fee comparison table.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FeeQuote {
    pub provider: &'static str,
    /// Flat fee in US cents.
    pub fee_cents: u32,
    pub delivery_time: &'static str,
    pub recommended: bool,
}

pub const COUNTRIES: [Country; 3] = [
    Country {
        name: "France",
        code: "FR",
        currency: "EUR",
        description: "Fast transfers to all major French banks",
    },
    Country {
        name: "United States",
        code: "US",
        currency: "USD",
        description: "Instant deposits across the United States",
    },
    Country {
        name: "Thailand",
        code: "TH",
        currency: "THB",
        description: "Quick and reliable transfers throughout Thailand",
    },
];

pub const FEE_QUOTES: [FeeQuote; 4] = [
    FeeQuote {
        provider: "CoinVoy",
        fee_cents: 250,
        delivery_time: "5-10 minutes",
        recommended: true,
    },
    FeeQuote {
        provider: "Traditional Bank",
        fee_cents: 4500,
        delivery_time: "3-5 days",
        recommended: false,
    },
    FeeQuote {
        provider: "Western Union",
        fee_cents: 3500,
        delivery_time: "1-2 days",
        recommended: false,
    },
    FeeQuote {
        provider: "PayPal",
        fee_cents: 2500,
        delivery_time: "1-3 days",
        recommended: false,
    },
];

/// Currencies a fiat transfer can be recorded in.
pub fn fiat_currencies() -> impl Iterator<Item = &'static str> {
    COUNTRIES.iter().map(|c| c.currency)
}
