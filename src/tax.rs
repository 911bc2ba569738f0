//! Regional tax rate tables and the short/long-term assessment of a single
//! realized gain.

use std::fmt;
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxRegion {
    UsFederal,
    UsCalifornia,
    UsNewYork,
    UsTexas,
    UsFlorida,
    Uk,
    India,
    Germany,
    Australia,
    Canada,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaxRegionConfig {
    pub name: &'static str,
    pub currency: &'static str,
    pub short_term_threshold_days: i64,
    pub short_term_rate: f64,
    pub long_term_rate: f64,
    pub annual_exemption: Option<f64>,
    pub has_state_tax: bool,
    pub wash_sale_applies: bool,
    pub description: &'static str,
}

// highest brackets throughout
const US_FEDERAL: TaxRegionConfig = TaxRegionConfig {
    name: "United States (Federal)",
    currency: "USD",
    short_term_threshold_days: 365,
    short_term_rate: 0.37,
    long_term_rate: 0.20,
    annual_exemption: None,
    has_state_tax: true,
    wash_sale_applies: false,
    description: "Federal tax rates (highest bracket)",
};

const US_CALIFORNIA: TaxRegionConfig = TaxRegionConfig {
    name: "California, USA",
    short_term_rate: 0.37 + 0.133,
    long_term_rate: 0.20 + 0.133,
    description: "Federal + California state tax (highest brackets)",
    ..US_FEDERAL
};

const US_NEW_YORK: TaxRegionConfig = TaxRegionConfig {
    name: "New York, USA",
    short_term_rate: 0.37 + 0.109,
    long_term_rate: 0.20 + 0.109,
    description: "Federal + New York state tax (highest brackets)",
    ..US_FEDERAL
};

const US_TEXAS: TaxRegionConfig = TaxRegionConfig {
    name: "Texas, USA",
    has_state_tax: false,
    description: "Federal tax only (no state income tax)",
    ..US_FEDERAL
};

const US_FLORIDA: TaxRegionConfig = TaxRegionConfig {
    name: "Florida, USA",
    has_state_tax: false,
    description: "Federal tax only (no state income tax)",
    ..US_FEDERAL
};

const UK: TaxRegionConfig = TaxRegionConfig {
    name: "United Kingdom",
    currency: "GBP",
    short_term_threshold_days: 0,
    short_term_rate: 0.20,
    long_term_rate: 0.20,
    annual_exemption: Some(6000.0),
    has_state_tax: false,
    wash_sale_applies: false,
    description: "20% CGT on gains above £6,000 annual exemption",
};

const INDIA: TaxRegionConfig = TaxRegionConfig {
    name: "India",
    currency: "INR",
    short_term_threshold_days: 365,
    short_term_rate: 0.30,
    long_term_rate: 0.20,
    annual_exemption: None,
    has_state_tax: false,
    wash_sale_applies: false,
    description: "30% on short-term, 20% on long-term gains",
};

const GERMANY: TaxRegionConfig = TaxRegionConfig {
    name: "Germany",
    currency: "EUR",
    short_term_rate: 0.45,
    long_term_rate: 0.0,
    description: "Tax-free if held >1 year, otherwise up to 45%",
    ..INDIA
};

const AUSTRALIA: TaxRegionConfig = TaxRegionConfig {
    name: "Australia",
    currency: "AUD",
    short_term_rate: 0.45,
    long_term_rate: 0.225,
    description: "50% discount on gains if held >1 year",
    ..INDIA
};

const CANADA: TaxRegionConfig = TaxRegionConfig {
    name: "Canada",
    currency: "CAD",
    short_term_threshold_days: 0,
    short_term_rate: 0.535 * 0.5,
    long_term_rate: 0.535 * 0.5,
    annual_exemption: None,
    has_state_tax: true,
    wash_sale_applies: true,
    description: "50% of gains included in income (highest bracket)",
};

impl TaxRegion {
    pub const ALL: [TaxRegion; 10] = [
        TaxRegion::UsFederal,
        TaxRegion::UsCalifornia,
        TaxRegion::UsNewYork,
        TaxRegion::UsTexas,
        TaxRegion::UsFlorida,
        TaxRegion::Uk,
        TaxRegion::India,
        TaxRegion::Germany,
        TaxRegion::Australia,
        TaxRegion::Canada,
    ];

    pub fn id(self) -> &'static str {
        match self {
            TaxRegion::UsFederal => "us_federal",
            TaxRegion::UsCalifornia => "us_california",
            TaxRegion::UsNewYork => "us_new_york",
            TaxRegion::UsTexas => "us_texas",
            TaxRegion::UsFlorida => "us_florida",
            TaxRegion::Uk => "uk",
            TaxRegion::India => "india",
            TaxRegion::Germany => "germany",
            TaxRegion::Australia => "australia",
            TaxRegion::Canada => "canada",
        }
    }

    pub fn config(self) -> &'static TaxRegionConfig {
        match self {
            TaxRegion::UsFederal => &US_FEDERAL,
            TaxRegion::UsCalifornia => &US_CALIFORNIA,
            TaxRegion::UsNewYork => &US_NEW_YORK,
            TaxRegion::UsTexas => &US_TEXAS,
            TaxRegion::UsFlorida => &US_FLORIDA,
            TaxRegion::Uk => &UK,
            TaxRegion::India => &INDIA,
            TaxRegion::Germany => &GERMANY,
            TaxRegion::Australia => &AUSTRALIA,
            TaxRegion::Canada => &CANADA,
        }
    }

    /// Looks up a region by id, falling back to US federal.
    pub fn from_id_or_default(id: &str) -> TaxRegion {
        id.parse().unwrap_or_else(|_| {
            warn!("Unknown tax region \"{}\", using {}", id, TaxRegion::default().id());
            TaxRegion::default()
        })
    }
}

impl Default for TaxRegion {
    fn default() -> TaxRegion {
        TaxRegion::UsFederal
    }
}

impl FromStr for TaxRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<TaxRegion, String> {
        let id = s.trim().to_lowercase();
        TaxRegion::ALL
            .iter()
            .copied()
            .find(|region| region.id() == id)
            .ok_or_else(|| format!("unknown tax region: {}", s))
    }
}

impl fmt::Display for TaxRegion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Term {
    #[serde(rename = "Short-term")]
    ShortTerm,
    #[serde(rename = "Long-term")]
    LongTerm,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Term::ShortTerm => "Short-term",
            Term::LongTerm => "Long-term",
            Term::NotApplicable => "N/A",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TaxAssessment {
    pub liability: f64,
    pub term: Term,
}

impl TaxRegionConfig {
    pub fn is_long_term(&self, holding_days: i64) -> bool {
        holding_days >= self.short_term_threshold_days
    }

    /// Losses and break-even disposals carry no liability.
    pub fn assess(&self, gain: f64, holding_days: i64) -> TaxAssessment {
        if gain <= 0.0 {
            return TaxAssessment { liability: 0.0, term: Term::NotApplicable };
        }
        let (rate, term) = if self.is_long_term(holding_days) {
            (self.long_term_rate, Term::LongTerm)
        } else {
            (self.short_term_rate, Term::ShortTerm)
        };
        TaxAssessment { liability: gain * rate, term }
    }
}
