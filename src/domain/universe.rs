//! Supported companies and ticker-list parsing.
//!
//! The default universe is ten large NSE-listed companies across five
//! sectors. The pipeline itself accepts any ticker.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Sector {
    Banking,
    InformationTechnology,
    ConsumerGoods,
    Telecom,
    EnergyAndIndustrials,
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Sector::Banking => "Banking",
            Sector::InformationTechnology => "Information Technology",
            Sector::ConsumerGoods => "Consumer Goods",
            Sector::Telecom => "Telecom",
            Sector::EnergyAndIndustrials => "Energy & Industrials",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Company {
    pub name: String,
    pub ticker: String,
    pub sector: Sector,
}

impl Company {
    fn new(name: &str, ticker: &str, sector: Sector) -> Self {
        Self {
            name: name.to_string(),
            ticker: ticker.to_string(),
            sector,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Universe {
    pub companies: Vec<Company>,
}

impl Default for Universe {
    fn default() -> Self {
        use Sector::*;
        Self {
            companies: vec![
                Company::new("HDFC Bank", "HDFCBANK.NS", Banking),
                Company::new("ICICI Bank", "ICICIBANK.NS", Banking),
                Company::new("State Bank of India", "SBIN.NS", Banking),
                Company::new("Tata Consultancy Services", "TCS.NS", InformationTechnology),
                Company::new("Infosys", "INFY.NS", InformationTechnology),
                Company::new("Hindustan Unilever", "HINDUNILVR.NS", ConsumerGoods),
                Company::new("ITC", "ITC.NS", ConsumerGoods),
                Company::new("Bharti Airtel", "BHARTIARTL.NS", Telecom),
                Company::new("Reliance Industries", "RELIANCE.NS", EnergyAndIndustrials),
                Company::new("Larsen & Toubro", "LT.NS", EnergyAndIndustrials),
            ],
        }
    }
}

impl Universe {
    pub fn count(&self) -> usize {
        self.companies.len()
    }

    pub fn tickers(&self) -> Vec<String> {
        self.companies.iter().map(|c| c.ticker.clone()).collect()
    }

    pub fn find(&self, ticker: &str) -> Option<&Company> {
        self.companies
            .iter()
            .find(|c| c.ticker.eq_ignore_ascii_case(ticker))
    }

    pub fn by_sector(&self, sector: Sector) -> impl Iterator<Item = &Company> {
        self.companies.iter().filter(move |c| c.sector == sector)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

/// Parse a comma-separated ticker list, upper-casing each entry.
pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}
