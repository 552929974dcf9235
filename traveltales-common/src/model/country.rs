use serde::{Deserialize, Serialize};

/// Stored in place of a capital or currency the upstream source does not
/// list for a country.
pub const NO_DATA_SENTINEL: &str = "N/A";

/// Country attributes copied onto a post at write time. Decoupled from the
/// live external source: once written, the values only change when a post's
/// country is edited and enrichment runs again.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct CountrySnapshot {
    pub flag: String,
    pub currency: String,
    pub capital: String,
}

/// Normalized record returned by the enrichment client.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct CountryData {
    pub name: String,
    pub capital: String,
    pub currency: String,
    pub flag: String,
    pub languages: Vec<String>,
}

impl CountryData {
    #[must_use]
    pub fn snapshot(&self) -> CountrySnapshot {
        CountrySnapshot {
            flag: self.flag.clone(),
            currency: self.currency.clone(),
            capital: self.capital.clone(),
        }
    }
}
