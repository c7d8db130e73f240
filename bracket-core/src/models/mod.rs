mod bracket;
mod tax_config;

pub use bracket::{
    BracketInput, ColorRef, MaxTaxAmount, NewTaxBracket, RateBand, TaxBracket, UpperBound,
};
pub use tax_config::{CreateTaxConfigInput, NewTaxConfig, TaxConfig, TaxConfigRecord};
