use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Upper edge of a bracket. Income in `[lower, upper)` falls inside the tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<i64>", into = "Option<i64>")]
pub enum UpperBound {
    Bounded(i64),
    OpenEnded,
}

impl UpperBound {
    pub fn bounded(&self) -> Option<i64> {
        match self {
            Self::Bounded(value) => Some(*value),
            Self::OpenEnded => None,
        }
    }

    pub fn is_open_ended(&self) -> bool {
        matches!(self, Self::OpenEnded)
    }
}

impl From<Option<i64>> for UpperBound {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Self::OpenEnded, Self::Bounded)
    }
}

impl From<UpperBound> for Option<i64> {
    fn from(value: UpperBound) -> Self {
        value.bounded()
    }
}

/// Cumulative tax owed at a bracket's own upper bound.
///
/// The top bracket has no upper bound and therefore no ceiling amount;
/// `OpenEnded` must never be read as zero tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Decimal>", into = "Option<Decimal>")]
pub enum MaxTaxAmount {
    Amount(Decimal),
    OpenEnded,
}

impl MaxTaxAmount {
    pub fn amount(&self) -> Option<Decimal> {
        match self {
            Self::Amount(value) => Some(*value),
            Self::OpenEnded => None,
        }
    }
}

impl From<Option<Decimal>> for MaxTaxAmount {
    fn from(value: Option<Decimal>) -> Self {
        value.map_or(Self::OpenEnded, Self::Amount)
    }
}

impl From<MaxTaxAmount> for Option<Decimal> {
    fn from(value: MaxTaxAmount) -> Self {
        value.amount()
    }
}

/// Display styling token carried with every bracket. Has no effect on tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorRef {
    #[default]
    #[serde(rename = "DEFAULT")]
    Default,
    #[serde(rename = "LEVEL_1")]
    Level1,
    #[serde(rename = "LEVEL_2")]
    Level2,
    #[serde(rename = "LEVEL_3")]
    Level3,
    #[serde(rename = "LEVEL_4")]
    Level4,
    #[serde(rename = "LEVEL_5")]
    Level5,
}

impl ColorRef {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "DEFAULT",
            Self::Level1 => "LEVEL_1",
            Self::Level2 => "LEVEL_2",
            Self::Level3 => "LEVEL_3",
            Self::Level4 => "LEVEL_4",
            Self::Level5 => "LEVEL_5",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DEFAULT" => Some(Self::Default),
            "LEVEL_1" => Some(Self::Level1),
            "LEVEL_2" => Some(Self::Level2),
            "LEVEL_3" => Some(Self::Level3),
            "LEVEL_4" => Some(Self::Level4),
            "LEVEL_5" => Some(Self::Level5),
            _ => None,
        }
    }

    /// Palette colour used by front ends.
    pub fn palette(&self) -> &'static str {
        match self {
            Self::Default => "gray",
            Self::Level1 => "green",
            Self::Level2 => "blue",
            Self::Level3 => "orange",
            Self::Level4 => "red",
            Self::Level5 => "purple",
        }
    }
}

/// The fields every bracket shape shares for rate computation.
pub trait RateBand {
    fn order(&self) -> i32;
    fn lower(&self) -> i64;
    fn upper(&self) -> UpperBound;
    /// Marginal rate as a percentage in `[0, 100]`.
    fn rate(&self) -> Decimal;
}

/// A bracket as supplied by a caller, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketInput {
    pub order: i32,
    pub lower: i64,
    pub upper: UpperBound,
    pub rate: Decimal,
    pub color_ref: ColorRef,
}

/// A validated bracket with its ceiling tax computed, not yet stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTaxBracket {
    pub order: i32,
    pub lower: i64,
    pub upper: UpperBound,
    pub rate: Decimal,
    pub color_ref: ColorRef,
    pub max_tax_amount: MaxTaxAmount,
}

/// A stored bracket owned by one tax configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub id: i64,
    pub tax_config_id: i64,
    pub order: i32,
    pub lower: i64,
    pub upper: UpperBound,
    pub rate: Decimal,
    pub color_ref: ColorRef,
    pub max_tax_amount: MaxTaxAmount,
    pub created_at: DateTime<Utc>,
}

impl From<&TaxBracket> for BracketInput {
    fn from(bracket: &TaxBracket) -> Self {
        Self {
            order: bracket.order,
            lower: bracket.lower,
            upper: bracket.upper,
            rate: bracket.rate,
            color_ref: bracket.color_ref,
        }
    }
}

macro_rules! impl_rate_band {
    ($($ty:ty),+) => {
        $(
            impl RateBand for $ty {
                fn order(&self) -> i32 {
                    self.order
                }
                fn lower(&self) -> i64 {
                    self.lower
                }
                fn upper(&self) -> UpperBound {
                    self.upper
                }
                fn rate(&self) -> Decimal {
                    self.rate
                }
            }
        )+
    };
}

impl_rate_band!(BracketInput, NewTaxBracket, TaxBracket);
