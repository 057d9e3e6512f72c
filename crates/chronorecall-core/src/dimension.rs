//! The twelve categorical dimensions of an event and their closed enumerations.
//!
//! Values are stored in the catalog as `u16` codes: the position of the value
//! within its dimension's enumeration. Code order is the enumeration order
//! listed here, which is also the order grouped results are reported in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Position of a value within its dimension's enumeration.
pub type ValueCode = u16;

const PRIMARY_CATEGORIES: &[&str] = &[
    "Military & Warfare",
    "Politics & Government",
    "Science & Technology",
    "Arts & Culture",
    "Disasters & Accidents",
    "Sports & Recreation",
    "Economics & Business",
    "Religion & Philosophy",
];

const VIOLENCE_LEVELS: &[&str] = &["peaceful", "violent", "catastrophic"];

const SCALES: &[&str] = &["local", "national", "international", "global"];

const HUMAN_IMPACTS: &[&str] = &["individual", "small group", "mass population"];

const CONTINENTS: &[&str] = &[
    "North America",
    "South America",
    "Europe",
    "Asia",
    "Africa",
    "Oceania",
];

const CULTURAL_REGIONS: &[&str] = &[
    "Western",
    "Eastern",
    "Middle Eastern",
    "African",
    "Latin American",
];

const CENTURIES: &[&str] = &[
    "Pre-1500",
    "1500-1699",
    "1700-1799",
    "1800-1899",
    "1900-1999",
    "2000+",
];

const DECADES: &[&str] = &[
    "1500s", "1510s", "1520s", "1530s", "1540s", "1550s", "1560s", "1570s", "1580s", "1590s",
    "1600s", "1610s", "1620s", "1630s", "1640s", "1650s", "1660s", "1670s", "1680s", "1690s",
    "1700s", "1710s", "1720s", "1730s", "1740s", "1750s", "1760s", "1770s", "1780s", "1790s",
    "1800s", "1810s", "1820s", "1830s", "1840s", "1850s", "1860s", "1870s", "1880s", "1890s",
    "1900s", "1910s", "1920s", "1930s", "1940s", "1950s", "1960s", "1970s", "1980s", "1990s",
    "2000s", "2010s", "2020s",
];

const HISTORICAL_PERIODS: &[&str] = &[
    "Ancient",
    "Medieval",
    "Renaissance",
    "Industrial",
    "Modern",
    "Contemporary",
];

const DEVELOPMENT_STATUSES: &[&str] = &["developed", "developing"];

const COLONIAL_STATUSES: &[&str] = &["colonial", "independent"];

const SEASONS: &[&str] = &["Winter", "Spring", "Summer", "Fall"];

/// A categorical attribute of an [`Event`](crate::catalog::Event).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    PrimaryCategory,
    ViolenceLevel,
    Scale,
    HumanImpact,
    Continent,
    CulturalRegion,
    Century,
    Decade,
    HistoricalPeriod,
    DevelopmentStatus,
    ColonialStatus,
    Season,
}

impl Dimension {
    /// Number of dimensions.
    pub const COUNT: usize = 12;

    /// Every dimension, in declaration order.
    pub const ALL: [Dimension; Dimension::COUNT] = [
        Dimension::PrimaryCategory,
        Dimension::ViolenceLevel,
        Dimension::Scale,
        Dimension::HumanImpact,
        Dimension::Continent,
        Dimension::CulturalRegion,
        Dimension::Century,
        Dimension::Decade,
        Dimension::HistoricalPeriod,
        Dimension::DevelopmentStatus,
        Dimension::ColonialStatus,
        Dimension::Season,
    ];

    /// Dense index in `0..COUNT`.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Field name used in dataset records and filter clauses.
    pub fn name(self) -> &'static str {
        match self {
            Self::PrimaryCategory => "primary_category",
            Self::ViolenceLevel => "violence_level",
            Self::Scale => "scale",
            Self::HumanImpact => "human_impact",
            Self::Continent => "continent",
            Self::CulturalRegion => "cultural_region",
            Self::Century => "century",
            Self::Decade => "decade",
            Self::HistoricalPeriod => "historical_period",
            Self::DevelopmentStatus => "development_status",
            Self::ColonialStatus => "colonial_status",
            Self::Season => "season",
        }
    }

    /// The closed enumeration of legal values.
    pub fn values(self) -> &'static [&'static str] {
        match self {
            Self::PrimaryCategory => PRIMARY_CATEGORIES,
            Self::ViolenceLevel => VIOLENCE_LEVELS,
            Self::Scale => SCALES,
            Self::HumanImpact => HUMAN_IMPACTS,
            Self::Continent => CONTINENTS,
            Self::CulturalRegion => CULTURAL_REGIONS,
            Self::Century => CENTURIES,
            Self::Decade => DECADES,
            Self::HistoricalPeriod => HISTORICAL_PERIODS,
            Self::DevelopmentStatus => DEVELOPMENT_STATUSES,
            Self::ColonialStatus => COLONIAL_STATUSES,
            Self::Season => SEASONS,
        }
    }

    /// Number of values in the enumeration.
    pub fn cardinality(self) -> usize {
        self.values().len()
    }

    /// Code of `value`, or `None` if it is not in the enumeration.
    /// Matching is exact and case-sensitive.
    pub fn code_of(self, value: &str) -> Option<ValueCode> {
        self.values()
            .iter()
            .position(|v| *v == value)
            .map(|pos| pos as ValueCode)
    }

    /// Code of `value`, failing with [`EngineError::UnknownFilterValue`].
    pub fn require_code(self, value: &str) -> Result<ValueCode> {
        self.code_of(value)
            .ok_or_else(|| EngineError::UnknownFilterValue {
                dimension: self.name().to_string(),
                value: value.to_string(),
            })
    }

    /// Value for a code produced by [`Dimension::code_of`].
    pub fn value_of(self, code: ValueCode) -> &'static str {
        self.values()[code as usize]
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dimension {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        // The classifier output names two fields differently.
        let name = match s {
            "continental" => "continent",
            "seasonal" => "season",
            other => other,
        };
        Dimension::ALL
            .into_iter()
            .find(|d| d.name() == name)
            .ok_or_else(|| EngineError::UnknownDimension(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumeration_sizes() {
        let sizes: Vec<usize> = Dimension::ALL.iter().map(|d| d.cardinality()).collect();
        assert_eq!(sizes, vec![8, 3, 4, 3, 6, 5, 6, 53, 6, 2, 2, 4]);
    }

    #[test]
    fn test_index_matches_position_in_all() {
        for (i, d) in Dimension::ALL.iter().enumerate() {
            assert_eq!(d.index(), i);
        }
    }

    #[test]
    fn test_code_roundtrip_for_every_value() {
        for d in Dimension::ALL {
            for (i, v) in d.values().iter().enumerate() {
                let code = d.code_of(v).expect("value in enumeration");
                assert_eq!(code as usize, i);
                assert_eq!(d.value_of(code), *v);
            }
        }
    }

    #[test]
    fn test_code_of_is_case_sensitive() {
        assert!(Dimension::Continent.code_of("europe").is_none());
        assert!(Dimension::Continent.code_of("Europe").is_some());
    }

    #[test]
    fn test_require_code_unknown_value() {
        let err = Dimension::Season.require_code("Monsoon").unwrap_err();
        assert!(matches!(err, EngineError::UnknownFilterValue { .. }));
    }

    #[test]
    fn test_from_str_accepts_names_and_aliases() {
        assert_eq!("decade".parse::<Dimension>().unwrap(), Dimension::Decade);
        assert_eq!("continental".parse::<Dimension>().unwrap(), Dimension::Continent);
        assert_eq!("seasonal".parse::<Dimension>().unwrap(), Dimension::Season);
        assert!(matches!(
            "planet".parse::<Dimension>(),
            Err(EngineError::UnknownDimension(_))
        ));
    }

    #[test]
    fn test_serde_uses_snake_case_names() {
        let json = serde_json::to_string(&Dimension::HistoricalPeriod).unwrap();
        assert_eq!(json, r#""historical_period""#);
    }
}
