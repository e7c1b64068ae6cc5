//! Column categories, entity types, field authority and workflow phase.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ModelError;

/// Entity a column can belong to. Only entity columns carry target fields
/// and uniqueness keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Partner,
    Staff,
    Asin,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [EntityType::Partner, EntityType::Staff, EntityType::Asin];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Partner => "partner",
            EntityType::Staff => "staff",
            EntityType::Asin => "asin",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "partner" => Ok(EntityType::Partner),
            "staff" => Ok(EntityType::Staff),
            "asin" => Ok(EntityType::Asin),
            _ => Err(ModelError::UnknownEntity(s.to_string())),
        }
    }
}

/// Classification of a source column.
///
/// `Unclassified` is serialized as `null` so that persisted drafts keep the
/// same shape as mappings written by other clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Category {
    Partner,
    Staff,
    Asin,
    /// Time-series column (one column per week).
    Weekly,
    /// Derived from other columns via a [`ComputedConfig`](crate::ComputedConfig).
    Computed,
    Skip,
    #[default]
    Unclassified,
}

impl Category {
    /// Returns the entity type for entity categories.
    pub fn entity(&self) -> Option<EntityType> {
        match self {
            Category::Partner => Some(EntityType::Partner),
            Category::Staff => Some(EntityType::Staff),
            Category::Asin => Some(EntityType::Asin),
            Category::Weekly | Category::Computed | Category::Skip | Category::Unclassified => {
                None
            }
        }
    }

    pub fn is_entity(&self) -> bool {
        self.entity().is_some()
    }

    /// Whether a column of this category may hold a uniqueness key.
    pub fn is_keyable(&self) -> bool {
        self.is_entity()
    }

    pub fn is_classified(&self) -> bool {
        !matches!(self, Category::Unclassified)
    }

    /// Canonical lower-case name, `None` for unclassified.
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            Category::Partner => Some("partner"),
            Category::Staff => Some("staff"),
            Category::Asin => Some("asin"),
            Category::Weekly => Some("weekly"),
            Category::Computed => Some("computed"),
            Category::Skip => Some("skip"),
            Category::Unclassified => None,
        }
    }

    /// Parses an optional raw category, treating `None` and blank strings as
    /// unclassified.
    pub fn parse_optional(raw: Option<&str>) -> Result<Self, ModelError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Category::Unclassified),
            Some(value) => value.parse(),
        }
    }
}

impl From<EntityType> for Category {
    fn from(entity: EntityType) -> Self {
        match entity {
            EntityType::Partner => Category::Partner,
            EntityType::Staff => Category::Staff,
            EntityType::Asin => Category::Asin,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or("unclassified"))
    }
}

impl FromStr for Category {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "partner" => Ok(Category::Partner),
            "staff" => Ok(Category::Staff),
            "asin" => Ok(Category::Asin),
            "weekly" => Ok(Category::Weekly),
            "computed" => Ok(Category::Computed),
            "skip" => Ok(Category::Skip),
            "unclassified" | "null" | "none" => Ok(Category::Unclassified),
            _ => Err(ModelError::UnknownCategory(s.to_string())),
        }
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_str() {
            Some(name) => serializer.serialize_str(name),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Category::parse_optional(raw.as_deref()).map_err(serde::de::Error::custom)
    }
}

/// Whether this sheet is authoritative for a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authority {
    #[default]
    SourceOfTruth,
    Reference,
}

impl Authority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Authority::SourceOfTruth => "source_of_truth",
            Authority::Reference => "reference",
        }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Authority {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "source_of_truth" => Ok(Authority::SourceOfTruth),
            "reference" => Ok(Authority::Reference),
            _ => Err(ModelError::UnknownAuthority(s.to_string())),
        }
    }
}

/// Workflow phase of a mapping session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Preview,
    Classify,
    Map,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Preview => "preview",
            Phase::Classify => "classify",
            Phase::Map => "map",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unclassified_serializes_as_null() {
        let json = serde_json::to_string(&Category::Unclassified).unwrap();
        assert_eq!(json, "null");
        let parsed: Category = serde_json::from_str("null").unwrap();
        assert_eq!(parsed, Category::Unclassified);
    }

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("Partner".parse::<Category>().unwrap(), Category::Partner);
        assert_eq!(" WEEKLY ".parse::<Category>().unwrap(), Category::Weekly);
        assert!("vendor".parse::<Category>().is_err());
    }

    #[test]
    fn only_entity_categories_are_keyable() {
        assert!(Category::Asin.is_keyable());
        for category in [
            Category::Weekly,
            Category::Computed,
            Category::Skip,
            Category::Unclassified,
        ] {
            assert!(!category.is_keyable(), "{category} must not be keyable");
        }
    }

    #[test]
    fn authority_accepts_hyphenated_form() {
        assert_eq!(
            "source-of-truth".parse::<Authority>().unwrap(),
            Authority::SourceOfTruth
        );
    }
}
