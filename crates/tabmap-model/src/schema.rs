//! Target field schemas per entity type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::category::EntityType;
use crate::error::Result;

/// A field a column can be mapped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Canonical field name stored in `target_field`.
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub group: Option<String>,
}

impl FieldDefinition {
    pub fn new(name: &str, label: &str, aliases: &[&str], group: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            aliases: aliases.iter().map(|a| (*a).to_string()).collect(),
            group: group.map(str::to_string),
        }
    }
}

/// Field definitions keyed by entity, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSchema {
    entities: BTreeMap<EntityType, Vec<FieldDefinition>>,
}

impl FieldSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fields(mut self, entity: EntityType, fields: Vec<FieldDefinition>) -> Self {
        self.entities.insert(entity, fields);
        self
    }

    pub fn fields_for(&self, entity: EntityType) -> &[FieldDefinition] {
        self.entities.get(&entity).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn field(&self, entity: EntityType, name: &str) -> Option<&FieldDefinition> {
        self.fields_for(entity).iter().find(|f| f.name == name)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Schema used when no schema file is configured.
    pub fn builtin() -> Self {
        let partner = vec![
            FieldDefinition::new(
                "brand_name",
                "Brand Name",
                &["Brand", "Partner Name", "Client"],
                Some("identity"),
            ),
            FieldDefinition::new("seller_id", "Seller ID", &["Merchant ID"], Some("identity")),
            FieldDefinition::new(
                "contact_email",
                "Contact Email",
                &["Partner Email"],
                Some("contact"),
            ),
            FieldDefinition::new("status", "Status", &["Partner Status"], Some("lifecycle")),
            FieldDefinition::new("tier", "Tier", &["Service Tier"], Some("lifecycle")),
        ];
        let staff = vec![
            FieldDefinition::new("full_name", "Full Name", &["Name", "Staff Name"], Some("identity")),
            FieldDefinition::new("email", "Email", &["Email Address", "Work Email"], Some("contact")),
            FieldDefinition::new("role", "Role", &["Title", "Position"], Some("assignment")),
            FieldDefinition::new("pod", "Pod", &["Team"], Some("assignment")),
        ];
        let asin = vec![
            FieldDefinition::new("asin", "ASIN", &["Child ASIN"], Some("identity")),
            FieldDefinition::new("parent_asin", "Parent ASIN", &[], Some("identity")),
            FieldDefinition::new("sku", "SKU", &["Seller SKU"], Some("identity")),
            FieldDefinition::new("title", "Title", &["Product Name", "Item Name"], Some("catalog")),
        ];
        Self::new()
            .with_fields(EntityType::Partner, partner)
            .with_fields(EntityType::Staff, staff)
            .with_fields(EntityType::Asin, asin)
    }
}
