// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions and the port type registry.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortId(pub Uuid);

impl PortId {
    /// Create a new random port ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PortId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// Data type that can flow through ports
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Numeric value
    Number,
    /// Text value
    String,
    /// Boolean flag
    Boolean,
    /// Image payload
    Image,
    /// Structured record
    Object,
    /// List of values
    Array,
    /// Tabular data set
    Table,
    /// Wildcard, compatible with every type
    Any,
    /// Custom type
    Custom(String),
}

impl DataType {
    /// Get the color for this data type (for UI)
    pub fn color(&self) -> [u8; 3] {
        match self {
            Self::Number => [80, 200, 80],
            Self::String => [200, 180, 150],
            Self::Boolean => [200, 80, 80],
            Self::Image => [100, 150, 200],
            Self::Object => [200, 150, 80],
            Self::Array => [200, 200, 80],
            Self::Table => [80, 200, 200],
            Self::Any => [150, 150, 150],
            Self::Custom(_) => [128, 128, 128],
        }
    }

    /// Whether this is the `any` wildcard
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number => f.write_str("number"),
            Self::String => f.write_str("string"),
            Self::Boolean => f.write_str("boolean"),
            Self::Image => f.write_str("image"),
            Self::Object => f.write_str("object"),
            Self::Array => f.write_str("array"),
            Self::Table => f.write_str("table"),
            Self::Any => f.write_str("any"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// Static compatibility policy between output and input data types.
///
/// The baseline is strict equality with `any` accepted on either side.
/// Extra one-way coercions can be declared when the registry is built;
/// after that it is only ever queried.
#[derive(Debug, Clone, Default)]
pub struct PortTypeRegistry {
    coercions: HashSet<(DataType, DataType)>,
}

impl PortTypeRegistry {
    /// Registry with the baseline policy and no coercions
    pub fn strict() -> Self {
        Self::default()
    }

    /// Registry that additionally accepts each `(output, input)` pair
    pub fn with_coercions(coercions: impl IntoIterator<Item = (DataType, DataType)>) -> Self {
        Self {
            coercions: coercions.into_iter().collect(),
        }
    }

    /// Check if an output of type `output` may feed an input of type `input`
    pub fn is_compatible(&self, output: &DataType, input: &DataType) -> bool {
        if output.is_any() || input.is_any() {
            return true;
        }

        if output == input {
            return true;
        }

        self.coercions.contains(&(output.clone(), input.clone()))
    }
}

/// Port declaration inside a node template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSchema {
    /// Display label
    pub name: String,
    /// Data type
    pub data_type: DataType,
}

impl PortSchema {
    /// Create a new port schema
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// A port on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    /// Port ID, unique within the owning node
    pub id: PortId,
    /// Port name
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Data type
    pub data_type: DataType,
    /// For inputs: whether an incoming connection targets this port.
    /// Always false for outputs. Maintained by the graph store.
    #[serde(default)]
    pub connected: bool,
}

impl Port {
    /// Create a new input port
    pub fn input(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id: PortId::new(),
            name: name.into(),
            direction: PortDirection::Input,
            data_type,
            connected: false,
        }
    }

    /// Create a new output port
    pub fn output(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id: PortId::new(),
            name: name.into(),
            direction: PortDirection::Output,
            data_type,
            connected: false,
        }
    }

    /// Instantiate a schema entry with a fresh port id
    pub fn from_schema(schema: &PortSchema, direction: PortDirection) -> Self {
        match direction {
            PortDirection::Input => Self::input(schema.name.clone(), schema.data_type.clone()),
            PortDirection::Output => Self::output(schema.name.clone(), schema.data_type.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_policy() {
        let registry = PortTypeRegistry::strict();
        assert!(registry.is_compatible(&DataType::Object, &DataType::Object));
        assert!(!registry.is_compatible(&DataType::String, &DataType::Number));
        assert!(!registry.is_compatible(&DataType::Number, &DataType::String));
    }

    #[test]
    fn test_any_is_wildcard_on_both_sides() {
        let registry = PortTypeRegistry::strict();
        assert!(registry.is_compatible(&DataType::Any, &DataType::Image));
        assert!(registry.is_compatible(&DataType::Table, &DataType::Any));
        assert!(registry.is_compatible(
            &DataType::Custom("tensor".into()),
            &DataType::Any
        ));
    }

    #[test]
    fn test_coercions_are_one_way() {
        let registry = PortTypeRegistry::with_coercions([(DataType::Number, DataType::String)]);
        assert!(registry.is_compatible(&DataType::Number, &DataType::String));
        assert!(!registry.is_compatible(&DataType::String, &DataType::Number));
    }

    #[test]
    fn test_custom_types_compare_by_name() {
        let registry = PortTypeRegistry::strict();
        let a = DataType::Custom("tensor".into());
        let b = DataType::Custom("tensor".into());
        let c = DataType::Custom("frame".into());
        assert!(registry.is_compatible(&a, &b));
        assert!(!registry.is_compatible(&a, &c));
    }

    #[test]
    fn test_schema_instances_get_fresh_ids() {
        let schema = PortSchema::new("rows", DataType::Table);
        let a = Port::from_schema(&schema, PortDirection::Output);
        let b = Port::from_schema(&schema, PortDirection::Output);
        assert_ne!(a.id, b.id);
        assert_eq!(a.name, "rows");
        assert!(!a.connected);
    }

    #[test]
    fn test_data_type_tags() {
        let json = serde_json::to_string(&DataType::Image).unwrap();
        assert_eq!(json, "\"image\"");
        assert_eq!(DataType::Object.to_string(), "object");
    }
}
