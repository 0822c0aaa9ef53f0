//! Data models for resources, recipes and producers

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PlanError;
use crate::rational::Rational;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Item,
    Element,
}

/// An item or element identity. `Empty` stands for "no resource".
///
/// Keys are shared `Arc<str>`s so clones are cheap; two resources with the
/// same kind and key are equal and hash the same.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Resource {
    #[default]
    Empty,
    Item(Arc<str>),
    Element(Arc<str>),
}

impl Resource {
    pub fn item(key: &str) -> Self {
        Resource::Item(Arc::from(key))
    }

    pub fn element(key: &str) -> Self {
        Resource::Element(Arc::from(key))
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Resource::Empty)
    }

    pub fn key(&self) -> &str {
        match self {
            Resource::Empty => "",
            Resource::Item(key) | Resource::Element(key) => key,
        }
    }

    pub fn kind(&self) -> Option<ResourceKind> {
        match self {
            Resource::Empty => None,
            Resource::Item(_) => Some(ResourceKind::Item),
            Resource::Element(_) => Some(ResourceKind::Element),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Empty => write!(f, "<none>"),
            Resource::Item(key) => write!(f, "item:{}", key),
            Resource::Element(key) => write!(f, "element:{}", key),
        }
    }
}

/// `item:<key>`, `element:<key>`, or a bare key (an item).
impl FromStr for Resource {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let resource = if let Some(key) = s.strip_prefix("element:") {
            Resource::element(key.trim())
        } else if let Some(key) = s.strip_prefix("item:") {
            Resource::item(key.trim())
        } else {
            Resource::item(s)
        };
        if resource.key().is_empty() {
            return Err(PlanError::UnknownResource(s.to_string()));
        }
        Ok(resource)
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Resource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Dense recipe id, assigned in catalogue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecipeId(pub u32);

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index into the catalogue's producer table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProducerId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amount {
    pub resource: Resource,
    pub amount: Rational,
}

impl Amount {
    pub fn new(resource: Resource, amount: Rational) -> Self {
        Self { resource, amount }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipeKind {
    /// A raw material source with no inputs.
    Resource,
    Conversion,
}

impl RecipeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipeKind::Resource => "resource",
            RecipeKind::Conversion => "conversion",
        }
    }
}

impl FromStr for RecipeKind {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resource" => Ok(RecipeKind::Resource),
            "conversion" => Ok(RecipeKind::Conversion),
            other => Err(PlanError::UnknownRecipe(format!("kind '{}'", other))),
        }
    }
}

/// A conversion rule. Each resource appears at most once per side.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub id: RecipeId,
    pub identifier: String,
    pub name: String,
    pub kind: RecipeKind,
    pub outputs: Vec<Amount>,
    pub inputs: Vec<Amount>,
    /// Time for one run.
    pub time: Rational,
    pub producers: Vec<ProducerId>,
}

impl Recipe {
    pub fn is_resource(&self) -> bool {
        self.kind == RecipeKind::Resource
    }

    pub fn output_amount(&self, resource: &Resource) -> Rational {
        find_amount(&self.outputs, resource)
    }

    pub fn input_amount(&self, resource: &Resource) -> Rational {
        find_amount(&self.inputs, resource)
    }

    pub fn has_output(&self, resource: &Resource) -> bool {
        self.outputs.iter().any(|a| &a.resource == resource)
    }

    pub fn has_input(&self, resource: &Resource) -> bool {
        self.inputs.iter().any(|a| &a.resource == resource)
    }

    /// Every resource touched by this recipe, outputs first.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.outputs
            .iter()
            .chain(self.inputs.iter())
            .map(|a| &a.resource)
    }
}

fn find_amount(amounts: &[Amount], resource: &Resource) -> Rational {
    amounts
        .iter()
        .find(|a| &a.resource == resource)
        .map(|a| a.amount)
        .unwrap_or(Rational::ZERO)
}

/// A building able to run recipes.
#[derive(Debug, Clone, PartialEq)]
pub struct Producer {
    pub id: ProducerId,
    pub identifier: String,
    pub name: String,
    pub icon: String,
    /// Recipe runs per time unit are multiplied by this.
    pub speed: Rational,
    pub power_usage: Rational,
}
