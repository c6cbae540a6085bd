//! Custom property bags attached to maps, layers, objects and tiles.
//!
//! Properties arrive duck-typed from the document (`[{name, type, value}]`) and
//! are decoded into [`PropertyValue`] once, at load time. Consumers read them
//! through [`Properties::get_as`] and the [`FromTiledProperty`] conversions.

use bevy::platform::collections::HashMap;

/// A single decoded property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// `bool` property.
    BoolValue(bool),
    /// `int` property.
    IntValue(i64),
    /// `float` property.
    FloatValue(f64),
    /// `string` property.
    StringValue(String),
    /// `file` property (path relative to the owning document).
    FileValue(String),
    /// `color` property in `#AARRGGBB` or `#RRGGBB` form.
    ColorValue(String),
    /// `object` property (object id, 0 when unset).
    ObjectValue(u32),
    /// `class` property with nested members.
    ClassValue {
        /// Name of the custom class, empty when not given.
        property_type: String,
        /// Member values.
        properties: Properties,
    },
}

/// Key/value bag of custom properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(HashMap<String, PropertyValue>);

impl Properties {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.0.insert(name.into(), value);
    }

    /// Raw value lookup.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0.get(name)
    }

    /// Typed lookup; `None` when missing or of an incompatible type.
    pub fn get_as<T: FromTiledProperty>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(T::from_property)
    }

    /// String-like lookup without allocating.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            PropertyValue::StringValue(s)
            | PropertyValue::FileValue(s)
            | PropertyValue::ColorValue(s) => Some(s),
            _ => None,
        }
    }

    /// Whether a property with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(name, value)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, PropertyValue)> for Properties {
    fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Conversion from a [`PropertyValue`] into a Rust type.
///
/// Numeric conversions are lenient between `int` and `float` because Tiled
/// writes whole floats without a fractional part.
pub trait FromTiledProperty: Sized {
    /// Attempt the conversion, returning `None` on a type mismatch.
    fn from_property(value: &PropertyValue) -> Option<Self>;
}

impl FromTiledProperty for bool {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::BoolValue(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromTiledProperty for i64 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::IntValue(i) => Some(*i),
            PropertyValue::ObjectValue(id) => Some(i64::from(*id)),
            _ => None,
        }
    }
}

impl FromTiledProperty for i32 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        i64::from_property(value).and_then(|i| i32::try_from(i).ok())
    }
}

impl FromTiledProperty for u32 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        i64::from_property(value).and_then(|i| u32::try_from(i).ok())
    }
}

impl FromTiledProperty for u8 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        i64::from_property(value).and_then(|i| u8::try_from(i).ok())
    }
}

impl FromTiledProperty for f64 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::FloatValue(f) => Some(*f),
            PropertyValue::IntValue(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl FromTiledProperty for f32 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        f64::from_property(value).map(|f| f as f32)
    }
}

impl FromTiledProperty for String {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::StringValue(s)
            | PropertyValue::FileValue(s)
            | PropertyValue::ColorValue(s) => Some(s.clone()),
            _ => None,
        }
    }
}
