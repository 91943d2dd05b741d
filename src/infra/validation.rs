//! Utilities for validating constraints on types.

use serde::Deserialize;
use validator::{Validate, ValidationErrors};

/// A type that cannot be instatiated without validating the value within.
/// That is, if you have a [`Valid<T>`], `T` is guaranteed to be valid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Valid<T> {
    value: T,
}

impl<T> Valid<T> {
    /// Constructs a new validated value.
    pub fn new(value: T) -> Result<Valid<T>, ValidationErrors>
    where
        T: Validate,
    {
        value.validate().map(|_| Valid { value })
    }

    /// Returns a reference to the validated value.
    pub fn inner(&self) -> &T {
        &self.value
    }

    /// Returns the validated value.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> AsRef<T> for Valid<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

impl<'de, T: Deserialize<'de> + Validate> Deserialize<'de> for Valid<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value: T = T::deserialize(deserializer)?;
        Valid::new(value).map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::Valid;
    use crate::api::item::item_repository::{NewItem, UpdateItem};

    #[test]
    pub fn valid_item_succeeds() {
        let data = r#"
            {
                "title": "Buy milk",
                "description": "Two liters"
            }
        "#;
        let value = serde_json::from_str::<Valid<NewItem>>(data);
        assert!(value.is_ok());
    }

    #[test]
    pub fn empty_title_fails() {
        let data = r#"
            {
                "title": "",
                "description": "Two liters"
            }
        "#;
        let value = serde_json::from_str::<Valid<NewItem>>(data);
        assert!(value.is_err());
    }

    #[test]
    pub fn overlong_title_fails() {
        let title = "x".repeat(101);
        let data = format!(r#"{{ "title": "{title}" }}"#);
        let value = serde_json::from_str::<Valid<NewItem>>(&data);
        assert!(value.is_err());
    }

    #[test]
    pub fn overlong_description_fails() {
        let description = "x".repeat(501);
        let data = format!(r#"{{ "title": "Buy milk", "description": "{description}" }}"#);
        let value = serde_json::from_str::<Valid<NewItem>>(&data);
        assert!(value.is_err());
    }

    #[test]
    pub fn overlong_update_description_fails() {
        let description = "x".repeat(501);
        let data = format!(r#"{{ "description": "{description}" }}"#);
        let value = serde_json::from_str::<Valid<UpdateItem>>(&data);
        assert!(value.is_err());
    }
}
