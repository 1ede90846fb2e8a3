//! Partial update of an existing short URL.

use chrono::{DateTime, Utc};

/// A field of an edit request, explicitly marked as provided or not.
///
/// `Provided(None)` clears a nullable attribute while `NotProvided` leaves it
/// untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EditField<T> {
    #[default]
    NotProvided,
    Provided(T),
}

impl<T> EditField<T> {
    pub fn is_provided(&self) -> bool {
        matches!(self, EditField::Provided(_))
    }

    /// Returns the provided value, if any.
    pub fn provided(self) -> Option<T> {
        match self {
            EditField::Provided(value) => Some(value),
            EditField::NotProvided => None,
        }
    }
}

impl<T> From<T> for EditField<T> {
    fn from(value: T) -> Self {
        EditField::Provided(value)
    }
}

/// Edit request for a short URL.
///
/// Only fields marked as provided are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShortUrlEdit {
    pub long_url: EditField<String>,
    pub tags: EditField<Vec<String>>,
    pub valid_since: EditField<Option<DateTime<Utc>>>,
    pub valid_until: EditField<Option<DateTime<Utc>>>,
    pub max_visits: EditField<Option<i64>>,
    pub title: EditField<Option<String>>,
    pub title_was_auto_resolved: bool,
}

impl ShortUrlEdit {
    /// An edit that provides nothing.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn has_changes(&self) -> bool {
        self.long_url.is_provided()
            || self.tags.is_provided()
            || self.valid_since.is_provided()
            || self.valid_until.is_provided()
            || self.max_visits.is_provided()
            || self.title.is_provided()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_edit_has_no_changes() {
        assert!(!ShortUrlEdit::none().has_changes());
    }

    #[test]
    fn test_provided_null_is_a_change() {
        let edit = ShortUrlEdit {
            max_visits: EditField::Provided(None),
            ..ShortUrlEdit::none()
        };

        assert!(edit.has_changes());
        assert_eq!(edit.max_visits.provided(), Some(None));
    }

    #[test]
    fn test_from_value_marks_as_provided() {
        let field: EditField<String> = "https://example.com".to_string().into();

        assert!(field.is_provided());
    }
}
