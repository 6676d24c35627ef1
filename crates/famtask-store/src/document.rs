//! Documents, field writes and write preconditions

use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ulid::Ulid;

/// Field map of a stored document
pub type Fields = Map<String, Value>;

/// Document key within a collection
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wrap a caller-chosen key
    #[inline]
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Generate a fresh, time-sortable key
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Borrow the key
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for DocumentId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Per-document write counter, bumped on every write
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Revision(pub u64);

impl Revision {
    /// Revision of a freshly created document
    pub const INITIAL: Revision = Revision(1);

    /// Revision after one more write
    #[inline]
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A stored document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Key within its collection
    pub id: DocumentId,
    /// Write counter
    pub revision: Revision,
    /// Stored fields
    pub fields: Fields,
}

impl Document {
    /// Field value, if present
    #[inline]
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Field decoded as a stored timestamp
    #[must_use]
    pub fn timestamp(&self, field: &str) -> Option<Timestamp> {
        self.get(field).and_then(Timestamp::from_value)
    }

    /// Deserialize the fields into a typed record
    ///
    /// # Errors
    /// Returns the `serde_json` error when the fields do not fit `T`.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.fields.clone()))
    }
}

/// A single field write
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Literal value
    Value(Value),
    /// Replaced by the store's clock at commit time
    ServerTimestamp,
    /// Remove the field
    Delete,
}

/// Ordered list of field writes
///
/// Used both to create documents (`set`/`add`) and to patch them (`update`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    writes: Vec<(String, FieldValue)>,
}

impl Patch {
    /// Empty patch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a literal value
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.writes.push((field.into(), FieldValue::Value(value.into())));
        self
    }

    /// Write the commit-time server clock
    #[must_use]
    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        self.writes.push((field.into(), FieldValue::ServerTimestamp));
        self
    }

    /// Write an explicit instant
    #[must_use]
    pub fn timestamp(self, field: impl Into<String>, ts: Timestamp) -> Self {
        self.set(field, ts.to_value())
    }

    /// Write JSON `null`
    #[must_use]
    pub fn null(self, field: impl Into<String>) -> Self {
        self.set(field, Value::Null)
    }

    /// Remove a field
    #[must_use]
    pub fn delete(mut self, field: impl Into<String>) -> Self {
        self.writes.push((field.into(), FieldValue::Delete));
        self
    }

    /// Pending writes in order
    #[inline]
    #[must_use]
    pub fn writes(&self) -> &[(String, FieldValue)] {
        &self.writes
    }

    /// Whether the patch writes nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Apply onto `fields`, resolving server timestamps to `now`
    pub fn apply(&self, fields: &mut Fields, now: Timestamp) {
        for (field, value) in &self.writes {
            match value {
                FieldValue::Value(v) => {
                    fields.insert(field.clone(), v.clone());
                }
                FieldValue::ServerTimestamp => {
                    fields.insert(field.clone(), now.to_value());
                }
                FieldValue::Delete => {
                    fields.remove(field);
                }
            }
        }
    }
}

/// Condition a write requires of the current document
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Precondition {
    /// No requirement; the document is created if missing
    #[default]
    None,
    /// Document must exist
    Exists,
    /// Document must exist at exactly this revision
    Revision(Revision),
    /// Document must exist and the field must hold this value
    FieldEquals(String, Value),
}

impl Precondition {
    /// Field-equality precondition
    #[must_use]
    pub fn field_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::FieldEquals(field.into(), value.into())
    }

    /// Check against the current document
    ///
    /// Returns a human-readable reason on failure.
    pub fn check(&self, current: Option<&Document>) -> Result<(), String> {
        match (self, current) {
            (Precondition::None, _) => Ok(()),
            (_, None) => Err("document does not exist".to_string()),
            (Precondition::Exists, Some(_)) => Ok(()),
            (Precondition::Revision(expected), Some(doc)) => {
                if doc.revision == *expected {
                    Ok(())
                } else {
                    Err(format!("expected {expected}, found {}", doc.revision))
                }
            }
            (Precondition::FieldEquals(field, expected), Some(doc)) => {
                match doc.get(field) {
                    Some(actual) if actual == expected => Ok(()),
                    Some(actual) => Err(format!("{field} is {actual}, expected {expected}")),
                    None => Err(format!("{field} is missing")),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Document {
        let mut fields = Fields::new();
        fields.insert("status".into(), json!("created"));
        Document {
            id: DocumentId::new("t1"),
            revision: Revision(3),
            fields,
        }
    }

    #[test]
    fn patch_resolves_server_timestamps() {
        let now = Timestamp::new(100, 5);
        let mut fields = Fields::new();
        fields.insert("gone".into(), json!(1));

        Patch::new()
            .set("status", "seen")
            .server_timestamp("seenAt")
            .null("completedAt")
            .delete("gone")
            .apply(&mut fields, now);

        assert_eq!(fields["status"], json!("seen"));
        assert_eq!(Timestamp::from_value(&fields["seenAt"]), Some(now));
        assert_eq!(fields["completedAt"], Value::Null);
        assert!(!fields.contains_key("gone"));
    }

    #[test]
    fn preconditions() {
        let d = doc();
        assert!(Precondition::None.check(None).is_ok());
        assert!(Precondition::Exists.check(None).is_err());
        assert!(Precondition::Revision(Revision(3)).check(Some(&d)).is_ok());
        assert!(Precondition::Revision(Revision(2)).check(Some(&d)).is_err());
        assert!(Precondition::field_equals("status", "created").check(Some(&d)).is_ok());
        assert!(Precondition::field_equals("status", "seen").check(Some(&d)).is_err());
        assert!(Precondition::field_equals("missing", 1).check(Some(&d)).is_err());
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(DocumentId::generate(), DocumentId::generate());
        assert_eq!(Revision::INITIAL.next(), Revision(2));
    }
}
