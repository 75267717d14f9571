use serde_json::Value;
use uuid::Uuid;

use super::{Document, ID_FIELD, RepositoryError, RepositoryResult};

/// Equality-predicate query: every `field == value` pair must hold.
///
/// An empty filter matches every record.
///
/// ```
/// use database::repository::Filter;
///
/// let filter = Filter::new().matching("email", "a@b.com").matching("active", true);
/// assert_eq!(filter.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new().matching(ID_FIELD, id.into())
    }

    /// Adds `field == value`, replacing an earlier predicate on the same field.
    pub fn matching(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        match self.predicates.iter_mut().find(|(f, _)| *f == field) {
            Some(existing) => existing.1 = value,
            None => self.predicates.push((field, value)),
        }
        self
    }

    pub fn predicates(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.predicates.iter().map(|(f, v)| (f.as_str(), v))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.predicates
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Rejects ids that are not UUID strings.
    pub fn validate(&self) -> RepositoryResult<()> {
        match self.get(ID_FIELD) {
            Some(Value::String(id)) if Uuid::parse_str(id).is_ok() => Ok(()),
            Some(other) => Err(RepositoryError::InvalidInput(format!(
                "invalid id: {other}"
            ))),
            None => Ok(()),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.predicates
            .iter()
            .all(|(field, expected)| doc.get(field).unwrap_or(&Value::Null) == expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test documents are objects"),
        }
    }

    #[test]
    fn test_matching_replaces_same_field() {
        let filter = Filter::new()
            .matching("email", "old@b.com")
            .matching("email", "new@b.com");
        assert_eq!(filter.len(), 1);
        assert_eq!(filter.get("email"), Some(&json!("new@b.com")));
    }

    #[test]
    fn test_matches_all_predicates() {
        let record = doc(json!({"email": "a@b.com", "active": true, "roles": ["user"]}));

        assert!(Filter::new().matches(&record));
        assert!(Filter::new().matching("email", "a@b.com").matches(&record));
        assert!(
            !Filter::new()
                .matching("email", "a@b.com")
                .matching("active", false)
                .matches(&record)
        );
        assert!(!Filter::new().matching("token", "abc").matches(&record));
        assert!(Filter::new().matching("token", Value::Null).matches(&record));
    }

    #[test]
    fn test_validate_id() {
        assert!(Filter::by_id(Uuid::now_v7().to_string()).validate().is_ok());
        assert!(Filter::new().matching("email", "x").validate().is_ok());

        let err = Filter::by_id("not-a-uuid").validate().unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidInput(_)));

        let err = Filter::new().matching("id", 42).validate().unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidInput(_)));
    }
}
