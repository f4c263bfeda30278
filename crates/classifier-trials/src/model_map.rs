//! Ordered, name-keyed collection used for models and their results.
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry<T> {
    name: String,
    #[serde(rename = "model")]
    value: T,
}

/// Insertion-ordered mapping from a unique name to a value.
///
/// Iteration follows insertion order; inserting an existing name replaces
/// the value in place and keeps its position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ModelMap<T> {
    entries: Vec<Entry<T>>,
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for ModelMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<Entry<T>>::deserialize(deserializer)?;
        let mut map = ModelMap::new();
        for entry in entries {
            if map.contains(&entry.name) {
                return Err(D::Error::custom(format!("duplicate name `{}`", entry.name)));
            }
            map.entries.push(entry);
        }
        Ok(map)
    }
}

impl<T> Default for ModelMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> ModelMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns the previous value for `name`, if any.
    pub fn insert(&mut self, name: impl Into<String>, value: T) -> Option<T> {
        let name = name.into();
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => Some(std::mem::replace(&mut entry.value, value)),
            None => {
                self.entries.push(Entry { name, value });
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.iter().find(|e| e.name == name).map(|e| &e.value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find(|e| e.name == name)
            .map(|e| &mut e.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|e| (e.name.as_str(), &e.value))
    }
}

impl<T> IntoIterator for ModelMap<T> {
    type Item = (String, T);
    type IntoIter = std::vec::IntoIter<(String, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries
            .into_iter()
            .map(|e| (e.name, e.value))
            .collect::<Vec<_>>()
            .into_iter()
    }
}

impl<K: Into<String>, T> FromIterator<(K, T)> for ModelMap<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut map = ModelMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_order_and_replaces_in_place() {
        let mut map = ModelMap::new();
        map.insert("b", 1);
        map.insert("a", 2);
        assert_eq!(map.insert("b", 3), Some(1));
        let names: Vec<&str> = map.names().collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(map.get("b"), Some(&3));
        assert!(!map.contains("c"));
    }

    #[test]
    fn test_into_iter_yields_owned_pairs() {
        let map: ModelMap<i32> = vec![("x", 1), ("y", 2)].into_iter().collect();
        let pairs: Vec<(String, i32)> = map.into_iter().collect();
        assert_eq!(pairs, vec![("x".to_string(), 1), ("y".to_string(), 2)]);
    }

    #[test]
    fn test_deserialize_rejects_repeated_names() {
        let ok: ModelMap<i32> =
            serde_json::from_str(r#"[{"name":"KNN","model":1},{"name":"MLP","model":2}]"#).unwrap();
        assert_eq!(ok.names().collect::<Vec<_>>(), vec!["KNN", "MLP"]);

        let err = serde_json::from_str::<ModelMap<i32>>(
            r#"[{"name":"KNN","model":1},{"name":"KNN","model":2}]"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate name `KNN`"));
    }
}
