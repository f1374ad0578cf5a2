use indexmap::IndexMap;

/// Ordered string map. Key order is insertion order and becomes the CSV
/// column order, so updating an existing key keeps its position.
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: IndexMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Insert or overwrite in place.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Append to an existing value, inserting the key if absent.
    pub fn append(&mut self, key: &str, text: &str) {
        self.fields.entry(key.to_string()).or_default().push_str(text);
    }

    /// Overlay every pair of `other`, keeping positions of keys already present.
    pub fn extend_from(&mut self, other: &Record) {
        for (k, v) in &other.fields {
            self.set(k, v.as_str());
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

// Column order is part of a record's identity.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.fields.iter().eq(other.fields.iter())
    }
}

impl Eq for Record {}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            let key: String = k.into();
            record.set(&key, v);
        }
        record
    }
}
