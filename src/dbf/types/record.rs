//! Record containers and the factories that build them.

use super::value::Value;

/// An ordered mapping from field name to decoded value.
///
/// Key order follows the table's field descriptors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    items: Vec<(String, Value)>,
}

impl Record {
    pub fn new(items: Vec<(String, Value)>) -> Self {
        Self { items }
    }

    /// Looks up a value by field name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.items
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.items.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(key, _)| key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.items.iter().map(|(_, value)| value)
    }

    pub fn into_items(self) -> Vec<(String, Value)> {
        self.items
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Shapes the decoded `(name, value)` pairs of one record into the caller's
/// container type.
///
/// Any `Fn(Vec<(String, Value)>) -> T` closure is a factory, so callers can
/// collect into a `HashMap`, a struct of their own, or anything else.
pub trait RecordFactory {
    /// The container produced for each record.
    type Record;

    fn make_record(&self, items: Vec<(String, Value)>) -> Self::Record;
}

/// The default factory, producing an ordered [`Record`].
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderedRecords;

impl RecordFactory for OrderedRecords {
    type Record = Record;

    fn make_record(&self, items: Vec<(String, Value)>) -> Record {
        Record::new(items)
    }
}

impl<T, G> RecordFactory for G
where
    G: Fn(Vec<(String, Value)>) -> T,
{
    type Record = T;

    fn make_record(&self, items: Vec<(String, Value)>) -> T {
        self(items)
    }
}
