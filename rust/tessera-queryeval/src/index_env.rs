//! Index environment: the schema view the query compiler needs to validate
//! resolved field names and pick between index and attribute lookups.

use ahash::AHashMap;

pub type FieldId = u32;

/// How a field is stored and searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Inverted index with positional postings.
    Index,
    /// Forward-stored attribute, searched without positions.
    Attribute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionType {
    Single,
    Array,
    WeightedSet,
}

/// Schema entry for one physical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    name: String,
    id: FieldId,
    field_type: FieldType,
    collection: CollectionType,
}

impl FieldInfo {
    pub fn new(
        field_type: FieldType,
        collection: CollectionType,
        name: impl Into<String>,
        id: FieldId,
    ) -> FieldInfo {
        FieldInfo {
            name: name.into(),
            id,
            field_type,
            collection,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> FieldId {
        self.id
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn collection(&self) -> CollectionType {
        self.collection
    }

    pub fn is_attribute(&self) -> bool {
        self.field_type == FieldType::Attribute
    }
}

/// Read-only field schema, shared between concurrently executing queries.
pub trait IndexEnvironment: Send + Sync {
    fn field_by_name(&self, name: &str) -> Option<&FieldInfo>;

    fn num_fields(&self) -> usize;
}

/// In-memory [`IndexEnvironment`] keyed by field name.
#[derive(Debug, Clone, Default)]
pub struct SimpleIndexEnvironment {
    fields: Vec<FieldInfo>,
    by_name: AHashMap<String, usize>,
}

impl SimpleIndexEnvironment {
    pub fn new() -> SimpleIndexEnvironment {
        Default::default()
    }

    /// Adds a field; a later field with the same name replaces the earlier lookup.
    pub fn add_field(&mut self, field: FieldInfo) -> &mut Self {
        self.by_name.insert(field.name.clone(), self.fields.len());
        self.fields.push(field);
        self
    }

    pub fn with_field(mut self, field: FieldInfo) -> Self {
        self.add_field(field);
        self
    }

    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }
}

impl IndexEnvironment for SimpleIndexEnvironment {
    fn field_by_name(&self, name: &str) -> Option<&FieldInfo> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    fn num_fields(&self) -> usize {
        self.fields.len()
    }
}
