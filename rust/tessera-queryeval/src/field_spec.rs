use crate::index_env::FieldId;
use crate::match_data::TermFieldHandle;

/// A physical field a term is searched in, together with the match-data slot
/// the resulting iterator unpacks into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    name: String,
    field_id: FieldId,
    handle: TermFieldHandle,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_id: FieldId, handle: TermFieldHandle) -> FieldSpec {
        FieldSpec {
            name: name.into(),
            field_id,
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_id(&self) -> FieldId {
        self.field_id
    }

    pub fn handle(&self) -> TermFieldHandle {
        self.handle
    }
}
