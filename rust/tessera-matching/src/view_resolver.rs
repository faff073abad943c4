use ahash::AHashMap;

/// Maps query-time field names (views) to physical field names.
///
/// A view may fan out to several fields; resolution preserves the order in
/// which fields were added and ignores duplicates. A name without a registered
/// mapping resolves to itself.
#[derive(Debug, Clone, Default)]
pub struct ViewResolver {
    views: AHashMap<String, Vec<String>>,
}

impl ViewResolver {
    pub fn new() -> ViewResolver {
        ViewResolver::default()
    }

    /// Adds `field` to the fields `view` resolves to.
    pub fn add(&mut self, view: impl Into<String>, field: impl Into<String>) -> &mut Self {
        let fields = self.views.entry(view.into()).or_default();
        let field = field.into();
        if !fields.contains(&field) {
            fields.push(field);
        }
        self
    }

    /// Returns the physical fields of `view`, or `[view]` if it has no mapping.
    pub fn resolve(&self, view: &str) -> Vec<String> {
        match self.views.get(view) {
            Some(fields) => fields.clone(),
            None => vec![view.to_string()],
        }
    }
}
