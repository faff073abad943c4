use crate::config::MatchingConfig;

/// Per-request settings threaded through query compilation.
///
/// The label tags log lines, so that output of concurrently compiled queries
/// can be told apart.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    label: String,
    config: MatchingConfig,
}

impl RequestContext {
    pub fn new(label: impl Into<String>, config: MatchingConfig) -> RequestContext {
        RequestContext {
            label: label.into(),
            config,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }
}
