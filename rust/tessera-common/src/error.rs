use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

pub type StdErrorBoxed = Box<dyn std::error::Error + Send + Sync + 'static>;

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_format(element: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidFormat {
                element: element.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    pub fn foreign_handle(handle: impl Into<String>) -> Error {
        Error(
            ErrorKind::ForeignHandle {
                handle: handle.into(),
            }
            .into(),
        )
    }

    pub fn search_context<E>(context: impl Into<String>, source: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error(
            ErrorKind::SearchContext {
                context: context.into(),
                source: Box::new(source),
            }
            .into(),
        )
    }

    pub fn search_context_message(
        context: impl Into<String>,
        message: impl Into<String>,
    ) -> Error {
        let message: String = message.into();
        Error(
            ErrorKind::SearchContext {
                context: context.into(),
                source: message.into(),
            }
            .into(),
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("invalid format for '{element}': {message}")]
    InvalidFormat { element: String, message: String },

    #[error("term field handle {handle} does not belong to this match data")]
    ForeignHandle { handle: String },

    #[error("search context failure: {context}")]
    SearchContext {
        context: String,
        source: StdErrorBoxed,
    },

    #[error("failed to encode '{element}'")]
    Encode {
        element: String,
        source: bincode::error::EncodeError,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<bincode::error::DecodeError> for Error {
    fn from(e: bincode::error::DecodeError) -> Self {
        Error::invalid_format("stack dump", e.to_string())
    }
}

impl From<bincode::error::EncodeError> for Error {
    fn from(e: bincode::error::EncodeError) -> Self {
        ErrorKind::Encode {
            element: "stack dump".to_string(),
            source: e,
        }
        .into()
    }
}
