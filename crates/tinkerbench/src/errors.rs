//! Mapping from core errors to wire error codes.
//!
//! Every failure a handler can produce converts into a `CommandError`, so
//! handlers just use `?` and the client always sees a non-empty error code.

use benchproto::{CommandError, ErrorCode};

use crate::catalog::CatalogError;
use crate::descriptor::KeyError;
use crate::editor::EditorError;
use crate::graph::GraphError;
use crate::marshal::MarshalError;
use crate::materializer::MaterializeError;
use crate::router::RouteError;

impl From<EditorError> for CommandError {
    fn from(err: EditorError) -> Self {
        let code = match &err {
            EditorError::BlueprintNotFound(_) => ErrorCode::BlueprintNotFound,
            EditorError::GraphNotFound { .. } => ErrorCode::GraphNotFound,
            EditorError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            EditorError::ParentNotFound(_) | EditorError::InvalidName(_) => ErrorCode::InvalidParams,
        };
        CommandError::new(code, err.to_string())
    }
}

impl From<GraphError> for CommandError {
    fn from(err: GraphError) -> Self {
        let code = match &err {
            GraphError::NodeNotFound(_) => ErrorCode::NodeNotFound,
            GraphError::PinNotFound { .. } => ErrorCode::PinNotFound,
            GraphError::IncompatiblePins { .. }
            | GraphError::SameDirection(..)
            | GraphError::SelfLink(_) => ErrorCode::IncompatiblePins,
        };
        CommandError::new(code, err.to_string())
    }
}

impl From<MaterializeError> for CommandError {
    fn from(err: MaterializeError) -> Self {
        let code = match &err {
            MaterializeError::UnresolvedKind(_) => ErrorCode::UnresolvedNodeKind,
            MaterializeError::StaleTemplate { .. } => ErrorCode::StaleTemplate,
            MaterializeError::Rejected(_) => ErrorCode::ConstructionRejected,
            MaterializeError::PinNotFound(_) => ErrorCode::PinNotFound,
        };
        CommandError::new(code, err.to_string())
    }
}

impl From<RouteError> for CommandError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::NoWaypoints | RouteError::PinOccupied { .. } => {
                CommandError::invalid_params(err.to_string())
            }
            RouteError::Graph(e) => e.into(),
            RouteError::Materialize(e) => e.into(),
        }
    }
}

impl From<KeyError> for CommandError {
    fn from(err: KeyError) -> Self {
        CommandError::new(ErrorCode::UnresolvedNodeKind, err.to_string())
    }
}

impl From<CatalogError> for CommandError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Key(e) => e.into(),
            CatalogError::Stale { .. } => CommandError::new(ErrorCode::StaleTemplate, err.to_string()),
        }
    }
}

impl From<MarshalError> for CommandError {
    fn from(err: MarshalError) -> Self {
        let code = match &err {
            MarshalError::Timeout(_) => ErrorCode::MainThreadTimeout,
            MarshalError::Unavailable => ErrorCode::MainThreadUnavailable,
            MarshalError::Panicked(_) => ErrorCode::Internal,
        };
        CommandError::new(code, err.to_string())
    }
}
