//! Outcome type for network-backed operations

use serde::{Deserialize, Serialize};

use crate::errors::NetworkError;

/// Tagged outcome of a network operation: a payload, an error, or an
/// in-flight marker.
///
/// `Loading` lets callers hold a single value for a request that has not
/// resolved yet without resorting to `Option<Result<..>>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum NetworkResult<T, E = NetworkError> {
    Success(T),
    Error(E),
    Loading,
}

impl<T, E> NetworkResult<T, E> {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(self) -> Option<E> {
        match self {
            Self::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> NetworkResult<U, E> {
        match self {
            Self::Success(value) => NetworkResult::Success(f(value)),
            Self::Error(error) => NetworkResult::Error(error),
            Self::Loading => NetworkResult::Loading,
        }
    }

    pub fn map_err<F2, F: FnOnce(E) -> F2>(self, f: F) -> NetworkResult<T, F2> {
        match self {
            Self::Success(value) => NetworkResult::Success(value),
            Self::Error(error) => NetworkResult::Error(f(error)),
            Self::Loading => NetworkResult::Loading,
        }
    }

    /// Converts a resolved outcome into a `Result`; `None` while loading.
    pub fn into_result(self) -> Option<Result<T, E>> {
        match self {
            Self::Success(value) => Some(Ok(value)),
            Self::Error(error) => Some(Err(error)),
            Self::Loading => None,
        }
    }
}

impl<T, E> From<Result<T, E>> for NetworkResult<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(error) => Self::Error(error),
        }
    }
}
