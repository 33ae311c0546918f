//! The unit flowing through an [`ElementStream`](crate::stream::ElementStream)

use crate::error::StreamError;

/// One item of a stream: a produced value or the terminal failure.
///
/// A `Failure` is always the last element a stream delivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element<T> {
    Data(T),
    Failure(StreamError),
}

impl<T> Element<T> {
    pub fn is_data(&self) -> bool {
        matches!(self, Element::Data(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Element::Failure(_))
    }

    /// The value, if this is a `Data` element
    pub fn data(self) -> Option<T> {
        match self {
            Element::Data(value) => Some(value),
            Element::Failure(_) => None,
        }
    }

    /// The failure, if this is a `Failure` element
    pub fn failure(&self) -> Option<&StreamError> {
        match self {
            Element::Data(_) => None,
            Element::Failure(err) => Some(err),
        }
    }

    /// Apply `f` to a `Data` value; failures pass through untouched
    pub fn map<U, F>(self, f: F) -> Element<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Element::Data(value) => Element::Data(f(value)),
            Element::Failure(err) => Element::Failure(err),
        }
    }

    pub fn into_result(self) -> Result<T, StreamError> {
        self.into()
    }
}

impl<T> From<Result<T, StreamError>> for Element<T> {
    fn from(result: Result<T, StreamError>) -> Self {
        match result {
            Ok(value) => Element::Data(value),
            Err(err) => Element::Failure(err),
        }
    }
}

impl<T> From<Element<T>> for Result<T, StreamError> {
    fn from(element: Element<T>) -> Self {
        match element {
            Element::Data(value) => Ok(value),
            Element::Failure(err) => Err(err),
        }
    }
}
