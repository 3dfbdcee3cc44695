//! Extraction of JSON documents from a streamed response body.
//!
//! Both extractors are fed one body fragment at a time through
//! [`Client::stream`](super::client::Client::stream) and answer with a
//! [`ControlFlow`] telling the client whether to keep the connection open.
//!
//! - [`MultiObject`] parses every fragment on its own and keeps all documents
//!   found in it. It is used for the bounded, time-scoped event log.
//! - [`FirstObject`] accumulates fragments until the buffer holds one complete
//!   document, then asks for the connection to be torn down. It is used for the
//!   stats feed, which the runtime never ends on its own.

use std::ops::ControlFlow;

use serde::de::DeserializeOwned;

/// Number of unparseable accumulations after which [`FirstObject`] gives up.
pub const MAX_PARSE_FAILURES: usize = 2;

/// Parses the first complete JSON document at the start of `buf`.
///
/// Trailing bytes (e.g. the beginning of the next document of an endless
/// stream) are ignored.
fn parse_first<T: DeserializeOwned>(buf: &[u8]) -> Option<T> {
    match serde_json::Deserializer::from_slice(buf)
        .into_iter::<T>()
        .next()
    {
        Some(Ok(value)) => Some(value),
        Some(Err(err)) => {
            log::trace!("incomplete or malformed document ({} bytes): {}", buf.len(), err);
            None
        }
        None => None,
    }
}

/// Yields the first complete document of an endless stream.
///
/// After every fragment the *whole* accumulated buffer is parsed again. On
/// success the document is kept and the connection is released. Once
/// [`MAX_PARSE_FAILURES`] accumulations failed to parse, the connection is
/// released as well and nothing is yielded.
#[derive(Debug)]
pub struct FirstObject<T> {
    buf: Vec<u8>,
    failures: usize,
    value: Option<T>,
}

impl<T: DeserializeOwned> FirstObject<T> {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            failures: 0,
            value: None,
        }
    }

    /// Feeds the next body fragment.
    ///
    /// # Returns
    ///
    /// [`ControlFlow::Break`] when the connection must be torn down, either
    /// because a document was extracted or because the failure budget is
    /// exhausted.
    pub fn push(&mut self, fragment: &[u8]) -> ControlFlow<()> {
        if self.value.is_some() || self.failures >= MAX_PARSE_FAILURES {
            return ControlFlow::Break(());
        }

        self.buf.extend_from_slice(fragment);
        match parse_first(&self.buf) {
            Some(value) => {
                self.value = Some(value);
                ControlFlow::Break(())
            }
            None => {
                self.failures += 1;
                if self.failures >= MAX_PARSE_FAILURES {
                    log::debug!(
                        "giving up on stream after {} unparseable accumulations ({} bytes)",
                        self.failures,
                        self.buf.len()
                    );
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
        }
    }

    /// Returns the extracted document, if any.
    pub fn into_value(self) -> Option<T> {
        self.value
    }
}

impl<T: DeserializeOwned> Default for FirstObject<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum Document<T> {
    Many(Vec<T>),
    One(T),
}

/// Collects every document of a bounded stream, fragment by fragment.
///
/// Each fragment is expected to hold one or more complete documents, each
/// either a JSON array of items or a single item. A fragment that does not
/// parse is dropped as a whole.
#[derive(Debug)]
pub struct MultiObject<T> {
    items: Vec<T>,
    dropped: usize,
}

impl<T: DeserializeOwned> MultiObject<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            dropped: 0,
        }
    }

    /// Feeds the next body fragment. Never asks for an early teardown.
    pub fn push(&mut self, fragment: &[u8]) -> ControlFlow<()> {
        let mut items = Vec::new();
        for document in serde_json::Deserializer::from_slice(fragment).into_iter::<Document<T>>() {
            match document {
                Ok(Document::Many(many)) => items.extend(many),
                Ok(Document::One(one)) => items.push(one),
                Err(err) => {
                    log::debug!("dropping unparseable fragment ({} bytes): {}", fragment.len(), err);
                    self.dropped += 1;
                    return ControlFlow::Continue(());
                }
            }
        }

        self.items.extend(items);
        ControlFlow::Continue(())
    }

    /// Number of fragments dropped so far.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T: DeserializeOwned> Default for MultiObject<T> {
    fn default() -> Self {
        Self::new()
    }
}
