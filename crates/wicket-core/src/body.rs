//! Response body returned by applications.

use std::fmt;

use bytes::Bytes;

type Chunks = Box<dyn Iterator<Item = anyhow::Result<Bytes>>>;

/// A finite sequence of byte chunks.
///
/// The body is consumed exactly once, in order. It can be eager (a list of
/// chunks) or lazy (any iterator), and a lazy body may fail part way through.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use wicket_core::Body;
///
/// let body = Body::from_chunks([Bytes::from_static(b"He"), Bytes::from_static(b"llo")]);
/// let joined: Vec<u8> = body.map(|c| c.unwrap()).flatten().collect();
/// assert_eq!(joined, b"Hello");
/// ```
pub struct Body {
    chunks: Chunks,
}

impl Body {
    /// An empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_chunks(std::iter::empty())
    }

    /// A body made of a single chunk.
    pub fn once(chunk: impl Into<Bytes>) -> Self {
        Self::from_chunks(std::iter::once(chunk.into()))
    }

    /// A body from any sequence of chunks. Lazy iterators stay lazy.
    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Bytes>,
        I::IntoIter: 'static,
    {
        Self {
            chunks: Box::new(chunks.into_iter().map(Ok)),
        }
    }

    /// A body whose chunks may fail while being produced.
    pub fn try_from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = anyhow::Result<Bytes>>,
        I::IntoIter: 'static,
    {
        Self {
            chunks: Box::new(chunks.into_iter()),
        }
    }
}

impl Iterator for Body {
    type Item = anyhow::Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        self.chunks.next()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").finish_non_exhaustive()
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Self::once(Bytes::from_static(s.as_bytes()))
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Self::once(s)
    }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self {
        Self::once(v)
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        Self::once(b)
    }
}

impl From<Vec<Bytes>> for Body {
    fn from(chunks: Vec<Bytes>) -> Self {
        Self::from_chunks(chunks)
    }
}

impl FromIterator<Bytes> for Body {
    fn from_iter<T: IntoIterator<Item = Bytes>>(iter: T) -> Self {
        Self::from_chunks(iter.into_iter().collect::<Vec<_>>())
    }
}
