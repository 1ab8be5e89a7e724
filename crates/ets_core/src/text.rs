//! Source ranges attached to AST nodes and diagnostics.
//!
//! The checker only ever needs the start offset of a node (`Start()` in
//! diagnostics), but ranges are kept whole so that a real parser can hand
//! over its spans unchanged.

use std::fmt;

/// A byte offset into the source text of a module.
pub type TextPos = u32;

/// A half-open `[pos, end)` range of a node in its module's source.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct TextRange {
    pub pos: TextPos,
    pub end: TextPos,
}

impl TextRange {
    #[inline]
    pub fn new(pos: TextPos, end: TextPos) -> Self {
        debug_assert!(end >= pos);
        Self { pos, end }
    }

    /// A zero-length range, used for nodes synthesized by the checker.
    #[inline]
    pub fn empty(pos: TextPos) -> Self {
        Self { pos, end: pos }
    }

    #[inline]
    pub fn len(&self) -> TextPos {
        self.end - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos == self.end
    }

    #[inline]
    pub fn to_span(&self) -> TextSpan {
        TextSpan::new(self.pos, self.len())
    }
}

impl fmt::Debug for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.pos, self.end)
    }
}

/// A `(start, length)` span, the form diagnostics are reported with.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct TextSpan {
    pub start: TextPos,
    pub length: TextPos,
}

impl TextSpan {
    #[inline]
    pub fn new(start: TextPos, length: TextPos) -> Self {
        Self { start, length }
    }

    /// The end position of this span (exclusive).
    #[inline]
    pub fn end(&self) -> TextPos {
        self.start + self.length
    }

    #[inline]
    pub fn contains(&self, pos: TextPos) -> bool {
        pos >= self.start && pos < self.end()
    }
}

impl fmt::Debug for TextSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end())
    }
}

impl fmt::Display for TextSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}

impl From<TextRange> for TextSpan {
    fn from(range: TextRange) -> Self {
        range.to_span()
    }
}
