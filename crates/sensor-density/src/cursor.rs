//! Forward-only cursors over immutable, ascending point lists.
//!
//! Traversal state is just an index, so the same slice can be replayed by
//! building a fresh cursor.

use sensor_core::{DensityError, Result};

#[derive(Debug, Clone)]
pub struct Cursor<'a, T> {
    items: &'a [T],
    pos: usize,
}

impl<'a, T> Cursor<'a, T> {
    pub fn new(items: &'a [T]) -> Self {
        Self { items, pos: 0 }
    }

    pub fn peek(&self) -> Option<&'a T> {
        self.items.get(self.pos)
    }

    /// Looks `offset` entries past the current one without consuming anything.
    pub fn peek_at(&self, offset: usize) -> Option<&'a T> {
        self.items.get(self.pos + offset)
    }

    pub fn advance(&mut self) -> Option<&'a T> {
        let item = self.items.get(self.pos)?;
        self.pos += 1;
        Some(item)
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.items.len()
    }
}

/// Tracks where a query value falls within one source's known bin positions.
///
/// Queries must arrive in ascending order; points are consumed as the query
/// value passes them.
#[derive(Debug, Clone)]
pub struct NeighbourCursor<'a> {
    points: Cursor<'a, f64>,
    lower: Option<f64>,
}

impl<'a> NeighbourCursor<'a> {
    pub fn new(points: &'a [f64]) -> Self {
        Self {
            points: Cursor::new(points),
            lower: None,
        }
    }

    /// Consumes every point at or below `value`, remembering the largest one
    /// strictly below it.
    pub fn seek(&mut self, value: f64) {
        while let Some(&point) = self.points.peek() {
            if point > value {
                break;
            }
            if point < value {
                self.lower = Some(point);
            }
            self.points.advance();
        }
    }

    /// Largest consumed point strictly below the last query, if any.
    pub fn lower(&self) -> Option<f64> {
        self.lower
    }

    pub fn is_exhausted(&self) -> bool {
        self.points.is_exhausted()
    }

    /// Next known point above the last query.
    ///
    /// Callers check [`is_exhausted`](Self::is_exhausted) first; asking past the
    /// end means the traversal lost track of its own position.
    pub fn upper(&self) -> Result<f64> {
        self.points.peek().copied().ok_or_else(|| {
            DensityError::InternalConsistency("neighbour cursor queried after exhaustion".into())
        })
    }
}
