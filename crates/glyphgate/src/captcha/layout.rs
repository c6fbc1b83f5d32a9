//! Grid layout: where glyphs go on the challenge canvas.
//!
//! Pure and deterministic. Randomness (rotation, size jitter) is applied by
//! the compositor on top of the cells computed here.

use serde::Serialize;

/// Top-left offset of one grid cell (padding already applied)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridCell {
    pub x: u32,
    pub y: u32,
}

/// Size envelope shared by every item of a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub width: u32,
    pub height: u32,
}

impl Envelope {
    /// `(smaller side, larger side)`
    pub fn side_range(&self) -> (u32, u32) {
        (self.width.min(self.height), self.width.max(self.height))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridLayout {
    pub columns: u32,
    pub rows: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    /// Column-major: all cells of column 0 first, then column 1, ...
    pub cells: Vec<GridCell>,
    pub envelope: Envelope,
}

/// Smallest near-square grid holding `item_count` items.
///
/// Starting from 1x1, grows whichever side is smaller, columns on ties.
pub fn grid_dimensions(item_count: usize) -> (u32, u32) {
    let (mut columns, mut rows) = (1u32, 1u32);
    while ((columns * rows) as usize) < item_count {
        if columns <= rows {
            columns += 1;
        } else {
            rows += 1;
        }
    }
    (columns, rows)
}

/// Lay out `item_count` items on a `canvas_width` x `canvas_height` canvas.
///
/// Each item gets a cell shrunk by `padding` on every side. A padding too
/// large for the cell yields a zero-sized envelope; picking sane values is on
/// the caller.
pub fn layout(canvas_width: u32, canvas_height: u32, item_count: usize, padding: u32) -> GridLayout {
    let (columns, rows) = grid_dimensions(item_count);

    let cell_width = canvas_width / columns;
    let cell_height = canvas_height / rows;

    let envelope = Envelope {
        width: cell_width.saturating_sub(padding * 2),
        height: cell_height.saturating_sub(padding * 2),
    };

    let cells = (0..columns)
        .flat_map(|x| {
            (0..rows).map(move |y| GridCell {
                x: cell_width * x + padding,
                y: cell_height * y + padding,
            })
        })
        .collect();

    tracing::trace!(
        item_count,
        columns,
        rows,
        cell_width,
        cell_height,
        envelope_width = envelope.width,
        envelope_height = envelope.height,
        "Computed grid layout"
    );

    GridLayout {
        columns,
        rows,
        cell_width,
        cell_height,
        cells,
        envelope,
    }
}
