use crate::geometry::{Rect, Size};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Continuous scroll, pages stacked top to bottom at viewport width.
    #[default]
    Vertical,
    /// Paged, pages side by side and fitted to viewport height.
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageDescriptor {
    pub index: usize,
    /// height / width
    pub aspect_ratio: f32,
}

impl PageDescriptor {
    pub fn new(index: usize, aspect_ratio: f32) -> Self {
        Self {
            index,
            aspect_ratio,
        }
    }
}

/// Where one page sits in content space. `start`/`end` run along the scroll axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PagePosition {
    pub index: usize,
    pub start: f32,
    pub end: f32,
    pub rect: Rect,
}

impl PagePosition {
    pub fn extent(&self) -> f32 {
        self.end - self.start
    }

    pub fn size(&self) -> Size {
        self.rect.size()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Layout {
    pub full_size: Size,
    pub positions: Vec<PagePosition>,
}

pub fn compute_layout(
    pages: &[PageDescriptor],
    viewport: Size,
    spacing: f32,
    orientation: Orientation,
) -> Layout {
    if viewport.is_empty() || pages.is_empty() {
        return Layout::default();
    }

    let mut positions = Vec::with_capacity(pages.len());
    let mut cursor = 0.0_f32;

    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            cursor += spacing;
        }

        let width = viewport.width;
        let height = width * page.aspect_ratio;

        let position = match orientation {
            Orientation::Vertical => {
                let rect = Rect::new(0.0, cursor, width, cursor + height);
                PagePosition {
                    index: page.index,
                    start: rect.top,
                    end: rect.bottom,
                    rect,
                }
            }
            Orientation::Horizontal => {
                let scale = if height > viewport.height {
                    viewport.height / height
                } else {
                    1.0
                };
                let (width, height) = (width * scale, height * scale);
                let top = (viewport.height - height) / 2.0;
                let rect = Rect::new(cursor, top, cursor + width, top + height);
                PagePosition {
                    index: page.index,
                    start: rect.left,
                    end: rect.right,
                    rect,
                }
            }
        };

        cursor = position.end;
        positions.push(position);
    }

    let full_size = match orientation {
        Orientation::Vertical => Size::new(viewport.width, cursor),
        Orientation::Horizontal => Size::new(cursor, viewport.height),
    };

    Layout {
        full_size,
        positions,
    }
}
