//! Fixed grid compositor for panel-first pages.
//!
//! The canvas is 2480x3508 (A4 portrait at 300 DPI) with a 40 px margin
//! and two columns. These values are part of the output format.

use crate::core::asset::{GeneratedImage, ImageSource};
use crate::core::error::AssembleError;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};

pub const PAGE_WIDTH: u32 = 2480;
pub const PAGE_HEIGHT: u32 = 3508;
pub const MARGIN: u32 = 40;
pub const COLUMNS: u32 = 2;

/// Most rows that still leave every cell at least 1 px tall.
pub const MAX_ROWS: u32 = (PAGE_HEIGHT - MARGIN) / (MARGIN + 1);
pub const MAX_PANELS: usize = (MAX_ROWS * COLUMNS) as usize;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Cell geometry for a given panel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub rows: u32,
    pub columns: u32,
    pub cell_width: u32,
    pub cell_height: u32,
}

impl GridLayout {
    /// `None` for zero panels, or for more than [`MAX_PANELS`].
    pub fn for_panels(count: usize) -> Option<Self> {
        if count == 0 || count > MAX_PANELS {
            return None;
        }
        let columns = COLUMNS;
        let rows = u32::try_from(count).ok()?.div_ceil(columns);
        let cell_width = PAGE_WIDTH.checked_sub(MARGIN * (columns + 1))? / columns;
        let cell_height = PAGE_HEIGHT.checked_sub(MARGIN * (rows + 1))? / rows;
        if cell_width == 0 || cell_height == 0 {
            return None;
        }
        Some(Self {
            rows,
            columns,
            cell_width,
            cell_height,
        })
    }

    /// Top-left corner of the cell for the panel at `index`.
    pub fn cell_origin(&self, index: usize) -> (u32, u32) {
        let index = index as u32;
        let row = index / self.columns;
        let col = index % self.columns;
        (
            MARGIN + col * (self.cell_width + MARGIN),
            MARGIN + row * (self.cell_height + MARGIN),
        )
    }
}

pub fn blank_page() -> RgbImage {
    RgbImage::from_pixel(PAGE_WIDTH, PAGE_HEIGHT, WHITE)
}

/// Lays the panels out row by row, stretching each to fill its cell.
/// Consumes the panel images. Zero panels give a blank page.
pub fn assemble(page_number: u32, panels: Vec<GeneratedImage>) -> Result<GeneratedImage, AssembleError> {
    if panels.len() > MAX_PANELS {
        return Err(AssembleError::TooManyPanels {
            count: panels.len(),
            max: MAX_PANELS,
        });
    }

    let mut canvas = blank_page();

    if let Some(layout) = GridLayout::for_panels(panels.len()) {
        for (i, panel) in panels.into_iter().enumerate() {
            let resized = imageops::resize(
                &panel.image.to_rgb8(),
                layout.cell_width,
                layout.cell_height,
                FilterType::Lanczos3,
            );
            let (x, y) = layout.cell_origin(i);
            imageops::replace(&mut canvas, &resized, x as i64, y as i64);
        }
    }

    Ok(GeneratedImage::new(ImageSource::Page { page_number }, DynamicImage::ImageRgb8(canvas)))
}
