use image::GrayImage;

use crate::error::{Error, Result};

/// Which side of the threshold is excluded from the layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MaskPolarity {
    /// Pixels darker than the threshold are forbidden; near-white areas hold words.
    #[default]
    DarkForbidden,
    /// Pixels at or above the threshold are forbidden; a dark silhouette on a
    /// white background holds words.
    LightForbidden,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaskOptions {
    pub threshold: u8,
    pub polarity: MaskPolarity,
}

impl Default for MaskOptions {
    fn default() -> Self {
        MaskOptions {
            threshold: 128,
            polarity: MaskPolarity::DarkForbidden,
        }
    }
}

impl MaskOptions {
    pub fn with_threshold(mut self, value: u8) -> Self {
        self.threshold = value;
        self
    }

    pub fn with_polarity(mut self, value: MaskPolarity) -> Self {
        self.polarity = value;
        self
    }

    pub fn is_forbidden(&self, luma: u8) -> bool {
        match self.polarity {
            MaskPolarity::DarkForbidden => luma < self.threshold,
            MaskPolarity::LightForbidden => luma >= self.threshold,
        }
    }
}

/// Cells of the canvas that are taken, either by a placed word or by the mask.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OccupancyGrid {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl OccupancyGrid {
    /// A rectangle with every cell free.
    pub fn blank(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidMask(format!(
                "canvas {width}x{height} has zero area"
            )));
        }

        Ok(OccupancyGrid {
            width,
            height,
            cells: vec![false; width as usize * height as usize],
        })
    }

    /// Builds the grid from a grayscale mask. The mask's dimensions become the
    /// canvas dimensions.
    pub fn from_mask(mask: &GrayImage, options: &MaskOptions) -> Result<Self> {
        let (width, height) = mask.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::InvalidMask(format!(
                "mask {width}x{height} has zero area"
            )));
        }

        let cells = mask
            .as_raw()
            .iter()
            .map(|luma| options.is_forbidden(*luma))
            .collect();

        Ok(OccupancyGrid {
            width,
            height,
            cells,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn row(&self, y: usize) -> &[bool] {
        let width = self.width as usize;
        &self.cells[y * width..(y + 1) * width]
    }

    /// Out-of-bounds cells count as occupied.
    pub fn is_occupied(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return true;
        }
        self.cells[y as usize * self.width as usize + x as usize]
    }

    /// Marks a rectangle occupied, clipped to the grid.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32) {
        let x_start = x.min(self.width) as usize;
        let x_end = x.saturating_add(width).min(self.width) as usize;
        let y_end = y.saturating_add(height).min(self.height);
        for yy in y.min(y_end)..y_end {
            let row_start = yy as usize * self.width as usize;
            self.cells[row_start + x_start..row_start + x_end]
                .iter_mut()
                .for_each(|cell| *cell = true);
        }
    }

    /// Cell-by-cell check, used to verify layouts rather than to search them.
    pub fn is_rect_free(&self, x: u32, y: u32, width: u32, height: u32) -> bool {
        if x.saturating_add(width) > self.width || y.saturating_add(height) > self.height {
            return false;
        }
        (y..y + height).all(|yy| self.row(yy as usize)[x as usize..(x + width) as usize]
            .iter()
            .all(|cell| !cell))
    }

    pub fn free_area(&self) -> u64 {
        self.cells.iter().filter(|cell| !**cell).count() as u64
    }
}
