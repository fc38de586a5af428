use crate::mask::OccupancyGrid;

/// Summed-area table over an [`OccupancyGrid`].
///
/// The table carries a zero row and a zero column in front, so entry
/// `(x + 1, y + 1)` holds the number of occupied cells in `[0, x] × [0, y]`
/// and every rectangle query is four lookups.
///
/// <https://blog.demofox.org/2018/04/16/prefix-sums-and-summed-area-tables/>
#[derive(Clone, Debug)]
pub struct SummedAreaTable {
    table: Vec<u32>,
    width: usize,
    height: usize,
}

impl SummedAreaTable {
    pub fn new(grid: &OccupancyGrid) -> Self {
        let width = grid.width() as usize;
        let height = grid.height() as usize;
        let mut sat = SummedAreaTable {
            table: vec![0; (width + 1) * (height + 1)],
            width,
            height,
        };
        sat.refresh_from_row(grid, 0);
        sat
    }

    fn stride(&self) -> usize {
        self.width + 1
    }

    /// Recomputes the sums for grid rows `start_row..height`.
    ///
    /// Rows above `start_row` only depend on cells above it, so after marking a
    /// rectangle it is enough to refresh from the rectangle's top row.
    pub fn refresh_from_row(&mut self, grid: &OccupancyGrid, start_row: usize) {
        let stride = self.stride();
        for y in start_row..self.height {
            let (above, rest) = self.table.split_at_mut((y + 1) * stride);
            let prev_row = &above[y * stride..];
            let row = &mut rest[..stride];

            let mut sum = 0;
            for (x, occupied) in grid.row(y).iter().enumerate() {
                sum += u32::from(*occupied);
                row[x + 1] = prev_row[x + 1] + sum;
            }
        }
    }

    /// Number of occupied cells in the rectangle. The rectangle must lie inside the grid.
    pub fn region_sum(&self, x: usize, y: usize, width: usize, height: usize) -> u32 {
        let stride = self.stride();
        let tl = self.table[y * stride + x];
        let tr = self.table[y * stride + x + width];
        let bl = self.table[(y + height) * stride + x];
        let br = self.table[(y + height) * stride + x + width];

        (br + tl) - (tr + bl)
    }

    pub fn region_is_empty(&self, x: usize, y: usize, width: usize, height: usize) -> bool {
        self.region_sum(x, y, width, height) == 0
    }

    /// Occupied cells in the whole grid.
    pub fn total(&self) -> u32 {
        self.table.last().copied().unwrap_or(0)
    }
}
