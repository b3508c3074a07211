//! Grid model: faction ownership per cell.

use glam::DVec2;
use protocol::cells;

use crate::config::GridConfig;
use crate::error::EngineError;
use crate::faction::{self, Faction};

/// Rectangular array of faction-owned cells, row-major (`y * cols + x`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    dims: GridConfig,
    cells: Vec<Faction>,
}

impl Grid {
    /// All-neutral grid.
    pub fn new(dims: GridConfig) -> Result<Self, EngineError> {
        Self::check_dims(&dims)?;
        let len = dims.rows as usize * dims.cols as usize;
        Ok(Self {
            dims,
            cells: vec![Faction::Neutral; len],
        })
    }

    /// Grid painted with every faction's starting territory.
    pub fn with_initial_territory(dims: GridConfig) -> Result<Self, EngineError> {
        let mut grid = Self::new(dims)?;
        for y in 0..dims.rows {
            for x in 0..dims.cols {
                let owner = faction::initial_owner(x, y, dims.rows, dims.cols);
                grid.set(x, y, owner);
            }
        }
        Ok(grid)
    }

    pub fn from_cells(dims: GridConfig, cells: Vec<Faction>) -> Result<Self, EngineError> {
        Self::check_dims(&dims)?;
        let expected = dims.rows as usize * dims.cols as usize;
        if cells.len() != expected {
            return Err(EngineError::Config(format!(
                "expected {expected} cells, got {}",
                cells.len()
            )));
        }
        Ok(Self { dims, cells })
    }

    fn check_dims(dims: &GridConfig) -> Result<(), EngineError> {
        if dims.rows == 0 || dims.cols == 0 || dims.cell_width == 0 || dims.cell_height == 0 {
            return Err(EngineError::Config(format!(
                "grid {}x{} with {}x{}px cells has zero size",
                dims.rows, dims.cols, dims.cell_width, dims.cell_height
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn dims(&self) -> &GridConfig {
        &self.dims
    }

    #[inline]
    pub fn rows(&self) -> u32 {
        self.dims.rows
    }

    #[inline]
    pub fn cols(&self) -> u32 {
        self.dims.cols
    }

    #[inline]
    pub fn cells(&self) -> &[Faction] {
        &self.cells
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.dims.cols && y < self.dims.rows)
            .then(|| y as usize * self.dims.cols as usize + x as usize)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Faction> {
        self.index(x, y).map(|i| self.cells[i])
    }

    /// Set a cell's owner, returning the previous owner. Out-of-range writes are ignored.
    pub fn set(&mut self, x: u32, y: u32, owner: Faction) -> Option<Faction> {
        let i = self.index(x, y)?;
        Some(std::mem::replace(&mut self.cells[i], owner))
    }

    /// Horizontal distance between neighbouring cell origins.
    #[inline]
    pub fn pitch_x(&self) -> f64 {
        (self.dims.cell_width + self.dims.line_width) as f64
    }

    #[inline]
    pub fn pitch_y(&self) -> f64 {
        (self.dims.cell_height + self.dims.line_width) as f64
    }

    /// Pixel extent of the playing field.
    pub fn pixel_size(&self) -> DVec2 {
        DVec2::new(
            self.pitch_x() * self.dims.cols as f64,
            self.pitch_y() * self.dims.rows as f64,
        )
    }

    /// Top-left pixel of cell `(x, y)`.
    pub fn cell_to_pixel(&self, x: u32, y: u32) -> DVec2 {
        DVec2::new(x as f64 * self.pitch_x(), y as f64 * self.pitch_y())
    }

    /// Cell containing pixel `p`, or `None` outside the grid.
    pub fn pixel_to_cell(&self, p: DVec2) -> Option<(u32, u32)> {
        if !(p.x >= 0.0 && p.y >= 0.0) {
            return None;
        }
        let x = (p.x / self.pitch_x()).floor() as u64;
        let y = (p.y / self.pitch_y()).floor() as u64;
        (x < self.dims.cols as u64 && y < self.dims.rows as u64).then_some((x as u32, y as u32))
    }

    /// Packed byte length of [`Grid::serialize`].
    pub fn size(&self) -> u32 {
        cells::packed_len(self.cells.len()) as u32
    }

    pub fn serialize(&self) -> Result<Vec<u8>, EngineError> {
        let raw: Vec<u8> = self.cells.iter().map(|f| f.id()).collect();
        Ok(cells::pack(&raw)?)
    }

    pub fn deserialize(dims: GridConfig, bytes: &[u8]) -> Result<Self, EngineError> {
        Self::check_dims(&dims)?;
        let count = dims.rows as usize * dims.cols as usize;
        let cells = cells::unpack(bytes, count)?
            .into_iter()
            .map(|v| {
                Faction::from_id(v)
                    .ok_or_else(|| EngineError::Config(format!("unknown faction id {v}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { dims, cells })
    }

    /// Cells owned by each faction, indexed by faction id.
    pub fn counts(&self) -> [u32; Faction::ALL.len()] {
        let mut counts = [0u32; Faction::ALL.len()];
        for f in &self.cells {
            counts[f.id() as usize] += 1;
        }
        counts
    }

    /// Faction owning the most cells. Ties go to the lowest faction id; a
    /// grid with no claimed cells yields `(Neutral, 0)`.
    pub fn winner(&self) -> (Faction, u32) {
        let counts = self.counts();
        Faction::PLAYABLE
            .into_iter()
            .fold((Faction::Neutral, 0), |best, f| {
                let score = counts[f.id() as usize];
                if score > best.1 { (f, score) } else { best }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(rows: u32, cols: u32) -> GridConfig {
        GridConfig {
            rows,
            cols,
            ..GridConfig::default()
        }
    }

    #[test]
    fn test_serialize_size_and_round_trip() {
        for (rows, cols) in [(1, 1), (2, 2), (3, 5), (30, 40)] {
            let mut grid = Grid::with_initial_territory(dims(rows, cols)).unwrap();
            grid.set(cols - 1, rows - 1, Faction::Avax);
            let bytes = grid.serialize().unwrap();
            assert_eq!(bytes.len(), grid.size() as usize);
            assert_eq!(Grid::deserialize(dims(rows, cols), &bytes).unwrap(), grid);
        }
    }

    #[test]
    fn test_deserialize_rejects_unknown_faction() {
        let err = Grid::deserialize(dims(1, 2), &[0x19]).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(Grid::new(dims(0, 4)).is_err());
    }

    #[test]
    fn test_pixel_conversion() {
        let grid = Grid::new(dims(30, 40)).unwrap();
        assert_eq!(grid.cell_to_pixel(2, 3), DVec2::new(42.0, 63.0));
        assert_eq!(grid.pixel_to_cell(DVec2::new(42.0, 63.0)), Some((2, 3)));
        assert_eq!(grid.pixel_to_cell(DVec2::new(41.9, 62.9)), Some((1, 2)));
        assert_eq!(grid.pixel_to_cell(DVec2::new(-0.1, 5.0)), None);
        assert_eq!(grid.pixel_to_cell(grid.pixel_size()), None);
    }

    #[test]
    fn test_winner_by_cell_count() {
        let mut cells = vec![Faction::Btc; 120];
        cells.extend(vec![Faction::Eth; 200]);
        cells.extend(vec![Faction::Neutral; 80]);
        let grid = Grid::from_cells(dims(20, 20), cells).unwrap();
        assert_eq!(grid.winner(), (Faction::Eth, 200));
    }

    #[test]
    fn test_winner_tie_goes_to_lowest_id() {
        let cells = vec![Faction::Matic, Faction::Bnb, Faction::Bnb, Faction::Matic];
        let grid = Grid::from_cells(dims(2, 2), cells).unwrap();
        assert_eq!(grid.winner(), (Faction::Bnb, 2));
        assert_eq!(Grid::new(dims(2, 2)).unwrap().winner(), (Faction::Neutral, 0));
    }

    #[test]
    fn test_initial_plurality() {
        let grid = Grid::with_initial_territory(GridConfig::default()).unwrap();
        assert_eq!(grid.winner(), (Faction::Btc, 36));
    }
}
