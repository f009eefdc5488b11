//! Toroidal scalar grids for the resource field and detritus pool.

use serde::{Deserialize, Serialize};

use crate::arena::Position;
use crate::world::WorldError;

/// 2D grid storing one scalar per cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalarGrid {
    width: u32,
    height: u32,
    cell_size: f32,
    cells: Vec<f32>,
}

impl ScalarGrid {
    /// Construct a grid with `width * height` cells initialised to `initial`.
    pub fn new(width: u32, height: u32, cell_size: f32, initial: f32) -> Result<Self, WorldError> {
        if width == 0 || height == 0 {
            return Err(WorldError::InvalidConfig("grid dimensions must be non-zero"));
        }
        if cell_size <= 0.0 {
            return Err(WorldError::InvalidConfig("grid cell size must be positive"));
        }
        Ok(Self {
            width,
            height,
            cell_size,
            cells: vec![initial; (width as usize) * (height as usize)],
        })
    }

    /// Grid covering a `world_width x world_height` area with square cells.
    pub fn covering(
        world_width: f32,
        world_height: f32,
        cell_size: f32,
        initial: f32,
    ) -> Result<Self, WorldError> {
        if cell_size <= 0.0 {
            return Err(WorldError::InvalidConfig("grid cell size must be positive"));
        }
        let width = (world_width / cell_size).ceil().max(1.0) as u32;
        let height = (world_height / cell_size).ceil().max(1.0) as u32;
        Self::new(width, height, cell_size, initial)
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [f32] {
        &mut self.cells
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        (x < self.width && y < self.height).then(|| self.cells[self.offset(x, y)])
    }

    pub fn get_mut(&mut self, x: u32, y: u32) -> Option<&mut f32> {
        if x < self.width && y < self.height {
            let idx = self.offset(x, y);
            Some(&mut self.cells[idx])
        } else {
            None
        }
    }

    /// Flat index of the cell containing `position`, wrapping out-of-range coordinates.
    #[must_use]
    pub fn cell_index(&self, position: Position) -> usize {
        let cx = (position.x / self.cell_size).floor() as i64;
        let cy = (position.y / self.cell_size).floor() as i64;
        let x = cx.rem_euclid(i64::from(self.width)) as u32;
        let y = cy.rem_euclid(i64::from(self.height)) as u32;
        self.offset(x, y)
    }

    #[must_use]
    pub fn sample(&self, position: Position) -> f32 {
        self.cells[self.cell_index(position)]
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.cells.iter().map(|&v| f64::from(v)).sum()
    }

    pub fn fill(&mut self, value: f32) {
        self.cells.fill(value);
    }
}

/// Rates driving [`ResourceField::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRates {
    pub capacity: f32,
    /// Logistic regrowth per second.
    pub regrowth: f32,
    /// Per-tick diffusion coefficient in `[0, 0.25]`.
    pub diffusion: f32,
    /// Fraction of detritus decaying per second.
    pub decay_rate: f32,
    /// Share of decayed detritus returned as resource.
    pub decay_efficiency: f32,
}

/// Resource and detritus grids plus the energy flows between them.
#[derive(Debug, Clone)]
pub struct ResourceField {
    resource: ScalarGrid,
    detritus: ScalarGrid,
    scratch: Vec<f32>,
    rates: FieldRates,
    heat_loss: f64,
    energy_input: f64,
}

/// Fraction of capacity that keeps regrowth alive in a grazed-out cell.
const REGROWTH_FLOOR: f32 = 0.01;

impl ResourceField {
    pub fn new(
        world_width: f32,
        world_height: f32,
        cell_size: f32,
        initial_fraction: f32,
        rates: FieldRates,
    ) -> Result<Self, WorldError> {
        let resource = ScalarGrid::covering(
            world_width,
            world_height,
            cell_size,
            initial_fraction * rates.capacity,
        )?;
        let detritus = ScalarGrid::covering(world_width, world_height, cell_size, 0.0)?;
        let len = resource.cells().len();
        Ok(Self {
            resource,
            detritus,
            scratch: vec![0.0; len],
            rates,
            heat_loss: 0.0,
            energy_input: 0.0,
        })
    }

    #[must_use]
    pub fn resource(&self) -> &ScalarGrid {
        &self.resource
    }

    #[must_use]
    pub fn detritus(&self) -> &ScalarGrid {
        &self.detritus
    }

    /// Cumulative energy lost as heat.
    #[must_use]
    pub fn heat_loss(&self) -> f64 {
        self.heat_loss
    }

    /// Cumulative energy added by regrowth.
    #[must_use]
    pub fn energy_input(&self) -> f64 {
        self.energy_input
    }

    pub fn add_heat(&mut self, amount: f32) {
        self.heat_loss += f64::from(amount.max(0.0));
    }

    /// Advance diffusion, logistic regrowth, and detritus decay by `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        self.diffuse_and_regrow(dt);
        self.decay_detritus(dt);
    }

    fn diffuse_and_regrow(&mut self, dt: f32) {
        let FieldRates {
            capacity,
            regrowth,
            diffusion,
            ..
        } = self.rates;
        let width = self.resource.width() as usize;
        let height = self.resource.height() as usize;
        self.scratch.copy_from_slice(self.resource.cells());
        let previous = &self.scratch;
        let cells = self.resource.cells_mut();
        let mut input = 0.0f64;

        for y in 0..height {
            let up_row = if y == 0 { height - 1 } else { y - 1 };
            let down_row = if y + 1 == height { 0 } else { y + 1 };
            for x in 0..width {
                let left_col = if x == 0 { width - 1 } else { x - 1 };
                let right_col = if x + 1 == width { 0 } else { x + 1 };
                let idx = y * width + x;
                let mut value = previous[idx];

                if diffusion > 0.0 {
                    let neighbor_avg = (previous[y * width + left_col]
                        + previous[y * width + right_col]
                        + previous[up_row * width + x]
                        + previous[down_row * width + x])
                        * 0.25;
                    value += diffusion * (neighbor_avg - previous[idx]);
                }

                if regrowth > 0.0 {
                    let seeded = value.max(REGROWTH_FLOOR * capacity);
                    let growth = (regrowth * seeded * (1.0 - value / capacity) * dt).max(0.0);
                    value += growth;
                    input += f64::from(growth);
                }

                cells[idx] = value.clamp(0.0, capacity);
            }
        }
        self.energy_input += input;
    }

    fn decay_detritus(&mut self, dt: f32) {
        let FieldRates {
            capacity,
            decay_rate,
            decay_efficiency,
            ..
        } = self.rates;
        if decay_rate <= 0.0 {
            return;
        }
        let fraction = (decay_rate * dt).min(1.0);
        let mut heat = 0.0f64;
        for (detritus, resource) in self
            .detritus
            .cells_mut()
            .iter_mut()
            .zip(self.resource.cells_mut().iter_mut())
        {
            if *detritus <= 0.0 {
                continue;
            }
            let decayed = *detritus * fraction;
            *detritus -= decayed;
            let returned = decayed * decay_efficiency;
            let headroom = (capacity - *resource).max(0.0);
            let absorbed = returned.min(headroom);
            *resource += absorbed;
            heat += f64::from(decayed - absorbed);
        }
        self.heat_loss += heat;
    }

    #[must_use]
    pub fn sample(&self, position: Position) -> f32 {
        self.resource.sample(position)
    }

    /// Remove up to `max_amount` resource from the cell under `position`.
    pub fn graze(&mut self, position: Position, max_amount: f32) -> f32 {
        let idx = self.resource.cell_index(position);
        let cell = &mut self.resource.cells_mut()[idx];
        let taken = cell.min(max_amount.max(0.0));
        *cell -= taken;
        taken
    }

    pub fn deposit_detritus(&mut self, position: Position, amount: f32) {
        if amount <= 0.0 {
            return;
        }
        let idx = self.detritus.cell_index(position);
        self.detritus.cells_mut()[idx] += amount;
    }

    #[must_use]
    pub fn total_resource(&self) -> f64 {
        self.resource.total()
    }

    #[must_use]
    pub fn total_detritus(&self) -> f64 {
        self.detritus.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates() -> FieldRates {
        FieldRates {
            capacity: 1.0,
            regrowth: 0.5,
            diffusion: 0.0,
            decay_rate: 0.5,
            decay_efficiency: 0.5,
        }
    }

    #[test]
    fn grid_accessors_and_wrapping() {
        let mut grid = ScalarGrid::new(4, 2, 10.0, 0.5).expect("grid");
        assert_eq!(grid.get(1, 1), Some(0.5));
        *grid.get_mut(2, 0).expect("cell") = 3.0;
        assert_eq!(grid.get(2, 0), Some(3.0));
        assert!(grid.get(5, 0).is_none());
        assert_eq!(grid.sample(Position::new(25.0, 5.0)), 3.0);
        assert_eq!(grid.sample(Position::new(-15.0, 25.0)), 3.0);
        grid.fill(2.0);
        assert!((grid.total() - 16.0).abs() < 1e-9);
        assert!(ScalarGrid::new(0, 2, 1.0, 0.0).is_err());
    }

    #[test]
    fn covering_rounds_up() {
        let grid = ScalarGrid::covering(100.0, 35.0, 16.0, 0.0).expect("grid");
        assert_eq!((grid.width(), grid.height()), (7, 3));
    }

    #[test]
    fn regrowth_is_logistic_and_bounded() {
        let mut field = ResourceField::new(32.0, 32.0, 16.0, 0.5, rates()).expect("field");
        let before = field.total_resource();
        for _ in 0..2000 {
            field.step(0.1);
        }
        assert!(field.total_resource() > before);
        assert!(field.resource().cells().iter().all(|&v| v <= 1.0));
        assert!(field.energy_input() > 0.0);
    }

    #[test]
    fn grazed_cells_recover() {
        let mut field = ResourceField::new(16.0, 16.0, 16.0, 1.0, rates()).expect("field");
        let spot = Position::new(1.0, 1.0);
        assert!((field.graze(spot, 5.0) - 1.0).abs() < 1e-6);
        assert_eq!(field.sample(spot), 0.0);
        field.step(1.0);
        assert!(field.sample(spot) > 0.0);
    }

    #[test]
    fn detritus_decays_into_resource_and_heat() {
        let mut field = ResourceField::new(
            16.0,
            16.0,
            16.0,
            0.0,
            FieldRates {
                regrowth: 0.0,
                ..rates()
            },
        )
        .expect("field");
        field.deposit_detritus(Position::new(3.0, 3.0), 1.0);
        field.step(1.0);
        assert!((field.total_detritus() - 0.5).abs() < 1e-6);
        assert!((field.total_resource() - 0.25).abs() < 1e-6);
        assert!((field.heat_loss() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn diffusion_spreads_mass_conservatively() {
        let mut field = ResourceField::new(
            48.0,
            48.0,
            16.0,
            0.0,
            FieldRates {
                regrowth: 0.0,
                diffusion: 0.2,
                decay_rate: 0.0,
                ..rates()
            },
        )
        .expect("field");
        let centre = Position::new(20.0, 20.0);
        let idx = field.resource().cell_index(centre);
        field.resource.cells_mut()[idx] = 0.9;
        field.step(1.0);
        assert!((field.total_resource() - 0.9).abs() < 1e-6);
        assert!(field.sample(centre) < 0.9);
        assert!(field.sample(Position::new(36.0, 20.0)) > 0.0);
    }
}
