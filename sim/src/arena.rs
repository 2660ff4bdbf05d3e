use rand::Rng;
use shared::{Lineage, TraitLayout};
use std::f64::consts::{PI, TAU};
use std::ops::Range;

/// Side length of one layout cell in arena units
pub const CELL_SIZE: f64 = 5.0;

/// A point in arena coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Unit vector from `self` towards `other`.
    /// Coincident points fall back to a distance of 1 rather than dividing by zero.
    pub fn unit_towards(&self, other: Position) -> (f64, f64) {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let mut dist = dx.hypot(dy);
        if dist == 0.0 {
            dist = 1.0;
        }
        (dx / dist, dy / dist)
    }
}

/// Half extents of an entity's bounding rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    pub half_width: f64,
    pub half_height: f64,
}

impl Footprint {
    pub fn from_layout(layout: &TraitLayout) -> Self {
        let (min_x, max_x, min_y, max_y) = layout.cell_bounds();
        let cols = f64::from(i16::from(max_x) - i16::from(min_x) + 1);
        let rows = f64::from(i16::from(max_y) - i16::from(min_y) + 1);
        Self {
            half_width: cols * CELL_SIZE / 2.0,
            half_height: rows * CELL_SIZE / 2.0,
        }
    }

    /// Plants are a single cell
    pub fn plant() -> Self {
        Self {
            half_width: CELL_SIZE / 2.0,
            half_height: CELL_SIZE / 2.0,
        }
    }

    /// Axis-aligned overlap of two footprints centered at the given points
    pub fn overlaps(&self, at: Position, other: &Footprint, other_at: Position) -> bool {
        (at.x - other_at.x).abs() < self.half_width + other.half_width
            && (at.y - other_at.y).abs() < self.half_height + other.half_height
    }
}

/// One of the four regions separated by the dividers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quarter {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Quarter {
    pub fn home_of(lineage: Lineage) -> Self {
        match lineage {
            Lineage::A => Quarter::TopLeft,
            Lineage::B => Quarter::TopRight,
            Lineage::C => Quarter::BottomLeft,
            Lineage::D => Quarter::BottomRight,
        }
    }

    pub fn is_left(self) -> bool {
        matches!(self, Quarter::TopLeft | Quarter::BottomLeft)
    }

    pub fn is_top(self) -> bool {
        matches!(self, Quarter::TopLeft | Quarter::TopRight)
    }
}

/// The rectangle all entities live in, split into quarters by a vertical and
/// a horizontal divider. Each divider has a centered gap that lets entities
/// pass between neighbouring quarters.
#[derive(Debug, Clone)]
pub struct Arena {
    pub width: f64,
    pub height: f64,
    vertical_gap: Range<f64>,
    horizontal_gap: Range<f64>,
}

impl Arena {
    pub fn new(width: f64, height: f64, gap_ratio: f64) -> Self {
        let gap_ratio = gap_ratio.clamp(0.0, 1.0);

        let v_gap = height * gap_ratio;
        let v_start = (height - v_gap) / 2.0;
        let h_gap = width * gap_ratio;
        let h_start = (width - h_gap) / 2.0;

        Self {
            width,
            height,
            vertical_gap: v_start..v_start + v_gap,
            horizontal_gap: h_start..h_start + h_gap,
        }
    }

    pub fn mid_x(&self) -> f64 {
        self.width / 2.0
    }

    pub fn mid_y(&self) -> f64 {
        self.height / 2.0
    }

    /// Whether `y` falls in the opening of the vertical divider (inclusive)
    pub fn in_vertical_gap(&self, y: f64) -> bool {
        y >= self.vertical_gap.start && y <= self.vertical_gap.end
    }

    /// Whether `x` falls in the opening of the horizontal divider (inclusive)
    pub fn in_horizontal_gap(&self, x: f64) -> bool {
        x >= self.horizontal_gap.start && x <= self.horizontal_gap.end
    }

    pub fn quarter_of(&self, position: Position) -> Quarter {
        let left = position.x < self.mid_x();
        let top = position.y < self.mid_y();
        match (left, top) {
            (true, true) => Quarter::TopLeft,
            (false, true) => Quarter::TopRight,
            (true, false) => Quarter::BottomLeft,
            (false, false) => Quarter::BottomRight,
        }
    }

    /// `(x range, y range)` covered by a quarter
    pub fn quarter_bounds(&self, quarter: Quarter) -> (Range<f64>, Range<f64>) {
        let xs = if quarter.is_left() {
            0.0..self.mid_x()
        } else {
            self.mid_x()..self.width
        };
        let ys = if quarter.is_top() {
            0.0..self.mid_y()
        } else {
            self.mid_y()..self.height
        };
        (xs, ys)
    }

    pub fn random_position<R: Rng>(&self, rng: &mut R) -> Position {
        Position::new(
            rng.gen_range(0.0..=self.width),
            rng.gen_range(0.0..=self.height),
        )
    }

    pub fn random_position_in<R: Rng>(&self, quarter: Quarter, rng: &mut R) -> Position {
        let (xs, ys) = self.quarter_bounds(quarter);
        Position::new(rng.gen_range(xs), rng.gen_range(ys))
    }

    /// Snap an entity back inside the arena and its quarter.
    ///
    /// Outer edges are handled before the dividers. The heading turns around
    /// at most once no matter how many edges were hit. Returns whether
    /// anything was hit.
    pub fn enforce_boundaries(
        &self,
        position: &mut Position,
        heading: &mut f64,
        footprint: Footprint,
    ) -> bool {
        let quarter = self.quarter_of(*position);
        let hw = footprint.half_width;
        let hh = footprint.half_height;
        let mut hit = false;

        if position.y - hh < 0.0 {
            position.y = hh;
            hit = true;
        }
        if position.x - hw < 0.0 {
            position.x = hw;
            hit = true;
        } else if position.x + hw > self.width {
            position.x = self.width - hw;
            hit = true;
        }
        if position.y + hh > self.height {
            position.y = self.height - hh;
            hit = true;
        }

        let mid_x = self.mid_x();
        if quarter.is_left() {
            if position.x + hw > mid_x && !self.in_vertical_gap(position.y) {
                position.x = mid_x - hw;
                hit = true;
            }
        } else if position.x - hw < mid_x && !self.in_vertical_gap(position.y) {
            position.x = mid_x + hw;
            hit = true;
        }

        let mid_y = self.mid_y();
        if quarter.is_top() {
            if position.y + hh > mid_y && !self.in_horizontal_gap(position.x) {
                position.y = mid_y - hh;
                hit = true;
            }
        } else if position.y - hh < mid_y && !self.in_horizontal_gap(position.x) {
            position.y = mid_y + hh;
            hit = true;
        }

        if hit {
            *heading = (*heading + PI).rem_euclid(TAU);
        }
        hit
    }
}
