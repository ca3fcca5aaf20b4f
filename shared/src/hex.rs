//! Hex grid geometry with axial coordinates

use serde::{Deserialize, Serialize};

/// Axial hex coordinates. The implicit third cube coordinate is `s = -q - r`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hex {
    pub q: i32,
    pub r: i32,
}

/// Direction vectors in axial coordinates (dq, dr), counter-clockwise from east.
pub const DIRECTIONS: [(i32, i32); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1)];

impl Hex {
    pub const ORIGIN: Hex = Hex::new(0, 0);

    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    pub fn s(&self) -> i32 {
        -self.q - self.r
    }

    /// Grid step distance between two hexes
    pub fn distance_to(&self, other: Hex) -> u32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.s() - other.s()).abs();
        ((dq + dr + ds) / 2) as u32
    }

    pub fn distance_to_center(&self) -> u32 {
        self.distance_to(Hex::ORIGIN)
    }

    /// True if this hex lies on a hexagonal map of the given radius
    pub fn is_within(&self, radius: u32) -> bool {
        self.distance_to_center() <= radius
    }

    /// Neighbor in direction (0-5)
    pub fn neighbor(&self, direction: usize) -> Hex {
        let (dq, dr) = DIRECTIONS[direction % 6];
        Hex::new(self.q + dq, self.r + dr)
    }

    /// Every hex at distance <= `radius`, the center included.
    ///
    /// Yields `1 + 3r(r+1)` hexes in ascending (q, r) order.
    pub fn area(&self, radius: u32) -> Vec<Hex> {
        let r = radius as i32;
        let mut out = Vec::with_capacity(1 + 3 * (radius as usize) * (radius as usize + 1));
        for dq in -r..=r {
            for dr in (-r).max(-dq - r)..=r.min(-dq + r) {
                out.push(Hex::new(self.q + dq, self.r + dr));
            }
        }
        out
    }

    /// Hexes at exactly `radius` steps, walked around the circle.
    pub fn ring(&self, radius: u32) -> Vec<Hex> {
        if radius == 0 {
            return vec![*self];
        }
        let r = radius as i32;
        let (sq, sr) = DIRECTIONS[4];
        let mut hex = Hex::new(self.q + sq * r, self.r + sr * r);
        let mut out = Vec::with_capacity(6 * radius as usize);
        for direction in 0..6 {
            for _ in 0..radius {
                out.push(hex);
                hex = hex.neighbor(direction);
            }
        }
        out
    }

    /// First hex on the line toward `target`; `self` when already there.
    ///
    /// The result is always a neighbor exactly one step closer to `target`.
    pub fn step_toward(&self, target: Hex) -> Hex {
        let n = self.distance_to(target);
        if n == 0 {
            return *self;
        }
        self.lerp_round(target, 1.0 / f64::from(n))
    }

    fn lerp_round(&self, other: Hex, t: f64) -> Hex {
        // Nudge off exact cell edges so ties round consistently.
        let q = f64::from(self.q) + f64::from(other.q - self.q) * t + 1e-6;
        let r = f64::from(self.r) + f64::from(other.r - self.r) * t + 1e-6;
        round_axial(q, r)
    }
}

fn round_axial(q: f64, r: f64) -> Hex {
    let s = -q - r;
    let (mut rq, mut rr, rs) = (q.round(), r.round(), s.round());
    let dq = (rq - q).abs();
    let dr = (rr - r).abs();
    let ds = (rs - s).abs();
    if dq > dr && dq > ds {
        rq = -rr - rs;
    } else if dr > ds {
        rr = -rq - rs;
    }
    Hex::new(rq as i32, rr as i32)
}

/// The outermost ring of a hexagonal map, where tanks spawn
pub fn edge_hexes(radius: u32) -> Vec<Hex> {
    Hex::ORIGIN.ring(radius)
}
