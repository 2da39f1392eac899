// alife-master: Spatial bucket grid

use std::collections::HashMap;
use std::fmt;

use alife_proto::{BucketRef, Cell, Vector};
use serde::{Deserialize, Serialize};

/// Integer lattice coordinate identifying one cubic bucket.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BucketKey {
    pub bx: i64,
    pub by: i64,
    pub bz: i64,
}

impl BucketKey {
    pub fn new(bx: i64, by: i64, bz: i64) -> Self {
        Self { bx, by, bz }
    }

    /// The 26 keys surrounding this one, diagonals included, in
    /// lexicographic order.
    pub fn surrounding(&self, width: u32) -> Vec<BucketKey> {
        let w = i64::from(width);
        let mut keys = Vec::with_capacity(26);
        for bx in [self.bx - w, self.bx, self.bx + w] {
            for by in [self.by - w, self.by, self.by + w] {
                for bz in [self.bz - w, self.bz, self.bz + w] {
                    if bx == self.bx && by == self.by && bz == self.bz {
                        continue;
                    }
                    keys.push(BucketKey::new(bx, by, bz));
                }
            }
        }
        keys
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.bx, self.by, self.bz)
    }
}

impl From<BucketKey> for BucketRef {
    fn from(key: BucketKey) -> Self {
        BucketRef {
            bx: key.bx,
            by: key.by,
            bz: key.bz,
        }
    }
}

impl From<BucketRef> for BucketKey {
    fn from(key: BucketRef) -> Self {
        BucketKey::new(key.bx, key.by, key.bz)
    }
}

/// Key of the bucket containing a position under the given lattice width.
pub fn bucket_key_for(pos: &Vector, width: u32) -> BucketKey {
    BucketKey::new(
        axis_position_for(pos.x, width),
        axis_position_for(pos.y, width),
        axis_position_for(pos.z, width),
    )
}

// Positive coordinates round up to the lattice, negative ones round down, so
// the two half-spaces never share a bucket across the origin boundary.
fn axis_position_for(coord: f32, width: u32) -> i64 {
    let scaled = f64::from(coord / width as f32);
    if coord >= 0.0 {
        (scaled.ceil() * f64::from(width)) as i64
    } else {
        (scaled.floor() * f64::from(width)) as i64
    }
}

/// Cells grouped by bucket key. Order within a bucket follows insertion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Buckets(HashMap<BucketKey, Vec<Cell>>);

impl Buckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group the cells by their bucket key.
    pub fn create(cells: Vec<Cell>, width: u32) -> Self {
        let mut buckets = Self::new();
        for cell in cells {
            buckets.insert(cell, width);
        }
        buckets
    }

    pub fn insert(&mut self, cell: Cell, width: u32) {
        let pos = cell.pos.clone().unwrap_or_default();
        let key = bucket_key_for(&pos, width);
        self.0.entry(key).or_default().push(cell);
    }

    /// Fold another bucket map into this one, appending per key.
    pub fn merge(&mut self, other: Buckets) {
        for (key, cells) in other.0 {
            self.0.entry(key).or_default().extend(cells);
        }
    }

    /// All cells across every bucket.
    pub fn all_cells(&self) -> Vec<Cell> {
        self.0.values().flat_map(|cells| cells.iter().cloned()).collect()
    }

    /// Union of the cells in the 26 buckets surrounding the key.
    pub fn cells_surrounding(&self, key: &BucketKey, width: u32) -> Vec<Cell> {
        let mut cells = Vec::new();
        for neighbour in key.surrounding(width) {
            if let Some(bucket) = self.0.get(&neighbour) {
                cells.extend(bucket.iter().cloned());
            }
        }
        cells
    }

    pub fn get(&self, key: &BucketKey) -> Option<&Vec<Cell>> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BucketKey, &Vec<Cell>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_key_for_positive_values() {
        let pos = Vector::new(1.4, 0.5, 2.6);
        assert_eq!(bucket_key_for(&pos, 2), BucketKey::new(2, 2, 4));
    }

    #[test]
    fn bucket_key_for_mixed_signs() {
        let pos = Vector::new(-1.4, -0.5, 2.6);
        assert_eq!(bucket_key_for(&pos, 2), BucketKey::new(-2, -2, 4));
    }

    #[test]
    fn bucket_key_keeps_half_spaces_apart_at_the_origin() {
        assert_eq!(bucket_key_for(&Vector::new(0.1, 0.0, 0.0), 2).bx, 2);
        assert_eq!(bucket_key_for(&Vector::new(-0.1, 0.0, 0.0), 2).bx, -2);
    }

    #[test]
    fn surrounding_yields_26_lexicographic_keys() {
        let keys = BucketKey::new(1, 1, 1).surrounding(1);
        assert_eq!(keys.len(), 26);
        assert!(!keys.contains(&BucketKey::new(1, 1, 1)));

        let expected: Vec<BucketKey> = [
            (0, 0, 0), (0, 0, 1), (0, 0, 2),
            (0, 1, 0), (0, 1, 1), (0, 1, 2),
            (0, 2, 0), (0, 2, 1), (0, 2, 2),
            (1, 0, 0), (1, 0, 1), (1, 0, 2),
            (1, 1, 0), (1, 1, 2),
            (1, 2, 0), (1, 2, 1), (1, 2, 2),
            (2, 0, 0), (2, 0, 1), (2, 0, 2),
            (2, 1, 0), (2, 1, 1), (2, 1, 2),
            (2, 2, 0), (2, 2, 1), (2, 2, 2),
        ]
        .into_iter()
        .map(|(bx, by, bz)| BucketKey::new(bx, by, bz))
        .collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn surrounding_uses_the_lattice_stride() {
        let keys = BucketKey::new(0, 0, 0).surrounding(500);
        assert_eq!(keys.len(), 26);
        assert!(keys.contains(&BucketKey::new(-500, -500, -500)));
        assert!(keys.contains(&BucketKey::new(500, 0, 0)));
    }

    #[test]
    fn create_groups_cells_by_key() {
        let cells = vec![
            Cell::at("1", 1.1, 1.2, 1.3),
            Cell::at("2", 1.2, 1.3, 1.4),
            Cell::at("3", 1.7, 2.1, 8.4),
            Cell::at("4", -0.4, -9.8, 5.4),
        ];

        let buckets = Buckets::create(cells, 1);
        assert_eq!(buckets.len(), 3);

        let ids = |key: BucketKey| -> Vec<String> {
            buckets
                .get(&key)
                .map(|cells| cells.iter().map(|c| c.id.clone()).collect())
                .unwrap_or_default()
        };
        assert_eq!(ids(BucketKey::new(2, 2, 2)), vec!["1", "2"]);
        assert_eq!(ids(BucketKey::new(2, 3, 9)), vec!["3"]);
        assert_eq!(ids(BucketKey::new(-1, -10, 6)), vec!["4"]);
    }

    #[test]
    fn create_groups_cells_by_key_with_wider_lattice() {
        let cells = vec![
            Cell::at("1", 1.1, 1.2, 1.3),
            Cell::at("2", 1.2, 1.3, 1.4),
            Cell::at("3", 1.7, 2.1, 8.4),
            Cell::at("4", -0.4, -9.8, 5.4),
        ];

        let buckets = Buckets::create(cells, 4);
        assert!(buckets.get(&BucketKey::new(4, 4, 4)).is_some_and(|c| c.len() == 2));
        assert!(buckets.get(&BucketKey::new(4, 4, 12)).is_some_and(|c| c.len() == 1));
        assert!(buckets.get(&BucketKey::new(-4, -12, 8)).is_some_and(|c| c.len() == 1));
    }

    #[test]
    fn merge_appends_per_key() {
        let mut left = Buckets::create(vec![Cell::at("1", 0.5, 0.5, 0.5)], 1);
        let right = Buckets::create(
            vec![Cell::at("2", 0.6, 0.6, 0.6), Cell::at("3", 5.5, 0.5, 0.5)],
            1,
        );

        left.merge(right);
        assert_eq!(left.len(), 2);
        assert!(left.get(&BucketKey::new(1, 1, 1)).is_some_and(|c| c.len() == 2));
        assert_eq!(left.all_cells().len(), 3);
    }

    fn random_cells(quantity: usize, min: f32, max: f32) -> Vec<Cell> {
        use rand::Rng;

        let mut rng = rand::thread_rng();
        (0..quantity)
            .map(|i| {
                Cell::at(
                    i.to_string(),
                    rng.gen_range(min..max),
                    rng.gen_range(min..max),
                    rng.gen_range(min..max),
                )
            })
            .collect()
    }

    #[test]
    fn every_cell_lands_in_the_bucket_its_position_maps_to() {
        let buckets = Buckets::create(random_cells(512, -1000.0, 1000.0), 10);

        let mut total = 0;
        for (key, cells) in buckets.iter() {
            total += cells.len();
            for cell in cells {
                let pos = cell.pos.clone().unwrap_or_default();
                assert_eq!(*key, bucket_key_for(&pos, 10));
            }
        }
        assert_eq!(total, 512);
    }
}
