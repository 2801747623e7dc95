use nalgebra::{Point3, Rotation3, Unit, Vector3};

const TETRAHEDRAL_ANGLE: f64 = 109.471_220_634_490_7;

/// Returns a unit vector perpendicular to `v`.
pub fn perpendicular(v: &Vector3<f64>) -> Vector3<f64> {
    let helper = if v.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    (helper - v * v.dot(&helper)).normalize()
}

/// Places `count` hydrogens around `base_pos` given the positions of its
/// other neighbors.
///
/// The geometry follows the number of occupied sites: linear, trigonal or
/// tetrahedral arrangements around one neighbor, the two open tetrahedral
/// sites beside two neighbors, and the site opposite the neighbor sum for
/// more crowded centers. Exactly `count` positions are always returned.
///
/// # Arguments
///
/// * `base_pos` - Position of the parent atom.
/// * `neighbors` - Positions of the parent's non-hydrogen neighbors.
/// * `count` - Number of hydrogens to place.
/// * `bond_length` - Parent-hydrogen distance.
pub fn hydrogen_positions(
    base_pos: &Point3<f64>,
    neighbors: &[Point3<f64>],
    count: usize,
    bond_length: f64,
) -> Vec<Point3<f64>> {
    if count == 0 {
        return Vec::new();
    }

    let neighbor_vecs: Vec<Vector3<f64>> = neighbors
        .iter()
        .map(|p| p - base_pos)
        .filter(|v| v.norm() > 1e-6)
        .map(|v| v.normalize())
        .collect();

    let directions = match neighbor_vecs.len() {
        0 => tetrahedral_directions(),
        1 => single_neighbor_directions(&neighbor_vecs[0], count),
        2 => two_neighbor_directions(&neighbor_vecs[0], &neighbor_vecs[1], count),
        _ => crowded_directions(&neighbor_vecs),
    };

    (0..count)
        .map(|i| {
            let dir = directions[i % directions.len()];
            let layer = (i / directions.len()) as f64;
            // Hydrogens beyond the available sites are tilted off the reused site.
            let dir = if layer > 0.0 {
                (dir + perpendicular(&dir) * 0.5 * layer).normalize()
            } else {
                dir
            };
            base_pos + dir * bond_length
        })
        .collect()
}

fn tetrahedral_directions() -> Vec<Vector3<f64>> {
    [
        Vector3::new(1.0, 1.0, 1.0),
        Vector3::new(1.0, -1.0, -1.0),
        Vector3::new(-1.0, 1.0, -1.0),
        Vector3::new(-1.0, -1.0, 1.0),
    ]
    .iter()
    .map(|v| v.normalize())
    .collect()
}

fn single_neighbor_directions(n1: &Vector3<f64>, count: usize) -> Vec<Vector3<f64>> {
    let sites = count.min(3);
    let angle = match sites {
        1 => 180.0f64,
        2 => 120.0,
        _ => TETRAHEDRAL_ANGLE,
    }
    .to_radians();

    let axis = Unit::new_normalize(*n1);
    let start = n1 * angle.cos() + perpendicular(n1) * angle.sin();
    (0..sites)
        .map(|k| {
            let spin = 360.0 / sites as f64 * k as f64;
            Rotation3::from_axis_angle(&axis, spin.to_radians()) * start
        })
        .collect()
}

fn two_neighbor_directions(n1: &Vector3<f64>, n2: &Vector3<f64>, count: usize) -> Vec<Vector3<f64>> {
    let sum = n1 + n2;
    let bisector = if sum.norm() > 1e-6 {
        -sum.normalize()
    } else {
        perpendicular(n1)
    };
    if count == 1 {
        return vec![bisector];
    }

    let cross = n1.cross(n2);
    let normal = if cross.norm() > 1e-6 {
        cross.normalize()
    } else {
        bisector.cross(&perpendicular(&bisector)).normalize()
    };
    let half = (TETRAHEDRAL_ANGLE / 2.0).to_radians();
    vec![
        bisector * half.cos() + normal * half.sin(),
        bisector * half.cos() - normal * half.sin(),
    ]
}

fn crowded_directions(neighbor_vecs: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
    let sum: Vector3<f64> = neighbor_vecs.iter().sum();
    if sum.norm() > 1e-6 {
        return vec![-sum.normalize()];
    }
    let normal = neighbor_vecs[0].cross(&neighbor_vecs[1]);
    if normal.norm() > 1e-6 {
        vec![normal.normalize(), -normal.normalize()]
    } else {
        vec![perpendicular(&neighbor_vecs[0])]
    }
}

/// Geometric center of a set of points, or `None` if the set is empty.
pub fn centroid(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum: Vector3<f64> = points.iter().map(|p| p.coords).sum();
    Some(Point3::from(sum / points.len() as f64))
}

/// Angle at `center` formed by `a` and `b`, in radians.
pub fn bond_angle(a: &Point3<f64>, center: &Point3<f64>, b: &Point3<f64>) -> f64 {
    let u = a - center;
    let v = b - center;
    let cos = u.dot(&v) / (u.norm() * v.norm());
    cos.clamp(-1.0, 1.0).acos()
}

pub fn calculate_rmsd(coords1: &[Point3<f64>], coords2: &[Point3<f64>]) -> Option<f64> {
    if coords1.len() != coords2.len() || coords1.is_empty() {
        return None;
    }
    let n = coords1.len() as f64;
    let squared_dist_sum: f64 = coords1
        .iter()
        .zip(coords2.iter())
        .map(|(p1, p2)| (p1 - p2).norm_squared())
        .sum();
    Some((squared_dist_sum / n).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_bond_lengths(base: &Point3<f64>, points: &[Point3<f64>], length: f64) {
        for p in points {
            assert!(((p - base).norm() - length).abs() < 1e-9);
        }
    }

    #[test]
    fn hydrogen_positions_returns_requested_count_for_every_neighbor_count() {
        let base = Point3::origin();
        let neighbor_sets = [
            vec![],
            vec![Point3::new(1.5, 0.0, 0.0)],
            vec![Point3::new(1.5, 0.0, 0.0), Point3::new(-0.5, 1.4, 0.0)],
            vec![
                Point3::new(1.5, 0.0, 0.0),
                Point3::new(-0.5, 1.4, 0.0),
                Point3::new(-0.5, -0.7, 1.2),
            ],
        ];
        for neighbors in &neighbor_sets {
            for count in 0..=4 {
                let hs = hydrogen_positions(&base, neighbors, count, 1.09);
                assert_eq!(hs.len(), count);
                assert_bond_lengths(&base, &hs, 1.09);
            }
        }
    }

    #[test]
    fn methyl_hydrogens_are_tetrahedral() {
        let base = Point3::origin();
        let neighbor = Point3::new(1.54, 0.0, 0.0);
        let hs = hydrogen_positions(&base, &[neighbor], 3, 1.09);
        for h in &hs {
            let angle = bond_angle(&neighbor, &base, h).to_degrees();
            assert!((angle - TETRAHEDRAL_ANGLE).abs() < 1e-6);
        }
        for i in 0..3 {
            for j in (i + 1)..3 {
                assert!((hs[i] - hs[j]).norm() > 1.5);
            }
        }
    }

    #[test]
    fn single_hydrogen_on_three_neighbors_points_away_from_them() {
        let base = Point3::origin();
        let neighbors = [
            Point3::new(1.0, 0.0, -0.3),
            Point3::new(-0.5, 0.87, -0.3),
            Point3::new(-0.5, -0.87, -0.3),
        ];
        let hs = hydrogen_positions(&base, &neighbors, 1, 1.0);
        assert!(hs[0].z > 0.99);
    }

    #[test]
    fn planar_symmetric_neighbors_do_not_produce_nan() {
        let base = Point3::origin();
        let neighbors = [Point3::new(1.0, 0.0, 0.0), Point3::new(-1.0, 0.0, 0.0)];
        let hs = hydrogen_positions(&base, &neighbors, 2, 1.0);
        assert!(hs.iter().all(|p| p.coords.iter().all(|c| c.is_finite())));
    }

    #[test]
    fn centroid_of_empty_set_is_none() {
        assert!(centroid(&[]).is_none());
        let c = centroid(&[Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 4.0, 6.0)]).unwrap();
        assert_eq!(c, Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn calculate_rmsd_rejects_mismatched_lengths() {
        let a = [Point3::new(0.0, 0.0, 0.0)];
        let b = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        assert!(calculate_rmsd(&a, &b).is_none());
        assert!(calculate_rmsd(&[], &[]).is_none());
        let c = [Point3::new(3.0, 4.0, 0.0)];
        assert!((calculate_rmsd(&a, &c).unwrap() - 5.0).abs() < 1e-12);
    }
}
