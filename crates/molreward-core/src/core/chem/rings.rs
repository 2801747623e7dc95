use crate::core::models::topology::Bond;
use std::collections::{HashSet, VecDeque};

/// Smallest set of smallest rings (SSSR) perceived for a molecular graph.
///
/// Rings are stored both as atom cycles (in traversal order) and as bond sets,
/// together with per-atom and per-bond membership counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RingInfo {
    atom_rings: Vec<Vec<usize>>,
    bond_rings: Vec<Vec<usize>>,
    atom_membership: Vec<Vec<usize>>,
    bond_membership: Vec<Vec<usize>>,
}

impl RingInfo {
    /// Perceives the SSSR of a graph.
    ///
    /// For every bond the shortest cycle through it is collected; candidates are
    /// then taken smallest first, keeping those linearly independent (over GF(2)
    /// bond incidence) of the ones already kept, until the cycle rank
    /// `bonds - atoms + components` is reached.
    ///
    /// # Arguments
    ///
    /// * `atom_count` - Number of atoms in the graph.
    /// * `bonds` - The bond list.
    /// * `adjacency` - `adjacency[atom] = [(neighbor, bond_index), ...]`.
    pub fn perceive(atom_count: usize, bonds: &[Bond], adjacency: &[Vec<(usize, usize)>]) -> Self {
        let mut info = RingInfo {
            atom_rings: Vec::new(),
            bond_rings: Vec::new(),
            atom_membership: vec![Vec::new(); atom_count],
            bond_membership: vec![Vec::new(); bonds.len()],
        };

        let components = count_components(atom_count, adjacency);
        let cycle_rank = (bonds.len() + components).saturating_sub(atom_count);
        if cycle_rank == 0 {
            return info;
        }

        let mut candidates: Vec<(Vec<usize>, Vec<usize>)> = Vec::new();
        let mut seen: HashSet<Vec<usize>> = HashSet::new();
        for (bi, bond) in bonds.iter().enumerate() {
            if let Some((atoms, mut ring_bonds)) =
                shortest_cycle_through(bond.atom1, bond.atom2, bi, adjacency)
            {
                ring_bonds.sort_unstable();
                if seen.insert(ring_bonds.clone()) {
                    candidates.push((atoms, ring_bonds));
                }
            }
        }
        candidates.sort_by_key(|(atoms, _)| atoms.len());

        let mut basis: Vec<Vec<bool>> = Vec::new();
        for (atoms, ring_bonds) in candidates {
            if info.atom_rings.len() == cycle_rank {
                break;
            }
            let mut vector = vec![false; bonds.len()];
            for &b in &ring_bonds {
                vector[b] = true;
            }
            if reduce_against(&mut vector, &basis) {
                basis.push(vector);
                let ring_id = info.atom_rings.len();
                for &a in &atoms {
                    info.atom_membership[a].push(ring_id);
                }
                for &b in &ring_bonds {
                    info.bond_membership[b].push(ring_id);
                }
                info.atom_rings.push(atoms);
                info.bond_rings.push(ring_bonds);
            }
        }
        info
    }

    pub fn num_rings(&self) -> usize {
        self.atom_rings.len()
    }

    /// Atom cycles, each listed in ring traversal order.
    pub fn atom_rings(&self) -> &[Vec<usize>] {
        &self.atom_rings
    }

    /// Bond index sets of each ring, parallel to [`Self::atom_rings`].
    pub fn bond_rings(&self) -> &[Vec<usize>] {
        &self.bond_rings
    }

    pub fn num_atom_rings(&self, atom: usize) -> usize {
        self.atom_membership.get(atom).map_or(0, Vec::len)
    }

    pub fn num_bond_rings(&self, bond: usize) -> usize {
        self.bond_membership.get(bond).map_or(0, Vec::len)
    }

    pub fn is_atom_in_ring(&self, atom: usize) -> bool {
        self.num_atom_rings(atom) > 0
    }

    pub fn is_bond_in_ring(&self, bond: usize) -> bool {
        self.num_bond_rings(bond) > 0
    }

    /// Size of the smallest ring containing the atom.
    pub fn min_atom_ring_size(&self, atom: usize) -> Option<usize> {
        self.atom_membership
            .get(atom)?
            .iter()
            .map(|&r| self.atom_rings[r].len())
            .min()
    }

    pub fn is_atom_in_ring_of_size(&self, atom: usize, size: usize) -> bool {
        self.atom_membership
            .get(atom)
            .is_some_and(|rings| rings.iter().any(|&r| self.atom_rings[r].len() == size))
    }

    pub fn is_bond_in_ring_of_size(&self, bond: usize, size: usize) -> bool {
        self.bond_membership
            .get(bond)
            .is_some_and(|rings| rings.iter().any(|&r| self.bond_rings[r].len() == size))
    }
}

fn count_components(atom_count: usize, adjacency: &[Vec<(usize, usize)>]) -> usize {
    let mut visited = vec![false; atom_count];
    let mut components = 0;
    for start in 0..atom_count {
        if visited[start] {
            continue;
        }
        components += 1;
        visited[start] = true;
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            for &(next, _) in &adjacency[current] {
                if !visited[next] {
                    visited[next] = true;
                    stack.push(next);
                }
            }
        }
    }
    components
}

/// Breadth-first search from `from` to `to` that may not use `excluded` bond.
/// Returns the cycle's atoms (starting at `from`) and its bonds.
fn shortest_cycle_through(
    from: usize,
    to: usize,
    excluded: usize,
    adjacency: &[Vec<(usize, usize)>],
) -> Option<(Vec<usize>, Vec<usize>)> {
    let mut parent: Vec<Option<(usize, usize)>> = vec![None; adjacency.len()];
    let mut visited = vec![false; adjacency.len()];
    let mut queue = VecDeque::from([from]);
    visited[from] = true;

    while let Some(current) = queue.pop_front() {
        if current == to {
            break;
        }
        for &(next, bi) in &adjacency[current] {
            if bi == excluded || visited[next] {
                continue;
            }
            visited[next] = true;
            parent[next] = Some((current, bi));
            queue.push_back(next);
        }
    }
    if !visited[to] {
        return None;
    }

    let mut atoms = vec![to];
    let mut ring_bonds = vec![excluded];
    let mut cursor = to;
    while let Some((prev, bi)) = parent[cursor] {
        atoms.push(prev);
        ring_bonds.push(bi);
        cursor = prev;
    }
    atoms.reverse();
    Some((atoms, ring_bonds))
}

/// Gaussian elimination over GF(2). Returns `true` if `vector` is independent of `basis`.
///
/// `basis` rows must already be reduced against their predecessors, which holds
/// because callers push the reduced `vector` itself.
fn reduce_against(vector: &mut [bool], basis: &[Vec<bool>]) -> bool {
    for row in basis {
        if let Some(pivot) = row.iter().position(|&b| b) {
            if vector[pivot] {
                xor_into(vector, row);
            }
        }
    }
    vector.iter().any(|&b| b)
}

fn xor_into(target: &mut [bool], source: &[bool]) {
    for (t, &s) in target.iter_mut().zip(source) {
        *t ^= s;
    }
}

#[cfg(test)]
mod tests {
    use crate::core::io::smiles::parse_smiles;

    #[test]
    fn acyclic_molecule_has_no_rings() {
        let mol = parse_smiles("CCCCO").unwrap();
        assert_eq!(mol.ring_info().num_rings(), 0);
        assert!(!mol.ring_info().is_atom_in_ring(0));
    }

    #[test]
    fn benzene_has_a_single_six_ring() {
        let mol = parse_smiles("c1ccccc1").unwrap();
        let rings = mol.ring_info();
        assert_eq!(rings.num_rings(), 1);
        assert_eq!(rings.atom_rings()[0].len(), 6);
        for atom in 0..6 {
            assert_eq!(rings.min_atom_ring_size(atom), Some(6));
        }
    }

    #[test]
    fn naphthalene_fusion_atoms_belong_to_two_rings() {
        let mol = parse_smiles("c1ccc2ccccc2c1").unwrap();
        let rings = mol.ring_info();
        assert_eq!(rings.num_rings(), 2);
        let fused: Vec<_> = (0..mol.atom_count())
            .filter(|&a| rings.num_atom_rings(a) == 2)
            .collect();
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn spiro_and_bicyclic_systems_reach_cycle_rank() {
        let spiro = parse_smiles("C1CCC2(C1)CCCC2").unwrap();
        assert_eq!(spiro.ring_info().num_rings(), 2);

        let norbornane = parse_smiles("C1CC2CCC1C2").unwrap();
        let rings = norbornane.ring_info();
        assert_eq!(rings.num_rings(), 2);
        let mut sizes: Vec<_> = rings.atom_rings().iter().map(Vec::len).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![5, 5]);
    }

    #[test]
    fn ring_size_queries_distinguish_small_rings() {
        let mol = parse_smiles("C1CC1CC1CCCCC1").unwrap();
        let rings = mol.ring_info();
        assert!(rings.is_atom_in_ring_of_size(0, 3));
        assert!(!rings.is_atom_in_ring_of_size(0, 6));
        assert!(!rings.is_atom_in_ring(3));
        assert!(rings.is_atom_in_ring_of_size(5, 6));
    }
}
