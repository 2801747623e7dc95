use crate::core::models::atom::Atom;
use crate::core::models::element::Element;
use crate::core::models::molecule::{Molecule, MoleculeBuilder};
use crate::core::models::topology::BondOrder;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid SMILES at position {position}: {kind}")]
pub struct SmilesError {
    pub position: usize,
    pub kind: SmilesErrorKind,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SmilesErrorKind {
    #[error("input is empty")]
    Empty,
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("unknown element '{0}'")]
    UnknownElement(String),
    #[error("bracket atom is not closed")]
    UnclosedBracket,
    #[error("unbalanced parenthesis")]
    UnbalancedParenthesis,
    #[error("ring bond {0} is never closed")]
    UnclosedRing(u32),
    #[error("ring bond {0} closes on its own atom or duplicates a bond")]
    InvalidRingClosure(u32),
    #[error("bond or branch without a preceding atom")]
    MissingAtom,
    #[error("conflicting bond orders for ring bond {0}")]
    ConflictingRingBond(u32),
    #[error("{field} {value} is out of range")]
    NumberOutOfRange { field: &'static str, value: u32 },
}

/// Bond symbol as written; `Implicit` resolves to aromatic between two aromatic
/// atoms and to single otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BondSymbol {
    Implicit,
    Explicit(BondOrder),
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    atoms: Vec<Atom>,
    bonds: Vec<(usize, usize, BondSymbol, usize)>,
    prev: Option<usize>,
    branches: Vec<Option<usize>>,
    pending_bond: Option<(BondSymbol, usize)>,
    open_rings: HashMap<u32, (usize, BondSymbol)>,
}

/// Parses a SMILES string into a [`Molecule`].
///
/// Supports the organic subset, bracket atoms (isotope, chirality marks, hydrogen
/// count, charge and atom class), branches, ring closures including `%nn`, the
/// bond symbols `- = # : / \` and disconnected components separated by `.`.
/// Stereochemistry is accepted but not retained.
///
/// # Errors
///
/// Returns [`SmilesError`] with the byte position of the first problem.
pub fn parse_smiles(smiles: &str) -> Result<Molecule, SmilesError> {
    let trimmed = smiles.trim();
    if trimmed.is_empty() {
        return Err(SmilesError {
            position: 0,
            kind: SmilesErrorKind::Empty,
        });
    }
    let mut parser = Parser {
        input: trimmed.as_bytes(),
        pos: 0,
        atoms: Vec::new(),
        bonds: Vec::new(),
        prev: None,
        branches: Vec::new(),
        pending_bond: None,
        open_rings: HashMap::new(),
    };
    parser.parse()?;

    let Parser {
        atoms, bonds, ..
    } = parser;
    let mut builder = MoleculeBuilder::new().name(trimmed);
    let aromatic: Vec<bool> = atoms.iter().map(|a| a.is_aromatic).collect();
    for atom in atoms {
        builder.add_atom(atom);
    }
    for (a, b, symbol, position) in bonds {
        let order = match symbol {
            BondSymbol::Explicit(order) => order,
            BondSymbol::Implicit if aromatic[a] && aromatic[b] => BondOrder::Aromatic,
            BondSymbol::Implicit => BondOrder::Single,
        };
        builder.add_bond(a, b, order).map_err(|_| SmilesError {
            position,
            kind: SmilesErrorKind::MissingAtom,
        })?;
    }
    Ok(builder.build())
}

impl Parser<'_> {
    fn error(&self, kind: SmilesErrorKind) -> SmilesError {
        SmilesError {
            position: self.pos,
            kind,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn parse(&mut self) -> Result<(), SmilesError> {
        while let Some(c) = self.peek() {
            match c {
                b'(' => {
                    if self.prev.is_none() {
                        return Err(self.error(SmilesErrorKind::MissingAtom));
                    }
                    self.branches.push(self.prev);
                    self.pos += 1;
                }
                b')' => {
                    let Some(saved) = self.branches.pop() else {
                        return Err(self.error(SmilesErrorKind::UnbalancedParenthesis));
                    };
                    if self.pending_bond.is_some() {
                        return Err(self.error(SmilesErrorKind::MissingAtom));
                    }
                    self.prev = saved;
                    self.pos += 1;
                }
                b'.' => {
                    if self.pending_bond.is_some() {
                        return Err(self.error(SmilesErrorKind::MissingAtom));
                    }
                    self.prev = None;
                    self.pos += 1;
                }
                b'-' | b'=' | b'#' | b':' | b'/' | b'\\' => {
                    if self.prev.is_none() || self.pending_bond.is_some() {
                        return Err(self.error(SmilesErrorKind::MissingAtom));
                    }
                    let order = match c {
                        b'=' => BondOrder::Double,
                        b'#' => BondOrder::Triple,
                        b':' => BondOrder::Aromatic,
                        _ => BondOrder::Single,
                    };
                    self.pending_bond = Some((BondSymbol::Explicit(order), self.pos));
                    self.pos += 1;
                }
                b'0'..=b'9' | b'%' => self.ring_closure()?,
                b'[' => {
                    let atom = self.bracket_atom()?;
                    self.push_atom(atom);
                }
                _ => {
                    let atom = self.organic_atom()?;
                    self.push_atom(atom);
                }
            }
        }

        if !self.branches.is_empty() {
            return Err(self.error(SmilesErrorKind::UnbalancedParenthesis));
        }
        if self.pending_bond.is_some() {
            return Err(self.error(SmilesErrorKind::MissingAtom));
        }
        if let Some(&ring) = self.open_rings.keys().min() {
            return Err(self.error(SmilesErrorKind::UnclosedRing(ring)));
        }
        Ok(())
    }

    fn push_atom(&mut self, atom: Atom) {
        let idx = self.atoms.len();
        self.atoms.push(atom);
        if let Some(prev) = self.prev {
            let (symbol, position) = self
                .pending_bond
                .take()
                .unwrap_or((BondSymbol::Implicit, self.pos));
            self.bonds.push((prev, idx, symbol, position));
        }
        self.prev = Some(idx);
    }

    fn ring_closure(&mut self) -> Result<(), SmilesError> {
        let start = self.pos;
        let Some(current) = self.prev else {
            return Err(self.error(SmilesErrorKind::MissingAtom));
        };
        let number = if self.peek() == Some(b'%') {
            let digits = self
                .input
                .get(self.pos + 1..self.pos + 3)
                .filter(|d| d.iter().all(u8::is_ascii_digit))
                .ok_or_else(|| self.error(SmilesErrorKind::UnexpectedCharacter('%')))?;
            let n = ((digits[0] - b'0') * 10 + (digits[1] - b'0')) as u32;
            self.pos += 3;
            n
        } else {
            let n = (self.input[self.pos] - b'0') as u32;
            self.pos += 1;
            n
        };
        let symbol = self
            .pending_bond
            .take()
            .map(|(s, _)| s)
            .unwrap_or(BondSymbol::Implicit);

        match self.open_rings.remove(&number) {
            None => {
                self.open_rings.insert(number, (current, symbol));
            }
            Some((opener, opener_symbol)) => {
                let duplicate = self
                    .bonds
                    .iter()
                    .any(|&(a, b, _, _)| (a == opener && b == current) || (a == current && b == opener));
                if opener == current || duplicate {
                    return Err(SmilesError {
                        position: start,
                        kind: SmilesErrorKind::InvalidRingClosure(number),
                    });
                }
                let resolved = match (opener_symbol, symbol) {
                    (BondSymbol::Implicit, s) | (s, BondSymbol::Implicit) => s,
                    (a, b) if a == b => a,
                    (BondSymbol::Explicit(a), BondSymbol::Explicit(b))
                        if a == BondOrder::Single || b == BondOrder::Single =>
                    {
                        // `/` and `\` both read as single; keep the stronger order.
                        if a == BondOrder::Single { symbol } else { opener_symbol }
                    }
                    _ => {
                        return Err(SmilesError {
                            position: start,
                            kind: SmilesErrorKind::ConflictingRingBond(number),
                        });
                    }
                };
                self.bonds.push((opener, current, resolved, start));
            }
        }
        Ok(())
    }

    fn organic_atom(&mut self) -> Result<Atom, SmilesError> {
        let c = self.input[self.pos];
        let next = self.input.get(self.pos + 1).copied();
        let (atomic_number, aromatic, width) = match (c, next) {
            (b'C', Some(b'l')) => (17, false, 2),
            (b'B', Some(b'r')) => (35, false, 2),
            (b'B', _) => (5, false, 1),
            (b'C', _) => (6, false, 1),
            (b'N', _) => (7, false, 1),
            (b'O', _) => (8, false, 1),
            (b'P', _) => (15, false, 1),
            (b'S', _) => (16, false, 1),
            (b'F', _) => (9, false, 1),
            (b'I', _) => (53, false, 1),
            (b'*', _) => (0, false, 1),
            (b'b', _) => (5, true, 1),
            (b'c', _) => (6, true, 1),
            (b'n', _) => (7, true, 1),
            (b'o', _) => (8, true, 1),
            (b'p', _) => (15, true, 1),
            (b's', _) => (16, true, 1),
            _ => return Err(self.error(SmilesErrorKind::UnexpectedCharacter(c as char))),
        };
        self.pos += width;
        let mut atom = Atom::new(atomic_number);
        atom.is_aromatic = aromatic;
        Ok(atom)
    }

    fn bracket_atom(&mut self) -> Result<Atom, SmilesError> {
        let open = self.pos;
        self.pos += 1;

        let isotope = match self.read_number() {
            Some(n) => Some(self.narrow::<u16>(n, "isotope")?),
            None => None,
        };
        let (atomic_number, aromatic) = self.bracket_symbol()?;
        let mut atom = Atom::new(atomic_number);
        atom.is_aromatic = aromatic;
        atom.isotope = isotope;
        atom.no_implicit = true;

        while self.peek() == Some(b'@') {
            self.pos += 1;
        }
        // Extended chirality classes such as @TH1 or @SP2.
        while matches!(self.peek(), Some(b'A'..=b'Z')) && self.peek() != Some(b'H') {
            self.pos += 1;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }

        if self.peek() == Some(b'H') {
            self.pos += 1;
            let count = self.read_number().unwrap_or(1);
            atom.implicit_hydrogens = self.narrow(count, "hydrogen count")?;
        }

        match self.peek() {
            Some(sign @ (b'+' | b'-')) => {
                self.pos += 1;
                let unit: i8 = if sign == b'+' { 1 } else { -1 };
                let mut charge = unit;
                if let Some(n) = self.read_number() {
                    charge = unit * self.narrow::<i8>(n, "charge")?;
                } else {
                    let mut count = 1u32;
                    while self.peek() == Some(sign) {
                        count += 1;
                        charge = charge.checked_add(unit).ok_or_else(|| {
                            self.error(SmilesErrorKind::NumberOutOfRange {
                                field: "charge",
                                value: count,
                            })
                        })?;
                        self.pos += 1;
                    }
                }
                atom.formal_charge = charge;
            }
            _ => {}
        }

        if self.peek() == Some(b':') {
            self.pos += 1;
            self.read_number();
        }

        if self.peek() != Some(b']') {
            return Err(SmilesError {
                position: open,
                kind: SmilesErrorKind::UnclosedBracket,
            });
        }
        self.pos += 1;
        Ok(atom)
    }

    fn bracket_symbol(&mut self) -> Result<(u8, bool), SmilesError> {
        let rest = &self.input[self.pos..];
        let Some(&first) = rest.first() else {
            return Err(self.error(SmilesErrorKind::UnclosedBracket));
        };
        if first == b'*' {
            self.pos += 1;
            return Ok((0, false));
        }
        if first.is_ascii_lowercase() {
            for symbol in ["se", "as", "b", "c", "n", "o", "p", "s"] {
                if rest.starts_with(symbol.as_bytes()) {
                    let mut upper = symbol.to_string();
                    upper[..1].make_ascii_uppercase();
                    if let Some(element) = Element::from_symbol(&upper) {
                        self.pos += symbol.len();
                        return Ok((element.atomic_number, true));
                    }
                }
            }
            return Err(self.error(SmilesErrorKind::UnknownElement((first as char).to_string())));
        }
        if first.is_ascii_uppercase() {
            if let Some(&second) = rest.get(1).filter(|c| c.is_ascii_lowercase()) {
                let two = format!("{}{}", first as char, second as char);
                if let Some(element) = Element::from_symbol(&two) {
                    self.pos += 2;
                    return Ok((element.atomic_number, false));
                }
            }
            let one = (first as char).to_string();
            return match Element::from_symbol(&one) {
                Some(element) => {
                    self.pos += 1;
                    Ok((element.atomic_number, false))
                }
                None => Err(self.error(SmilesErrorKind::UnknownElement(one))),
            };
        }
        Err(self.error(SmilesErrorKind::UnexpectedCharacter(first as char)))
    }

    fn read_number(&mut self) -> Option<u32> {
        let mut value: Option<u32> = None;
        while let Some(d @ b'0'..=b'9') = self.peek() {
            self.pos += 1;
            value = Some(value.unwrap_or(0).saturating_mul(10).saturating_add(u32::from(d - b'0')));
        }
        value
    }

    fn narrow<T: TryFrom<u32>>(&self, value: u32, field: &'static str) -> Result<T, SmilesError> {
        T::try_from(value).map_err(|_| self.error(SmilesErrorKind::NumberOutOfRange { field, value }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_chain_with_implicit_hydrogens() {
        let mol = parse_smiles("CCO").unwrap();
        assert_eq!(mol.atom_count(), 3);
        assert_eq!(mol.bonds().len(), 2);
        assert_eq!(mol.total_hydrogens(0), 3);
        assert_eq!(mol.total_hydrogens(1), 2);
        assert_eq!(mol.total_hydrogens(2), 1);
        assert_eq!(mol.name(), "CCO");
    }

    #[test]
    fn parses_branches_and_multiple_bonds() {
        let mol = parse_smiles("CC(=O)O").unwrap();
        assert_eq!(mol.atom_count(), 4);
        assert_eq!(mol.bond_between(1, 2).unwrap().order, BondOrder::Double);
        assert_eq!(mol.bond_between(1, 3).unwrap().order, BondOrder::Single);
        assert_eq!(mol.total_hydrogens(2), 0);
        assert_eq!(mol.total_hydrogens(3), 1);
    }

    #[test]
    fn parses_aromatic_rings_and_percent_closures() {
        let benzene = parse_smiles("c1ccccc1").unwrap();
        assert!(benzene.bonds().iter().all(|b| b.order == BondOrder::Aromatic));
        assert!(benzene.atoms().iter().all(|a| a.implicit_hydrogens == 1));

        let cyclohexane = parse_smiles("C%10CCCCC%10").unwrap();
        assert_eq!(cyclohexane.bonds().len(), 6);
        assert_eq!(cyclohexane.ring_info().num_rings(), 1);
    }

    #[test]
    fn parses_bracket_atoms() {
        let mol = parse_smiles("[13CH3][NH3+].[O-]C(=O)[C@@H](N)C").unwrap();
        let carbon = mol.atom(0).unwrap();
        assert_eq!(carbon.isotope, Some(13));
        assert_eq!(carbon.implicit_hydrogens, 3);
        let nitrogen = mol.atom(1).unwrap();
        assert_eq!(nitrogen.formal_charge, 1);
        assert_eq!(mol.total_hydrogens(1), 3);
        assert_eq!(mol.atom(2).unwrap().formal_charge, -1);
        assert_eq!(mol.total_hydrogens(5), 1);
        assert!(mol.bond_between(1, 2).is_none());
    }

    #[test]
    fn parses_two_letter_and_aromatic_bracket_elements() {
        let mol = parse_smiles("[Na+].[Cl-].c1cc[se]c1").unwrap();
        assert_eq!(mol.atom(0).unwrap().symbol(), "Na");
        assert_eq!(mol.atom(1).unwrap().symbol(), "Cl");
        let se = mol.atom(5).unwrap();
        assert_eq!(se.symbol(), "Se");
        assert!(se.is_aromatic);
    }

    #[test]
    fn multiple_charge_signs_accumulate() {
        let mol = parse_smiles("[Fe++]").unwrap();
        assert_eq!(mol.atom(0).unwrap().formal_charge, 2);
        let mol = parse_smiles("[O-2]").unwrap();
        assert_eq!(mol.atom(0).unwrap().formal_charge, -2);
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse_smiles("").unwrap_err().kind, SmilesErrorKind::Empty);
        assert_eq!(parse_smiles("   ").unwrap_err().kind, SmilesErrorKind::Empty);
        assert!(matches!(
            parse_smiles("C1CC").unwrap_err().kind,
            SmilesErrorKind::UnclosedRing(1)
        ));
        assert!(matches!(
            parse_smiles("CC(C").unwrap_err().kind,
            SmilesErrorKind::UnbalancedParenthesis
        ));
        assert!(matches!(
            parse_smiles("C)C").unwrap_err().kind,
            SmilesErrorKind::UnbalancedParenthesis
        ));
        assert!(matches!(
            parse_smiles("[CH4").unwrap_err().kind,
            SmilesErrorKind::UnclosedBracket
        ));
        assert!(matches!(
            parse_smiles("[Xx]").unwrap_err().kind,
            SmilesErrorKind::UnknownElement(_)
        ));
        assert!(matches!(
            parse_smiles("C=").unwrap_err().kind,
            SmilesErrorKind::MissingAtom
        ));
        assert!(matches!(
            parse_smiles("CQ").unwrap_err().kind,
            SmilesErrorKind::UnexpectedCharacter('Q')
        ));
    }

    #[test]
    fn ring_bond_order_may_be_given_on_either_end() {
        let mol = parse_smiles("C=1CCCCC1").unwrap();
        assert_eq!(mol.bond_between(0, 5).unwrap().order, BondOrder::Double);
        let mol = parse_smiles("C1CCCCC=1").unwrap();
        assert_eq!(mol.bond_between(0, 5).unwrap().order, BondOrder::Double);
    }

    #[test]
    fn stereo_bonds_read_as_single() {
        let mol = parse_smiles("F/C=C/F").unwrap();
        assert_eq!(mol.bond_between(0, 1).unwrap().order, BondOrder::Single);
        assert_eq!(mol.bond_between(1, 2).unwrap().order, BondOrder::Double);
    }

    #[test]
    fn out_of_range_bracket_numbers_are_errors() {
        let many_plus = format!("[C{}]", "+".repeat(130));
        for smiles in [many_plus.as_str(), "[C+200]", "[70000C]", "[CH300]"] {
            assert!(
                matches!(
                    parse_smiles(smiles).unwrap_err().kind,
                    SmilesErrorKind::NumberOutOfRange { .. }
                ),
                "{smiles}"
            );
        }
        let mol = parse_smiles("[13CH3+]").unwrap();
        assert_eq!(mol.atoms()[0].formal_charge, 1);
        assert_eq!(mol.atoms()[0].isotope, Some(13));
    }
}
