use crate::core::models::element::Element;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid SMARTS at position {position}: {kind}")]
pub struct SmartsError {
    pub position: usize,
    pub kind: SmartsErrorKind,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SmartsErrorKind {
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("unexpected end of pattern")]
    UnexpectedEnd,
    #[error("unknown element '{0}'")]
    UnknownElement(String),
    #[error("bracket atom is not closed")]
    UnclosedBracket,
    #[error("unbalanced parenthesis")]
    UnbalancedParenthesis,
    #[error("recursive SMARTS is not closed")]
    UnclosedRecursion,
    #[error("ring bond {0} is never closed")]
    UnclosedRing(u32),
    #[error("ring bond {0} closes on its own atom")]
    InvalidRingClosure(u32),
    #[error("bond or branch without a preceding atom")]
    MissingAtom,
    #[error("{field} {value} is out of range")]
    NumberOutOfRange { field: &'static str, value: u32 },
}

/// A boolean expression over query primitives.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<P> {
    Primitive(P),
    Not(Box<Expr<P>>),
    And(Vec<Expr<P>>),
    Or(Vec<Expr<P>>),
}

impl<P> Expr<P> {
    fn all(mut terms: Vec<Expr<P>>) -> Self {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::And(terms)
        }
    }

    fn any(mut terms: Vec<Expr<P>>) -> Self {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::Or(terms)
        }
    }

    /// Evaluates the expression, short-circuiting `And`/`Or`.
    pub fn evaluate<F: Fn(&P) -> bool>(&self, test: &F) -> bool {
        match self {
            Expr::Primitive(p) => test(p),
            Expr::Not(inner) => !inner.evaluate(test),
            Expr::And(terms) => terms.iter().all(|t| t.evaluate(test)),
            Expr::Or(terms) => terms.iter().any(|t| t.evaluate(test)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AtomPrimitive {
    /// `*`, or a chirality mark which is accepted and ignored.
    Any,
    /// `a`
    Aromatic,
    /// `A`
    Aliphatic,
    /// An element symbol; `aromatic` is `Some` for organic symbols whose case matters.
    Element { atomic_number: u8, aromatic: Option<bool> },
    /// `#<n>`
    AtomicNumber(u8),
    /// `H<n>`: total attached hydrogens.
    TotalHCount(u8),
    /// `h<n>`: implicit hydrogens; `None` means at least one.
    ImplicitHCount(Option<u8>),
    /// `D<n>`: explicit connections.
    Degree(u8),
    /// `X<n>`: total connections including hydrogens.
    TotalConnections(u8),
    /// `v<n>`: total valence.
    Valence(u8),
    /// `R<n>`: number of SSSR rings; `None` means in any ring.
    RingMembership(Option<u8>),
    /// `r<n>`: size of the smallest ring; `None` means in any ring.
    RingSize(Option<u8>),
    /// `x<n>`: ring bonds; `None` means at least one.
    RingConnectivity(Option<u8>),
    /// `+<n>` / `-<n>`
    Charge(i8),
    /// Leading mass number in a bracket atom.
    Isotope(u16),
    /// `$(...)`: the atom is the first atom of a match of the inner pattern.
    Recursive(Box<SmartsPattern>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondPrimitive {
    /// No bond symbol written: single or aromatic.
    Implicit,
    Single,
    Double,
    Triple,
    Aromatic,
    /// `~`
    Any,
    /// `@`
    Ring,
}

pub type AtomExpr = Expr<AtomPrimitive>;
pub type BondExpr = Expr<BondPrimitive>;

#[derive(Debug, Clone, PartialEq)]
pub struct PatternBond {
    pub atom1: usize,
    pub atom2: usize,
    pub expr: BondExpr,
}

/// One step of the match plan: a pattern atom and, unless it starts a new
/// component, the already-placed atom and pattern bond that reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PlanStep {
    pub atom: usize,
    pub via: Option<(usize, usize)>,
}

/// A parsed SMARTS query.
///
/// The empty pattern is valid and matches nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct SmartsPattern {
    source: String,
    atoms: Vec<AtomExpr>,
    bonds: Vec<PatternBond>,
    adjacency: Vec<Vec<(usize, usize)>>,
    plan: Vec<PlanStep>,
}

impl SmartsPattern {
    /// Parses a SMARTS string.
    ///
    /// # Errors
    ///
    /// Returns [`SmartsError`] with the byte position of the first problem.
    pub fn parse(smarts: &str) -> Result<Self, SmartsError> {
        Self::parse_with_offset(smarts, 0)
    }

    fn parse_with_offset(smarts: &str, offset: usize) -> Result<Self, SmartsError> {
        let trimmed = smarts.trim();
        let mut parser = Parser {
            input: trimmed.as_bytes(),
            pos: 0,
            offset,
            bracket_first: false,
        };
        let (atoms, bonds) = parser.pattern()?;

        let mut adjacency = vec![Vec::new(); atoms.len()];
        for (bi, bond) in bonds.iter().enumerate() {
            adjacency[bond.atom1].push((bond.atom2, bi));
            adjacency[bond.atom2].push((bond.atom1, bi));
        }
        let plan = build_plan(atoms.len(), &adjacency);
        Ok(Self {
            source: trimmed.to_string(),
            atoms,
            bonds,
            adjacency,
            plan,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn atoms(&self) -> &[AtomExpr] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[PatternBond] {
        &self.bonds
    }

    pub(crate) fn adjacency(&self) -> &[Vec<(usize, usize)>] {
        &self.adjacency
    }

    pub(crate) fn plan(&self) -> &[PlanStep] {
        &self.plan
    }
}

impl FromStr for SmartsPattern {
    type Err = SmartsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SmartsPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Depth-first placement order so every atom after a component root is reached
/// through a bond from an atom placed earlier.
fn build_plan(atom_count: usize, adjacency: &[Vec<(usize, usize)>]) -> Vec<PlanStep> {
    let mut plan = Vec::with_capacity(atom_count);
    let mut visited = vec![false; atom_count];
    for root in 0..atom_count {
        if visited[root] {
            continue;
        }
        visited[root] = true;
        plan.push(PlanStep {
            atom: root,
            via: None,
        });
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            for &(next, bi) in adjacency[current].iter().rev() {
                if !visited[next] {
                    visited[next] = true;
                    plan.push(PlanStep {
                        atom: next,
                        via: Some((current, bi)),
                    });
                    stack.push(next);
                }
            }
        }
    }
    plan
}

fn is_bond_char(c: u8) -> bool {
    matches!(
        c,
        b'-' | b'=' | b'#' | b':' | b'~' | b'@' | b'/' | b'\\' | b'!' | b'&' | b';' | b','
    )
}

type PrimitiveFn<'a, P> = fn(&mut Parser<'a>) -> Result<P, SmartsError>;

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    offset: usize,
    bracket_first: bool,
}

impl<'a> Parser<'a> {
    fn error(&self, kind: SmartsErrorKind) -> SmartsError {
        SmartsError {
            position: self.offset + self.pos,
            kind,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.input.get(self.pos + ahead).copied()
    }

    /// Reads a run of digits, saturating at `u32::MAX` so that oversized
    /// numbers fail the range check of their field.
    fn read_number(&mut self) -> Option<u32> {
        let mut value: Option<u32> = None;
        while let Some(d @ b'0'..=b'9') = self.peek() {
            self.pos += 1;
            let digit = u32::from(d - b'0');
            value = Some(value.unwrap_or(0).saturating_mul(10).saturating_add(digit));
        }
        value
    }

    fn narrow<T: TryFrom<u32>>(&self, value: u32, field: &'static str) -> Result<T, SmartsError> {
        T::try_from(value).map_err(|_| self.error(SmartsErrorKind::NumberOutOfRange { field, value }))
    }

    fn read_count(&mut self, field: &'static str) -> Result<Option<u8>, SmartsError> {
        self.read_number().map(|n| self.narrow(n, field)).transpose()
    }

    fn pattern(&mut self) -> Result<(Vec<AtomExpr>, Vec<PatternBond>), SmartsError> {
        let mut atoms: Vec<AtomExpr> = Vec::new();
        let mut bonds: Vec<PatternBond> = Vec::new();
        let mut prev: Option<usize> = None;
        let mut branches: Vec<Option<usize>> = Vec::new();
        let mut pending: Option<BondExpr> = None;
        let mut open_rings: Vec<(u32, usize, Option<BondExpr>)> = Vec::new();

        while let Some(c) = self.peek() {
            match c {
                b'(' => {
                    if prev.is_none() {
                        return Err(self.error(SmartsErrorKind::MissingAtom));
                    }
                    branches.push(prev);
                    self.pos += 1;
                }
                b')' => {
                    let saved = branches
                        .pop()
                        .ok_or_else(|| self.error(SmartsErrorKind::UnbalancedParenthesis))?;
                    if pending.is_some() {
                        return Err(self.error(SmartsErrorKind::MissingAtom));
                    }
                    prev = saved;
                    self.pos += 1;
                }
                b'.' => {
                    if pending.is_some() {
                        return Err(self.error(SmartsErrorKind::MissingAtom));
                    }
                    prev = None;
                    self.pos += 1;
                }
                b'0'..=b'9' | b'%' => {
                    let start = self.pos;
                    let current = prev.ok_or_else(|| self.error(SmartsErrorKind::MissingAtom))?;
                    let number = if c == b'%' {
                        self.pos += 1;
                        let n = match (self.peek(), self.peek_at(1)) {
                            (Some(a @ b'0'..=b'9'), Some(b @ b'0'..=b'9')) => {
                                ((a - b'0') * 10 + (b - b'0')) as u32
                            }
                            _ => return Err(self.error(SmartsErrorKind::UnexpectedCharacter('%'))),
                        };
                        self.pos += 2;
                        n
                    } else {
                        self.pos += 1;
                        (c - b'0') as u32
                    };
                    let expr = pending.take();
                    if let Some(slot) = open_rings.iter().position(|(n, _, _)| *n == number) {
                        let (_, opener, opener_expr) = open_rings.remove(slot);
                        if opener == current {
                            return Err(SmartsError {
                                position: self.offset + start,
                                kind: SmartsErrorKind::InvalidRingClosure(number),
                            });
                        }
                        let expr = match (opener_expr, expr) {
                            (Some(a), Some(b)) => Expr::And(vec![a, b]),
                            (Some(e), None) | (None, Some(e)) => e,
                            (None, None) => Expr::Primitive(BondPrimitive::Implicit),
                        };
                        bonds.push(PatternBond {
                            atom1: opener,
                            atom2: current,
                            expr,
                        });
                    } else {
                        open_rings.push((number, current, expr));
                    }
                }
                c if is_bond_char(c) => {
                    if prev.is_none() || pending.is_some() {
                        return Err(self.error(SmartsErrorKind::MissingAtom));
                    }
                    pending = Some(self.expr_low(
                        Parser::bond_primitive,
                        |c| !is_bond_char(c),
                    )?);
                }
                _ => {
                    let atom = if c == b'[' {
                        self.bracket_atom()?
                    } else {
                        self.organic_atom()?
                    };
                    let idx = atoms.len();
                    atoms.push(atom);
                    if let Some(p) = prev {
                        let expr = pending
                            .take()
                            .unwrap_or(Expr::Primitive(BondPrimitive::Implicit));
                        bonds.push(PatternBond {
                            atom1: p,
                            atom2: idx,
                            expr,
                        });
                    }
                    prev = Some(idx);
                }
            }
        }

        if !branches.is_empty() {
            return Err(self.error(SmartsErrorKind::UnbalancedParenthesis));
        }
        if pending.is_some() {
            return Err(self.error(SmartsErrorKind::MissingAtom));
        }
        if let Some((n, _, _)) = open_rings.first() {
            return Err(self.error(SmartsErrorKind::UnclosedRing(*n)));
        }
        Ok((atoms, bonds))
    }

    fn organic_atom(&mut self) -> Result<AtomExpr, SmartsError> {
        let c = self.input[self.pos];
        let next = self.peek_at(1);
        let (primitive, width) = match (c, next) {
            (b'C', Some(b'l')) => (element(17, Some(false)), 2),
            (b'B', Some(b'r')) => (element(35, Some(false)), 2),
            (b'B', _) => (element(5, Some(false)), 1),
            (b'C', _) => (element(6, Some(false)), 1),
            (b'N', _) => (element(7, Some(false)), 1),
            (b'O', _) => (element(8, Some(false)), 1),
            (b'P', _) => (element(15, Some(false)), 1),
            (b'S', _) => (element(16, Some(false)), 1),
            (b'F', _) => (element(9, Some(false)), 1),
            (b'I', _) => (element(53, Some(false)), 1),
            (b'b', _) => (element(5, Some(true)), 1),
            (b'c', _) => (element(6, Some(true)), 1),
            (b'n', _) => (element(7, Some(true)), 1),
            (b'o', _) => (element(8, Some(true)), 1),
            (b'p', _) => (element(15, Some(true)), 1),
            (b's', _) => (element(16, Some(true)), 1),
            (b'*', _) => (AtomPrimitive::Any, 1),
            (b'a', _) => (AtomPrimitive::Aromatic, 1),
            (b'A', _) => (AtomPrimitive::Aliphatic, 1),
            _ => return Err(self.error(SmartsErrorKind::UnexpectedCharacter(c as char))),
        };
        self.pos += width;
        Ok(Expr::Primitive(primitive))
    }

    fn bracket_atom(&mut self) -> Result<AtomExpr, SmartsError> {
        let open = self.pos;
        self.pos += 1;
        self.bracket_first = true;
        let expr = self.expr_low(Parser::atom_primitive, |c| c == b']')?;
        if self.peek() != Some(b']') {
            return Err(SmartsError {
                position: self.offset + open,
                kind: SmartsErrorKind::UnclosedBracket,
            });
        }
        self.pos += 1;
        Ok(expr)
    }

    fn expr_low<P>(&mut self, prim: PrimitiveFn<'a, P>, stop: fn(u8) -> bool) -> Result<Expr<P>, SmartsError> {
        let mut terms = vec![self.expr_or(prim, stop)?];
        while self.peek() == Some(b';') {
            self.pos += 1;
            terms.push(self.expr_or(prim, stop)?);
        }
        Ok(Expr::all(terms))
    }

    fn expr_or<P>(&mut self, prim: PrimitiveFn<'a, P>, stop: fn(u8) -> bool) -> Result<Expr<P>, SmartsError> {
        let mut terms = vec![self.expr_and(prim, stop)?];
        while self.peek() == Some(b',') {
            self.pos += 1;
            terms.push(self.expr_and(prim, stop)?);
        }
        Ok(Expr::any(terms))
    }

    fn expr_and<P>(&mut self, prim: PrimitiveFn<'a, P>, stop: fn(u8) -> bool) -> Result<Expr<P>, SmartsError> {
        let mut terms = vec![self.expr_not(prim)?];
        loop {
            match self.peek() {
                Some(b'&') => {
                    self.pos += 1;
                    terms.push(self.expr_not(prim)?);
                }
                Some(c) if !stop(c) && c != b';' && c != b',' => terms.push(self.expr_not(prim)?),
                _ => break,
            }
        }
        Ok(Expr::all(terms))
    }

    fn expr_not<P>(&mut self, prim: PrimitiveFn<'a, P>) -> Result<Expr<P>, SmartsError> {
        if self.peek() == Some(b'!') {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.expr_not(prim)?)));
        }
        prim(self).map(Expr::Primitive)
    }

    fn bond_primitive(&mut self) -> Result<BondPrimitive, SmartsError> {
        let c = self
            .peek()
            .ok_or_else(|| self.error(SmartsErrorKind::UnexpectedEnd))?;
        let primitive = match c {
            b'-' | b'/' | b'\\' => BondPrimitive::Single,
            b'=' => BondPrimitive::Double,
            b'#' => BondPrimitive::Triple,
            b':' => BondPrimitive::Aromatic,
            b'~' => BondPrimitive::Any,
            b'@' => BondPrimitive::Ring,
            _ => return Err(self.error(SmartsErrorKind::UnexpectedCharacter(c as char))),
        };
        self.pos += 1;
        Ok(primitive)
    }

    fn atom_primitive(&mut self) -> Result<AtomPrimitive, SmartsError> {
        let c = self
            .peek()
            .ok_or_else(|| self.error(SmartsErrorKind::UnclosedBracket))?;
        let first = std::mem::replace(&mut self.bracket_first, false);

        if c.is_ascii_digit() {
            let isotope = self.read_number().unwrap_or(0);
            let isotope: u16 = self.narrow(isotope, "isotope")?;
            // An isotope does not consume the "first primitive" slot: [2H] is deuterium.
            self.bracket_first = first;
            return Ok(AtomPrimitive::Isotope(isotope));
        }

        match c {
            b'*' => {
                self.pos += 1;
                Ok(AtomPrimitive::Any)
            }
            b'@' => {
                while matches!(self.peek(), Some(b'@' | b'?')) {
                    self.pos += 1;
                }
                Ok(AtomPrimitive::Any)
            }
            b'#' => {
                self.pos += 1;
                let n = self
                    .read_number()
                    .ok_or_else(|| self.error(SmartsErrorKind::UnexpectedCharacter('#')))?;
                Ok(AtomPrimitive::AtomicNumber(self.narrow(n, "atomic number")?))
            }
            b'+' | b'-' => {
                self.pos += 1;
                let unit: i8 = if c == b'+' { 1 } else { -1 };
                let charge = match self.read_number() {
                    Some(n) => unit * self.narrow::<i8>(n, "charge")?,
                    None => {
                        let mut charge = unit;
                        let mut count = 1u32;
                        while self.peek() == Some(c) {
                            self.pos += 1;
                            count += 1;
                            charge = charge.checked_add(unit).ok_or_else(|| {
                                self.error(SmartsErrorKind::NumberOutOfRange {
                                    field: "charge",
                                    value: count,
                                })
                            })?;
                        }
                        charge
                    }
                };
                Ok(AtomPrimitive::Charge(charge))
            }
            b'$' => self.recursive(),
            b':' => {
                // Atom map class.
                self.pos += 1;
                self.read_number();
                Ok(AtomPrimitive::Any)
            }
            b'H' if first && matches!(self.peek_at(1), Some(b']' | b'+' | b'-')) => {
                self.pos += 1;
                Ok(element(1, None))
            }
            b'H' if !matches!(self.peek_at(1), Some(b'e')) => {
                self.pos += 1;
                Ok(AtomPrimitive::TotalHCount(self.read_count("hydrogen count")?.unwrap_or(1)))
            }
            b'D' => {
                self.pos += 1;
                Ok(AtomPrimitive::Degree(self.read_count("degree")?.unwrap_or(1)))
            }
            b'X' => {
                self.pos += 1;
                Ok(AtomPrimitive::TotalConnections(self.read_count("connectivity")?.unwrap_or(1)))
            }
            b'R' => {
                self.pos += 1;
                Ok(AtomPrimitive::RingMembership(self.read_count("ring membership")?))
            }
            b'v' => {
                self.pos += 1;
                Ok(AtomPrimitive::Valence(self.read_count("valence")?.unwrap_or(1)))
            }
            b'h' => {
                self.pos += 1;
                Ok(AtomPrimitive::ImplicitHCount(self.read_count("implicit hydrogen count")?))
            }
            b'r' => {
                self.pos += 1;
                Ok(AtomPrimitive::RingSize(self.read_count("ring size")?))
            }
            b'x' => {
                self.pos += 1;
                Ok(AtomPrimitive::RingConnectivity(self.read_count("ring connectivity")?))
            }
            c if c.is_ascii_lowercase() => self.aromatic_symbol(),
            c if c.is_ascii_uppercase() => self.element_symbol(),
            _ => Err(self.error(SmartsErrorKind::UnexpectedCharacter(c as char))),
        }
    }

    fn aromatic_symbol(&mut self) -> Result<AtomPrimitive, SmartsError> {
        let rest = &self.input[self.pos..];
        for symbol in ["se", "as", "b", "c", "n", "o", "p", "s"] {
            if rest.starts_with(symbol.as_bytes()) {
                let mut upper = symbol.to_string();
                upper[..1].make_ascii_uppercase();
                if let Some(e) = Element::from_symbol(&upper) {
                    self.pos += symbol.len();
                    return Ok(element(e.atomic_number, Some(true)));
                }
            }
        }
        if rest.first() == Some(&b'a') {
            self.pos += 1;
            return Ok(AtomPrimitive::Aromatic);
        }
        Err(self.error(SmartsErrorKind::UnexpectedCharacter(rest[0] as char)))
    }

    fn element_symbol(&mut self) -> Result<AtomPrimitive, SmartsError> {
        let first = self.input[self.pos];
        if let Some(second) = self.peek_at(1).filter(u8::is_ascii_lowercase) {
            let two = format!("{}{}", first as char, second as char);
            if let Some(e) = Element::from_symbol(&two) {
                self.pos += 2;
                return Ok(element(e.atomic_number, Some(false)));
            }
        }
        if first == b'A' {
            self.pos += 1;
            return Ok(AtomPrimitive::Aliphatic);
        }
        let one = (first as char).to_string();
        match Element::from_symbol(&one) {
            Some(e) => {
                self.pos += 1;
                Ok(element(e.atomic_number, Some(false)))
            }
            None => Err(self.error(SmartsErrorKind::UnknownElement(one))),
        }
    }

    fn recursive(&mut self) -> Result<AtomPrimitive, SmartsError> {
        if self.peek_at(1) != Some(b'(') {
            return Err(self.error(SmartsErrorKind::UnexpectedCharacter('$')));
        }
        let inner_start = self.pos + 2;
        let mut depth = 1;
        let mut cursor = inner_start;
        while cursor < self.input.len() {
            match self.input[cursor] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            cursor += 1;
        }
        if depth != 0 {
            return Err(self.error(SmartsErrorKind::UnclosedRecursion));
        }
        let inner = std::str::from_utf8(&self.input[inner_start..cursor])
            .map_err(|_| self.error(SmartsErrorKind::UnclosedRecursion))?;
        let pattern = SmartsPattern::parse_with_offset(inner, self.offset + inner_start)?;
        if pattern.is_empty() {
            return Err(SmartsError {
                position: self.offset + inner_start,
                kind: SmartsErrorKind::UnexpectedEnd,
            });
        }
        self.pos = cursor + 1;
        Ok(AtomPrimitive::Recursive(Box::new(pattern)))
    }
}

fn element(atomic_number: u8, aromatic: Option<bool>) -> AtomPrimitive {
    AtomPrimitive::Element {
        atomic_number,
        aromatic,
    }
}
