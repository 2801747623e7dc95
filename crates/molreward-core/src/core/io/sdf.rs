use crate::core::io::traits::MolecularFile;
use crate::core::models::atom::Atom;
use crate::core::models::element::Element;
use crate::core::models::molecule::{Molecule, MoleculeBuilder, MoleculeError};
use crate::core::models::topology::BondOrder;
use nalgebra::Point3;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SdfMetadata {
    /// Second header line (program and timestamp).
    pub program: String,
    /// Third header line (free comment).
    pub comment: String,
    /// `> <name>` data items following the connection table.
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum SdfError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: SdfParseErrorKind },
    #[error("Invalid structure: {0}")]
    Structure(#[from] MoleculeError),
    #[error("No molecule record found")]
    Empty,
}

#[derive(Debug, Error)]
pub enum SdfParseErrorKind {
    #[error("Unexpected end of record")]
    Truncated,
    #[error("Invalid integer in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Unknown element symbol '{0}'")]
    UnknownElement(String),
    #[error("Unsupported bond type {0}")]
    UnsupportedBondType(u8),
    #[error("Only V2000 connection tables are supported")]
    UnsupportedVersion,
    #[error("Bond references atom {0} which does not exist")]
    BadAtomReference(usize),
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

fn parse_int<T: std::str::FromStr>(
    line: &str,
    start: usize,
    end: usize,
    line_num: usize,
) -> Result<T, SdfError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| SdfError::Parse {
        line: line_num,
        kind: SdfParseErrorKind::InvalidInt {
            columns: format!("{}-{}", start + 1, end),
            value: value.to_string(),
        },
    })
}

fn parse_float(line: &str, start: usize, end: usize, line_num: usize) -> Result<f64, SdfError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| SdfError::Parse {
        line: line_num,
        kind: SdfParseErrorKind::InvalidFloat {
            columns: format!("{}-{}", start + 1, end),
            value: value.to_string(),
        },
    })
}

fn charge_from_code(code: u8) -> i8 {
    match code {
        1 => 3,
        2 => 2,
        3 => 1,
        5 => -1,
        6 => -2,
        7 => -3,
        _ => 0,
    }
}

fn code_from_charge(charge: i8) -> u8 {
    match charge {
        3 => 1,
        2 => 2,
        1 => 3,
        -1 => 5,
        -2 => 6,
        -3 => 7,
        _ => 0,
    }
}

struct LineReader<'a, R: BufRead> {
    reader: &'a mut R,
    line_num: usize,
}

impl<R: BufRead> LineReader<'_, R> {
    fn next_line(&mut self) -> Result<Option<String>, SdfError> {
        let mut buf = String::new();
        if self.reader.read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        self.line_num += 1;
        Ok(Some(buf.trim_end_matches(['\n', '\r']).to_string()))
    }

    fn require_line(&mut self) -> Result<String, SdfError> {
        self.next_line()?.ok_or(SdfError::Parse {
            line: self.line_num + 1,
            kind: SdfParseErrorKind::Truncated,
        })
    }
}

/// MDL SD file (V2000 connection tables).
///
/// Explicit hydrogens present in the file are folded into the hydrogen counts
/// of their heavy atoms after reading, so returned molecules are heavy-atom graphs
/// carrying one conformer.
pub struct SdfFile;

impl SdfFile {
    /// Reads every record of an SD file.
    pub fn read_all(reader: &mut impl BufRead) -> Result<Vec<(Molecule, SdfMetadata)>, SdfError> {
        let mut lines = LineReader {
            reader,
            line_num: 0,
        };
        let mut records = Vec::new();
        while let Some(record) = read_record(&mut lines)? {
            records.push(record);
        }
        Ok(records)
    }
}

fn read_record<R: BufRead>(
    lines: &mut LineReader<'_, R>,
) -> Result<Option<(Molecule, SdfMetadata)>, SdfError> {
    let Some(name) = lines.next_line()? else {
        return Ok(None);
    };
    let program = match lines.next_line()? {
        Some(line) => line,
        // Trailing blank line after the last record.
        None if name.trim().is_empty() => return Ok(None),
        None => {
            return Err(SdfError::Parse {
                line: lines.line_num + 1,
                kind: SdfParseErrorKind::Truncated,
            });
        }
    };
    let comment = lines.require_line()?;
    let counts = lines.require_line()?;
    let counts_line = lines.line_num;
    if counts.contains("V3000") {
        return Err(SdfError::Parse {
            line: counts_line,
            kind: SdfParseErrorKind::UnsupportedVersion,
        });
    }
    let atom_count: usize = parse_int(&counts, 0, 3, counts_line)?;
    let bond_count: usize = parse_int(&counts, 3, 6, counts_line)?;

    let mut builder = MoleculeBuilder::new().name(name.trim());
    for _ in 0..atom_count {
        let line = lines.require_line()?;
        let n = lines.line_num;
        let x = parse_float(&line, 0, 10, n)?;
        let y = parse_float(&line, 10, 20, n)?;
        let z = parse_float(&line, 20, 30, n)?;
        let symbol = slice_and_trim(&line, 31, 34);
        let element = Element::from_symbol(symbol).ok_or_else(|| SdfError::Parse {
            line: n,
            kind: SdfParseErrorKind::UnknownElement(symbol.to_string()),
        })?;
        let mut atom = Atom::new(element.atomic_number);
        let charge_code = slice_and_trim(&line, 36, 39);
        if !charge_code.is_empty() {
            atom.formal_charge = charge_from_code(parse_int(&line, 36, 39, n)?);
        }
        builder.add_atom_at(atom, Point3::new(x, y, z));
    }

    let mut pending_bonds = Vec::with_capacity(bond_count);
    for _ in 0..bond_count {
        let line = lines.require_line()?;
        let n = lines.line_num;
        let a: usize = parse_int(&line, 0, 3, n)?;
        let b: usize = parse_int(&line, 3, 6, n)?;
        let code: u8 = parse_int(&line, 6, 9, n)?;
        let order = BondOrder::from_molfile_code(code).ok_or(SdfError::Parse {
            line: n,
            kind: SdfParseErrorKind::UnsupportedBondType(code),
        })?;
        for idx in [a, b] {
            if idx == 0 || idx > atom_count {
                return Err(SdfError::Parse {
                    line: n,
                    kind: SdfParseErrorKind::BadAtomReference(idx),
                });
            }
        }
        pending_bonds.push((a - 1, b - 1, order));
    }

    let mut properties = BTreeMap::new();
    let mut in_ctab = true;
    let mut current_key: Option<String> = None;
    let mut current_value = Vec::new();
    loop {
        let Some(line) = lines.next_line()? else {
            break;
        };
        if line.starts_with("$$$$") {
            break;
        }
        if in_ctab {
            if line.starts_with("M  END") {
                in_ctab = false;
            } else if line.starts_with("M  CHG") {
                // Charges in the property block supersede the atom block.
                let n = lines.line_num;
                let entries: usize = parse_int(&line, 6, 9, n)?;
                for i in 0..entries {
                    let start = 9 + i * 8;
                    let idx: usize = parse_int(&line, start, start + 4, n)?;
                    let charge: i8 = parse_int(&line, start + 4, start + 8, n)?;
                    let atom = idx
                        .checked_sub(1)
                        .and_then(|i| builder.atom_mut(i))
                        .ok_or(SdfError::Parse {
                            line: n,
                            kind: SdfParseErrorKind::BadAtomReference(idx),
                        })?;
                    atom.formal_charge = charge;
                }
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix('>') {
            if let Some(key) = current_key.take() {
                properties.insert(key, current_value.join("\n"));
                current_value.clear();
            }
            let key = rest
                .split('<')
                .nth(1)
                .and_then(|s| s.split('>').next())
                .unwrap_or("")
                .to_string();
            current_key = Some(key);
        } else if let Some(key) = &current_key {
            if line.trim().is_empty() {
                properties.insert(key.clone(), current_value.join("\n"));
                current_value.clear();
                current_key = None;
            } else {
                current_value.push(line);
            }
        }
    }
    if let Some(key) = current_key {
        properties.insert(key, current_value.join("\n"));
    }

    for (a, b, order) in pending_bonds {
        builder.add_bond(a, b, order)?;
    }
    let molecule = builder.build().without_explicit_hydrogens();
    let metadata = SdfMetadata {
        program,
        comment,
        properties,
    };
    Ok(Some((molecule, metadata)))
}

impl MolecularFile for SdfFile {
    type Metadata = SdfMetadata;
    type Error = SdfError;

    fn read_from(reader: &mut impl BufRead) -> Result<(Molecule, Self::Metadata), Self::Error> {
        let mut lines = LineReader {
            reader,
            line_num: 0,
        };
        read_record(&mut lines)?.ok_or(SdfError::Empty)
    }

    fn write_to(
        molecule: &Molecule,
        metadata: &Self::Metadata,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        let origin = vec![Point3::origin(); molecule.atom_count()];
        let positions = molecule.conformer(0).unwrap_or(&origin);

        writeln!(writer, "{}", molecule.name())?;
        writeln!(writer, "{}", metadata.program)?;
        writeln!(writer, "{}", metadata.comment)?;
        writeln!(
            writer,
            "{:>3}{:>3}  0  0  0  0  0  0  0  0999 V2000",
            molecule.atom_count(),
            molecule.bonds().len()
        )?;
        for (atom, pos) in molecule.atoms().iter().zip(positions) {
            writeln!(
                writer,
                "{:>10.4}{:>10.4}{:>10.4} {:<3} 0{:>3}  0  0  0  0  0  0  0  0  0  0",
                pos.x,
                pos.y,
                pos.z,
                atom.symbol(),
                code_from_charge(atom.formal_charge)
            )?;
        }
        for bond in molecule.bonds() {
            writeln!(
                writer,
                "{:>3}{:>3}{:>3}  0",
                bond.atom1 + 1,
                bond.atom2 + 1,
                bond.order.molfile_code()
            )?;
        }
        let charged: Vec<_> = molecule
            .atoms()
            .iter()
            .enumerate()
            .filter(|(_, a)| a.formal_charge != 0)
            .collect();
        for chunk in charged.chunks(8) {
            write!(writer, "M  CHG{:>3}", chunk.len())?;
            for (idx, atom) in chunk {
                write!(writer, " {:>3} {:>3}", idx + 1, atom.formal_charge)?;
            }
            writeln!(writer)?;
        }
        writeln!(writer, "M  END")?;
        for (key, value) in &metadata.properties {
            writeln!(writer, ">  <{}>", key)?;
            writeln!(writer, "{}", value)?;
            writeln!(writer)?;
        }
        writeln!(writer, "$$$$")?;
        Ok(())
    }

    fn write_molecule_to(molecule: &Molecule, writer: &mut impl Write) -> Result<(), Self::Error> {
        let metadata = SdfMetadata {
            program: "  molreward".to_string(),
            ..Default::default()
        };
        Self::write_to(molecule, &metadata, writer)
    }
}
