//! Byte level mutation of an owned buffer.
//!
//! A [`Mangle`] applies a random number of random [`MangleOp`]s to the
//! buffer it owns, drawing every decision from the random source it was
//! handed. The buffer is given back with [`Mangle::into_inner`] and may
//! have grown or shrunk when size changing operations were enabled.

use rand::seq::IndexedRandom;
use rand::Rng;
use std::str::FromStr;

pub const MAX_INCR: u8 = 8;

/// Integer boundary patterns in big endian; [`special_values`] adds the
/// byte reversed form of every entry that differs from it.
const BIG_ENDIAN_SPECIAL_VALUES: &[&[u8]] = &[
    b"\x00",
    b"\x00\x00",
    b"\x01",
    b"\x00\x01",
    b"\x7f",
    b"\x7f\xff",
    b"\x7f\xff\xff\xff",
    b"\x80",
    b"\x80\x00",
    b"\x80\x00\x00\x00",
    b"\xfe",
    b"\xfe\xff",
    b"\xfe\xff\xff\xff",
    b"\xff",
    b"\xff\xff",
    b"\xff\xff\xff\xff",
];

#[must_use]
pub fn special_values() -> Vec<Vec<u8>> {
    let mut values = Vec::with_capacity(BIG_ENDIAN_SPECIAL_VALUES.len() * 2);
    for item in BIG_ENDIAN_SPECIAL_VALUES {
        values.push(item.to_vec());

        let reversed: Vec<u8> = item.iter().rev().copied().collect();
        if reversed.as_slice() != *item {
            values.push(reversed);
        }
    }
    values
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MangleError {
    InvalidOffset { first: usize, last: isize },

    UnknownOperation(String),
}

impl std::error::Error for MangleError {}

impl core::fmt::Display for MangleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidOffset { first, last } => write!(
                f,
                "Invalid first_offset value (first={first} > last={last})"
            ),
            Self::UnknownOperation(name) => write!(f, "Unknown mangle operation: {name}"),
        }
    }
}

pub type MangleResult<T> = std::result::Result<T, MangleError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MangleOp {
    Replace,
    Bit,
    SpecialValue,
    Increment,
    InsertBytes,
    DeleteBytes,
}

impl MangleOp {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Bit => "bit",
            Self::SpecialValue => "special_value",
            Self::Increment => "increment",
            Self::InsertBytes => "insert_bytes",
            Self::DeleteBytes => "delete_bytes",
        }
    }

    #[must_use]
    pub fn changes_size(&self) -> bool {
        matches!(self, Self::InsertBytes | Self::DeleteBytes)
    }
}

impl FromStr for MangleOp {
    type Err = MangleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(Self::Replace),
            "bit" => Ok(Self::Bit),
            "special_value" => Ok(Self::SpecialValue),
            "increment" => Ok(Self::Increment),
            "insert_bytes" => Ok(Self::InsertBytes),
            "delete_bytes" => Ok(Self::DeleteBytes),
            other => Err(MangleError::UnknownOperation(other.to_string())),
        }
    }
}

impl core::fmt::Display for MangleOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Tunables of a mangling pass; rewritten by
/// [`crate::fuzz::auto_mangle::AutoMangle`] before each pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MangleConfig {
    pub min_op: usize,
    pub max_op: usize,
    pub max_insert_bytes: usize,
    pub max_delete_bytes: usize,
    pub max_incr: u8,
    pub first_offset: usize,
    pub change_size: bool,
    /// Explicit operation list; `None` means the default set.
    pub operations: Option<Vec<MangleOp>>,
}

impl Default for MangleConfig {
    fn default() -> Self {
        Self {
            min_op: 1,
            max_op: 100,
            max_insert_bytes: 4,
            max_delete_bytes: 4,
            max_incr: MAX_INCR,
            first_offset: 0,
            change_size: false,
            operations: None,
        }
    }
}

impl MangleConfig {
    #[must_use]
    pub fn active_operations(&self) -> Vec<MangleOp> {
        match &self.operations {
            Some(operations) if !operations.is_empty() => operations.clone(),
            _ => {
                let mut operations = vec![MangleOp::Replace, MangleOp::Bit, MangleOp::SpecialValue];
                if self.change_size {
                    operations.extend([MangleOp::InsertBytes, MangleOp::DeleteBytes]);
                }
                operations
            }
        }
    }
}

pub struct Mangle<'a, R: Rng + ?Sized> {
    config: &'a MangleConfig,
    rng: &'a mut R,
    special_values: Vec<Vec<u8>>,
    data: Vec<u8>,
}

impl<'a, R: Rng + ?Sized> Mangle<'a, R> {
    pub fn new(config: &'a MangleConfig, rng: &'a mut R, data: Vec<u8>) -> Self {
        Self {
            config,
            rng,
            special_values: special_values(),
            data,
        }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    fn generate_byte(&mut self) -> u8 {
        self.rng.random()
    }

    /// Picks an offset in `[first_offset, len - reserve]`.
    fn offset(&mut self, reserve: usize) -> MangleResult<usize> {
        let first = self.config.first_offset;
        let last = self.data.len() as isize - reserve as isize;
        if last < first as isize {
            return Err(MangleError::InvalidOffset { first, last });
        }
        Ok(self.rng.random_range(first..=last as usize))
    }

    pub fn mangle_replace(&mut self) -> MangleResult<()> {
        let offset = self.offset(1)?;
        self.data[offset] = self.generate_byte();
        Ok(())
    }

    pub fn mangle_bit(&mut self) -> MangleResult<()> {
        let offset = self.offset(1)?;
        let bit = self.rng.random_range(0..=7u8);
        if self.rng.random_bool(0.5) {
            self.data[offset] |= 1 << bit;
        } else {
            self.data[offset] &= !(1 << bit);
        }
        Ok(())
    }

    /// Silently does nothing when the chosen pattern does not fit.
    pub fn mangle_special_value(&mut self) -> MangleResult<()> {
        let Some(pattern) = self.special_values.choose(&mut *self.rng).cloned() else {
            return Ok(());
        };

        if let Ok(offset) = self.offset(pattern.len()) {
            self.data[offset..offset + pattern.len()].copy_from_slice(&pattern);
        }
        Ok(())
    }

    pub fn mangle_increment(&mut self) -> MangleResult<()> {
        let increment = i16::from(self.rng.random_range(1..=self.config.max_incr.max(1)));
        let increment = if self.rng.random_bool(0.5) {
            -increment
        } else {
            increment
        };

        let offset = self.offset(1)?;
        let value = (i16::from(self.data[offset]) + increment).clamp(0, 255);
        self.data[offset] = value as u8;
        Ok(())
    }

    pub fn mangle_insert_bytes(&mut self) -> MangleResult<()> {
        let offset = self.offset(1)?;
        let count = self.rng.random_range(1..=self.config.max_insert_bytes.max(1));
        let inserted: Vec<u8> = (0..count).map(|_| self.generate_byte()).collect();
        self.data.splice(offset..offset, inserted);
        Ok(())
    }

    pub fn mangle_delete_bytes(&mut self) -> MangleResult<()> {
        let offset = self.offset(2)?;
        let count = self.rng.random_range(1..=self.config.max_delete_bytes.max(1));
        let count = count.min(self.data.len() - offset);
        self.data.drain(offset..offset + count);
        Ok(())
    }

    pub fn apply(&mut self, operation: MangleOp) -> MangleResult<()> {
        match operation {
            MangleOp::Replace => self.mangle_replace(),
            MangleOp::Bit => self.mangle_bit(),
            MangleOp::SpecialValue => self.mangle_special_value(),
            MangleOp::Increment => self.mangle_increment(),
            MangleOp::InsertBytes => self.mangle_insert_bytes(),
            MangleOp::DeleteBytes => self.mangle_delete_bytes(),
        }
    }

    /// Mangles the buffer and returns the number of applied operations.
    pub fn run(&mut self) -> MangleResult<usize> {
        let operations = self.config.active_operations();

        if self.config.max_op == 0 {
            return Ok(0);
        }

        let min_op = self.config.min_op.min(self.config.max_op);
        let count = self.rng.random_range(min_op..=self.config.max_op);
        for _ in 0..count {
            let Some(operation) = operations.choose(&mut *self.rng).copied() else {
                break;
            };
            self.apply(operation)?;
        }

        Ok(count)
    }
}
