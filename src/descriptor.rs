//! Row descriptors
//!
//! A [`RowDescriptor`] is the ordered column metadata of a result row or a
//! parameter row. Once all columns are known it is compiled into the two
//! artifacts the wire protocol needs: the row-shape bytecode (BLR) sent to the
//! server, and the per-column wire length table that drives row decoding.

use bytes::Bytes;

use crate::constants::{blr, sql_type};
use crate::error::{Error, Result};

/// Metadata of one column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// SQL type code; the low bit flags a nullable column
    pub sql_type: i32,
    /// Type-specific subtype (blob subtype, numeric/decimal marker)
    pub sub_type: i32,
    /// Power-of-ten exponent, stored negated (-2 means two decimal places)
    pub scale: i32,
    /// Length in bytes
    pub length: i32,
    /// Column name
    pub field_name: String,
    /// Table name
    pub relation_name: String,
    /// Table owner
    pub owner_name: String,
    /// Column alias
    pub alias_name: String,
}

impl FieldDescriptor {
    /// Create a descriptor for a type and length
    pub fn new(sql_type: i32, length: i32) -> Self {
        Self {
            sql_type,
            length,
            ..Default::default()
        }
    }

    /// Set the scale
    pub fn with_scale(mut self, scale: i32) -> Self {
        self.scale = scale;
        self
    }

    /// Set the field name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    /// Type code with the nullable flag cleared
    #[inline]
    pub fn base_type(&self) -> i32 {
        self.sql_type & !1
    }

    /// Whether the column accepts NULL
    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.sql_type & 1 == 1
    }

    /// Wire length of a value of this column.
    ///
    /// Positive values are `length + 1` for fixed text, zero marks a
    /// length-prefixed varying value, negative values are fixed widths.
    pub fn io_length(&self) -> Result<i32> {
        match self.base_type() {
            sql_type::TEXT => Ok(self.length + 1),
            sql_type::VARYING => Ok(0),
            sql_type::SHORT
            | sql_type::LONG
            | sql_type::FLOAT
            | sql_type::TYPE_TIME
            | sql_type::TYPE_DATE => Ok(-4),
            sql_type::DOUBLE
            | sql_type::D_FLOAT
            | sql_type::TIMESTAMP
            | sql_type::BLOB
            | sql_type::ARRAY
            | sql_type::QUAD
            | sql_type::INT64 => Ok(-8),
            other => Err(Error::InfoBuffer(format!("unsupported SQL type {}", other))),
        }
    }

    fn append_blr(&self, out: &mut Vec<u8>) -> Result<()> {
        let len = self.length as u16;
        let scale = self.scale as i8 as u8;
        match self.base_type() {
            sql_type::VARYING => out.extend_from_slice(&[blr::VARYING, len as u8, (len >> 8) as u8]),
            sql_type::TEXT => out.extend_from_slice(&[blr::TEXT, len as u8, (len >> 8) as u8]),
            sql_type::DOUBLE => out.push(blr::DOUBLE),
            sql_type::FLOAT => out.push(blr::FLOAT),
            sql_type::D_FLOAT => out.push(blr::D_FLOAT),
            sql_type::TYPE_DATE => out.push(blr::SQL_DATE),
            sql_type::TYPE_TIME => out.push(blr::SQL_TIME),
            sql_type::TIMESTAMP => out.push(blr::TIMESTAMP),
            sql_type::BLOB | sql_type::ARRAY => out.extend_from_slice(&[blr::QUAD, 0]),
            sql_type::LONG => out.extend_from_slice(&[blr::LONG, scale]),
            sql_type::SHORT => out.extend_from_slice(&[blr::SHORT, scale]),
            sql_type::INT64 => out.extend_from_slice(&[blr::INT64, scale]),
            sql_type::QUAD => out.extend_from_slice(&[blr::QUAD, scale]),
            other => {
                return Err(Error::InfoBuffer(format!("unsupported SQL type {}", other)));
            }
        }
        // null indicator
        out.extend_from_slice(&[blr::SHORT, 0]);
        Ok(())
    }

    /// Display name: the alias when present, else the field name
    pub fn name(&self) -> &str {
        if self.alias_name.is_empty() {
            &self.field_name
        } else {
            &self.alias_name
        }
    }
}

/// Ordered column metadata with its compiled row shape
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowDescriptor {
    columns: Vec<FieldDescriptor>,
    blr: Bytes,
    io_lengths: Vec<i32>,
}

impl RowDescriptor {
    /// Create an empty descriptor
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and compile a descriptor from known columns
    pub fn from_columns(columns: Vec<FieldDescriptor>) -> Result<Self> {
        let mut descriptor = Self {
            columns,
            ..Default::default()
        };
        descriptor.compile()?;
        Ok(descriptor)
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if the descriptor has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// All columns in order
    pub fn columns(&self) -> &[FieldDescriptor] {
        &self.columns
    }

    /// Column by zero-based index
    pub fn column(&self, index: usize) -> Option<&FieldDescriptor> {
        self.columns.get(index)
    }

    /// Compiled row-shape bytecode
    pub fn blr(&self) -> &[u8] {
        &self.blr
    }

    /// Per-column wire lengths
    pub fn io_lengths(&self) -> &[i32] {
        &self.io_lengths
    }

    pub(crate) fn resize(&mut self, count: usize) {
        self.columns.resize_with(count, FieldDescriptor::default);
    }

    pub(crate) fn column_mut(&mut self, index: usize) -> Option<&mut FieldDescriptor> {
        self.columns.get_mut(index)
    }

    /// Compile the row-shape bytecode and the wire length table
    pub fn compile(&mut self) -> Result<()> {
        let par_count = self.columns.len() * 2;
        if par_count > u16::MAX as usize {
            return Err(Error::InfoBuffer(format!("{} columns", self.columns.len())));
        }

        let mut out = Vec::with_capacity(8 + self.columns.len() * 5);
        out.extend_from_slice(&[
            blr::VERSION5,
            blr::BEGIN,
            blr::MESSAGE,
            0,
            (par_count & 0xff) as u8,
            (par_count >> 8) as u8,
        ]);
        let mut io_lengths = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            column.append_blr(&mut out)?;
            io_lengths.push(column.io_length()?);
        }
        out.extend_from_slice(&[blr::END, blr::EOC]);

        self.blr = Bytes::from(out);
        self.io_lengths = io_lengths;
        Ok(())
    }
}
