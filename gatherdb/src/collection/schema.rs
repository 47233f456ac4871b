//! Column types, values and the schema descriptor of a collection.
//!
//! A collection's schema is an ordered list of [`ColumnDef`]s resolved once
//! at open. Each definition picks the gather kind behind the column; see
//! [`ColumnDef::storage_kind`].

#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use serde::{Deserialize, Serialize};

use crate::collection::CollectionError;
use crate::storage::{AVL_BLOCK_HEADER_SIZE, SIZE_BLOCK_HEADER_SIZE};

/// Longest sized text kept inline in a tree column. Longer (or unsized)
/// text goes to a text gather and cannot be compared.
pub const INLINE_TEXT_LIMIT: usize = 200;

/// Name of the metadata side file in a collection directory.
pub const METADATA_FILE: &str = "collection.json";

// =============================================================================
// Column types
// =============================================================================

/// Type tag of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Text,
}

impl ColumnType {
    /// Encoded width of fixed-width types.
    #[must_use]
    pub const fn width(self) -> Option<usize> {
        match self {
            Self::Bool | Self::I8 | Self::U8 => Some(1),
            Self::I16 | Self::U16 => Some(2),
            Self::I32 | Self::U32 | Self::F32 => Some(4),
            Self::I64 | Self::U64 | Self::F64 => Some(8),
            Self::Text => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Text => "text",
        }
    }

    /// Parse a query literal as a value of this type.
    pub fn parse_literal(self, literal: &str) -> Result<Value, CollectionError> {
        let invalid = || CollectionError::InvalidLiteral {
            column_type: self,
            literal: literal.to_string(),
        };
        let trimmed = literal.trim();
        let value = match self {
            Self::Bool => Value::Bool(trimmed.parse().map_err(|_| invalid())?),
            Self::I8 => Value::I8(trimmed.parse().map_err(|_| invalid())?),
            Self::U8 => Value::U8(trimmed.parse().map_err(|_| invalid())?),
            Self::I16 => Value::I16(trimmed.parse().map_err(|_| invalid())?),
            Self::U16 => Value::U16(trimmed.parse().map_err(|_| invalid())?),
            Self::I32 => Value::I32(trimmed.parse().map_err(|_| invalid())?),
            Self::U32 => Value::U32(trimmed.parse().map_err(|_| invalid())?),
            Self::I64 => Value::I64(trimmed.parse().map_err(|_| invalid())?),
            Self::U64 => Value::U64(trimmed.parse().map_err(|_| invalid())?),
            Self::F32 => Value::F32(trimmed.parse().map_err(|_| invalid())?),
            Self::F64 => Value::F64(trimmed.parse().map_err(|_| invalid())?),
            Self::Text => Value::Text(literal.to_string()),
        };
        Ok(value)
    }

    /// Convert `value` to this type. Integers convert when they fit, any
    /// number converts to a float; text and booleans only match themselves.
    #[must_use]
    pub fn coerce(self, value: &Value) -> Option<Value> {
        if value.column_type() == self {
            return Some(value.clone());
        }
        match self {
            Self::Bool | Self::Text => None,
            Self::F32 => value.as_f64().map(|v| Value::F32(v as f32)),
            Self::F64 => value.as_f64().map(Value::F64),
            Self::I8 => value.as_i128().and_then(|v| i8::try_from(v).ok()).map(Value::I8),
            Self::U8 => value.as_i128().and_then(|v| u8::try_from(v).ok()).map(Value::U8),
            Self::I16 => value.as_i128().and_then(|v| i16::try_from(v).ok()).map(Value::I16),
            Self::U16 => value.as_i128().and_then(|v| u16::try_from(v).ok()).map(Value::U16),
            Self::I32 => value.as_i128().and_then(|v| i32::try_from(v).ok()).map(Value::I32),
            Self::U32 => value.as_i128().and_then(|v| u32::try_from(v).ok()).map(Value::U32),
            Self::I64 => value.as_i128().and_then(|v| i64::try_from(v).ok()).map(Value::I64),
            Self::U64 => value.as_i128().and_then(|v| u64::try_from(v).ok()).map(Value::U64),
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let column_type = match s.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Self::Bool,
            "i8" | "sbyte" => Self::I8,
            "u8" | "byte" => Self::U8,
            "i16" | "short" => Self::I16,
            "u16" | "ushort" => Self::U16,
            "i32" | "int" => Self::I32,
            "u32" | "uint" => Self::U32,
            "i64" | "long" => Self::I64,
            "u64" | "ulong" => Self::U64,
            "f32" | "float" => Self::F32,
            "f64" | "double" => Self::F64,
            "text" | "string" => Self::Text,
            other => return Err(format!("unknown column type '{other}'")),
        };
        Ok(column_type)
    }
}

// =============================================================================
// Values
// =============================================================================

/// A single column value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Text(String),
}

impl Value {
    #[must_use]
    pub const fn column_type(&self) -> ColumnType {
        match self {
            Self::Bool(_) => ColumnType::Bool,
            Self::I8(_) => ColumnType::I8,
            Self::U8(_) => ColumnType::U8,
            Self::I16(_) => ColumnType::I16,
            Self::U16(_) => ColumnType::U16,
            Self::I32(_) => ColumnType::I32,
            Self::U32(_) => ColumnType::U32,
            Self::I64(_) => ColumnType::I64,
            Self::U64(_) => ColumnType::U64,
            Self::F32(_) => ColumnType::F32,
            Self::F64(_) => ColumnType::F64,
            Self::Text(_) => ColumnType::Text,
        }
    }

    /// Integer payload widened to `i128`.
    #[must_use]
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Self::I8(v) => Some(v.into()),
            Self::U8(v) => Some(v.into()),
            Self::I16(v) => Some(v.into()),
            Self::U16(v) => Some(v.into()),
            Self::I32(v) => Some(v.into()),
            Self::U32(v) => Some(v.into()),
            Self::I64(v) => Some(v.into()),
            Self::U64(v) => Some(v.into()),
            _ => None,
        }
    }

    /// Any numeric payload as `f64`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::F32(v) => Some(v.into()),
            Self::F64(v) => Some(v),
            _ => self.as_i128().map(|v| v as f64),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::U8(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),*) => {$(
        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Self::$variant(value)
            }
        }
    )*};
}

value_from!(
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => Text
);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

// =============================================================================
// Column definitions
// =============================================================================

/// Which gather backs a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Tree column with blocks of `capacity` bytes; supports range queries.
    Ordered { capacity: u32 },
    /// Pointer column plus a blob file with blocks of `blob_capacity` bytes.
    Text { blob_capacity: u32 },
}

/// Definition of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Longest accepted text, in bytes. `0` means unbounded. Ignored for
    /// fixed-width types.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub size: usize,
    /// Request that this column becomes the key.
    #[serde(default, skip_serializing)]
    pub key: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(size: &usize) -> bool {
    *size == 0
}

impl ColumnDef {
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            size: 0,
            key: false,
        }
    }

    #[must_use]
    pub const fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub const fn as_key(mut self) -> Self {
        self.key = true;
        self
    }

    /// Gather kind and block capacity for this column.
    ///
    /// - Fixed-width types: tree column, capacity `width + 30`.
    /// - Text of size `1..=200`: tree column over strings, capacity `size + 30`.
    /// - Text of size above 200: text column with blob blocks of `size + 12`.
    /// - Unsized text: text column with blob blocks of `text_block_size`.
    #[must_use]
    pub const fn storage_kind(&self, text_block_size: u32) -> StorageKind {
        match self.column_type.width() {
            Some(width) => StorageKind::Ordered {
                capacity: (width + AVL_BLOCK_HEADER_SIZE) as u32,
            },
            None if self.size == 0 => StorageKind::Text {
                blob_capacity: text_block_size,
            },
            None if self.size > INLINE_TEXT_LIMIT => StorageKind::Text {
                blob_capacity: (self.size + SIZE_BLOCK_HEADER_SIZE) as u32,
            },
            None => StorageKind::Ordered {
                capacity: (self.size + AVL_BLOCK_HEADER_SIZE) as u32,
            },
        }
    }

    /// Whether range queries can run against this column.
    #[must_use]
    pub const fn is_orderable(&self) -> bool {
        matches!(self.storage_kind(0), StorageKind::Ordered { .. })
    }
}

/// Contents of the metadata side file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub key: Option<String>,
    pub columns: Vec<ColumnDef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_kind_rules() {
        let age = ColumnDef::new("Age", ColumnType::I32);
        assert_eq!(age.storage_kind(4096), StorageKind::Ordered { capacity: 34 });

        let note = ColumnDef::new("Note", ColumnType::Text);
        assert_eq!(note.storage_kind(4096), StorageKind::Text { blob_capacity: 4096 });
        assert!(!note.is_orderable());

        let name = ColumnDef::new("Name", ColumnType::Text).with_size(20);
        assert_eq!(name.storage_kind(4096), StorageKind::Ordered { capacity: 50 });
        assert!(name.is_orderable());

        let bio = ColumnDef::new("Bio", ColumnType::Text).with_size(500);
        assert_eq!(bio.storage_kind(4096), StorageKind::Text { blob_capacity: 512 });

        let edge = ColumnDef::new("Edge", ColumnType::Text).with_size(INLINE_TEXT_LIMIT);
        assert!(edge.is_orderable());
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(ColumnType::I32.parse_literal("42").expect("i32"), Value::I32(42));
        assert_eq!(ColumnType::F64.parse_literal("2.5").expect("f64"), Value::F64(2.5));
        assert_eq!(ColumnType::Bool.parse_literal("true").expect("bool"), Value::Bool(true));
        assert_eq!(
            ColumnType::Text.parse_literal("Bob Smith").expect("text"),
            Value::Text("Bob Smith".to_string())
        );
        assert!(matches!(
            ColumnType::U8.parse_literal("300"),
            Err(CollectionError::InvalidLiteral { column_type: ColumnType::U8, .. })
        ));
        assert!(ColumnType::I64.parse_literal("ten").is_err());
    }

    #[test]
    fn test_coerce_numbers() {
        assert_eq!(ColumnType::I32.coerce(&Value::I64(7)), Some(Value::I32(7)));
        assert_eq!(ColumnType::U8.coerce(&Value::I64(-1)), None);
        assert_eq!(ColumnType::F64.coerce(&Value::U16(3)), Some(Value::F64(3.0)));
        assert_eq!(ColumnType::I32.coerce(&Value::F64(1.0)), None);
        assert_eq!(ColumnType::Text.coerce(&Value::I32(1)), None);
        assert_eq!(
            ColumnType::Text.coerce(&Value::from("x")),
            Some(Value::Text("x".to_string()))
        );
    }

    #[test]
    fn test_metadata_json_shape() {
        let metadata = CollectionMetadata {
            key: Some("Id".to_string()),
            columns: vec![
                ColumnDef::new("Id", ColumnType::I64).as_key(),
                ColumnDef::new("Name", ColumnType::Text).with_size(32),
            ],
        };
        let json = serde_json::to_string(&metadata).expect("serialize");
        assert_eq!(
            json,
            r#"{"key":"Id","columns":[{"name":"Id","type":"i64"},{"name":"Name","type":"text","size":32}]}"#
        );

        let back: CollectionMetadata = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.columns[1].size, 32);
        assert!(!back.columns[0].key);
    }

    #[test]
    fn test_column_type_from_str() {
        assert_eq!("int".parse::<ColumnType>(), Ok(ColumnType::I32));
        assert_eq!("Text".parse::<ColumnType>(), Ok(ColumnType::Text));
        assert!("decimal".parse::<ColumnType>().is_err());
    }
}
