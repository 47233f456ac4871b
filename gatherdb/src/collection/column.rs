//! Type-erased column stores.
//!
//! A collection holds columns of different value types side by side, so it
//! talks to each gather through [`ColumnStore`], which speaks [`Value`].

use std::path::Path;

use crate::collection::CollectionError;
use crate::collection::schema::{ColumnDef, ColumnType, StorageKind, Value};
use crate::storage::{
    AvlGather, Comparison, Gather, GatherError, RowId, StoredValue, TextGather, gather_path,
};

/// One column's gather behind a value-typed interface.
pub trait ColumnStore: Send + std::fmt::Debug {
    fn column_type(&self) -> ColumnType;

    /// Whether [`ColumnStore::range`] is supported.
    fn is_orderable(&self) -> bool;

    fn insert(&mut self, value: &Value, id: Option<RowId>) -> Result<RowId, CollectionError>;

    fn get(&mut self, id: RowId) -> Result<Option<Value>, CollectionError>;

    fn update(&mut self, id: RowId, value: &Value) -> Result<(), CollectionError>;

    fn delete(&mut self, id: RowId) -> Result<bool, GatherError>;

    fn contains(&self, id: RowId) -> bool;

    /// Rows satisfying `comparison` against `operand`, in value order.
    fn range(&mut self, comparison: Comparison, operand: &Value) -> Result<Vec<(RowId, Value)>, CollectionError>;

    /// Every row, in value order for ordered columns and id order otherwise.
    fn all(&mut self) -> Result<Vec<(RowId, Value)>, CollectionError>;

    fn flush(&mut self) -> Result<(), GatherError>;

    fn dispose(&mut self) -> Result<(), GatherError>;

    fn destroy(self: Box<Self>) -> Result<(), GatherError>;
}

/// Conversion between a stored type and [`Value`].
pub trait ColumnValue: StoredValue + std::fmt::Debug {
    const TYPE: ColumnType;

    fn from_value(value: &Value) -> Option<Self>;

    fn into_value(self) -> Value;
}

macro_rules! column_value {
    ($($ty:ty => $variant:ident),*) => {$(
        impl ColumnValue for $ty {
            const TYPE: ColumnType = ColumnType::$variant;

            #[allow(clippy::clone_on_copy)]
            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    )*};
}

column_value!(
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

fn typed<T: ColumnValue>(value: &Value) -> Result<T, CollectionError> {
    T::from_value(value).ok_or_else(|| CollectionError::TypeMismatch {
        column: String::new(),
        expected: T::TYPE,
        found: value.column_type(),
    })
}

fn into_values<T: ColumnValue>(rows: Vec<(RowId, T)>) -> Vec<(RowId, Value)> {
    rows.into_iter().map(|(id, v)| (id, v.into_value())).collect()
}

impl<T: ColumnValue> ColumnStore for AvlGather<T> {
    fn column_type(&self) -> ColumnType {
        T::TYPE
    }

    fn is_orderable(&self) -> bool {
        true
    }

    fn insert(&mut self, value: &Value, id: Option<RowId>) -> Result<RowId, CollectionError> {
        Ok(self.add(&typed::<T>(value)?, id)?)
    }

    fn get(&mut self, id: RowId) -> Result<Option<Value>, CollectionError> {
        Ok(Gather::get(self, id)?.map(ColumnValue::into_value))
    }

    fn update(&mut self, id: RowId, value: &Value) -> Result<(), CollectionError> {
        Ok(Gather::update(self, id, &typed::<T>(value)?)?)
    }

    fn delete(&mut self, id: RowId) -> Result<bool, GatherError> {
        Gather::delete(self, id)
    }

    fn contains(&self, id: RowId) -> bool {
        Gather::contains(self, id)
    }

    fn range(&mut self, comparison: Comparison, operand: &Value) -> Result<Vec<(RowId, Value)>, CollectionError> {
        let operand = typed::<T>(operand)?;
        Ok(into_values(AvlGather::range(self, comparison, &operand)?))
    }

    fn all(&mut self) -> Result<Vec<(RowId, Value)>, CollectionError> {
        Ok(into_values(AvlGather::all(self)?))
    }

    fn flush(&mut self) -> Result<(), GatherError> {
        Gather::flush(self)
    }

    fn dispose(&mut self) -> Result<(), GatherError> {
        Gather::dispose(self)
    }

    fn destroy(self: Box<Self>) -> Result<(), GatherError> {
        Gather::destroy(*self)
    }
}

impl ColumnStore for TextGather {
    fn column_type(&self) -> ColumnType {
        ColumnType::Text
    }

    fn is_orderable(&self) -> bool {
        false
    }

    fn insert(&mut self, value: &Value, id: Option<RowId>) -> Result<RowId, CollectionError> {
        Ok(self.add(&typed::<String>(value)?, id)?)
    }

    fn get(&mut self, id: RowId) -> Result<Option<Value>, CollectionError> {
        Ok(Gather::get(self, id)?.map(Value::Text))
    }

    fn update(&mut self, id: RowId, value: &Value) -> Result<(), CollectionError> {
        Ok(Gather::update(self, id, &typed::<String>(value)?)?)
    }

    fn delete(&mut self, id: RowId) -> Result<bool, GatherError> {
        Gather::delete(self, id)
    }

    fn contains(&self, id: RowId) -> bool {
        Gather::contains(self, id)
    }

    fn range(&mut self, _comparison: Comparison, _operand: &Value) -> Result<Vec<(RowId, Value)>, CollectionError> {
        Err(CollectionError::NotOrderable(String::new()))
    }

    fn all(&mut self) -> Result<Vec<(RowId, Value)>, CollectionError> {
        let mut rows = Vec::new();
        for id in self.ids() {
            if let Some(text) = Gather::get(self, id)? {
                rows.push((id, Value::Text(text)));
            }
        }
        Ok(rows)
    }

    fn flush(&mut self) -> Result<(), GatherError> {
        Gather::flush(self)
    }

    fn dispose(&mut self) -> Result<(), GatherError> {
        Gather::dispose(self)
    }

    fn destroy(self: Box<Self>) -> Result<(), GatherError> {
        Gather::destroy(*self)
    }
}

fn open_ordered<T: ColumnValue>(directory: &Path, name: &str, capacity: u32) -> Result<Box<dyn ColumnStore>, GatherError> {
    Ok(Box::new(AvlGather::<T>::open(&gather_path(directory, name), capacity)?))
}

/// Open (or create) the gather files backing `def` in `directory`.
pub fn open_store(
    directory: &Path,
    def: &ColumnDef,
    text_block_size: u32,
) -> Result<Box<dyn ColumnStore>, GatherError> {
    let name = def.name.as_str();
    match def.storage_kind(text_block_size) {
        StorageKind::Text { blob_capacity } => Ok(Box::new(TextGather::open(directory, name, blob_capacity)?)),
        StorageKind::Ordered { capacity } => match def.column_type {
            ColumnType::Bool => open_ordered::<bool>(directory, name, capacity),
            ColumnType::I8 => open_ordered::<i8>(directory, name, capacity),
            ColumnType::U8 => open_ordered::<u8>(directory, name, capacity),
            ColumnType::I16 => open_ordered::<i16>(directory, name, capacity),
            ColumnType::U16 => open_ordered::<u16>(directory, name, capacity),
            ColumnType::I32 => open_ordered::<i32>(directory, name, capacity),
            ColumnType::U32 => open_ordered::<u32>(directory, name, capacity),
            ColumnType::I64 => open_ordered::<i64>(directory, name, capacity),
            ColumnType::U64 => open_ordered::<u64>(directory, name, capacity),
            ColumnType::F32 => open_ordered::<f32>(directory, name, capacity),
            ColumnType::F64 => open_ordered::<f64>(directory, name, capacity),
            ColumnType::Text => open_ordered::<String>(directory, name, capacity),
        },
    }
}
