//! Record Decoder.
//!
//! Turns one `;`-separated data line into a [`Record`]. Two line formats
//! exist:
//!
//! - modern: `$<id>;<logging timestamp>;<field>;...`, where `<id>` is looked
//!   up in the directory's mapping table;
//! - legacy: `<ignored>;<field>;...`, always an operation-execution record.

use std::sync::Arc;

use crate::error::DecodeError;
use crate::mapping::MappingTable;
use crate::record::Record;
use crate::registry::{RecordSchema, TypeRegistry, OPERATION_EXECUTION_RECORD};
use crate::value::FieldValue;

const FIELD_SEPARATOR: char = ';';

/// Field count of pre-1.6 operation-execution lines, which carry one extra
/// leading field after the timestamp.
const OLD_OPERATION_EXECUTION_LINE_FIELDS: usize = 11;

/// Decodes data lines against a mapping table and the record-type registry.
#[derive(Debug, Clone)]
pub struct RecordDecoder {
    registry: Arc<TypeRegistry>,
}

impl RecordDecoder {
    /// Creates a decoder resolving type names through `registry`.
    #[must_use]
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry }
    }

    /// Decodes one trimmed, non-empty line.
    ///
    /// # Errors
    ///
    /// - `DecodeError::UnknownType` if the id is missing from the mapping
    ///   table (reported as `$<id>`) or the mapped type is not registered;
    /// - `DecodeError::IllegalFormat` for a modern line without a timestamp
    ///   field or with a non-numeric id;
    /// - `DecodeError::FieldCount` / `DecodeError::FieldFormat` if the fields
    ///   do not match the record type's layout.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use tailmerge::{FieldType, MappingTable, RecordDecoder, RecordSchema, TypeRegistry};
    ///
    /// let mut registry = TypeRegistry::new();
    /// registry.register("legacy.Type", RecordSchema::new(vec![FieldType::String]));
    /// let mut mapping = MappingTable::new();
    /// mapping.insert(7, "legacy.Type");
    ///
    /// let decoder = RecordDecoder::new(Arc::new(registry));
    /// let record = decoder.decode("$7;100;foo", &mapping).unwrap();
    /// assert_eq!(&*record.type_name, "legacy.Type");
    /// assert_eq!(record.logging_timestamp, 100);
    /// ```
    pub fn decode(&self, line: &str, mapping: &MappingTable) -> Result<Record, DecodeError> {
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        match fields[0].strip_prefix('$') {
            Some(id) => self.decode_modern(line, id, &fields, mapping),
            None => self.decode_legacy(&fields),
        }
    }

    fn decode_modern(
        &self,
        line: &str,
        id: &str,
        fields: &[&str],
        mapping: &MappingTable,
    ) -> Result<Record, DecodeError> {
        if fields.len() < 2 {
            return Err(DecodeError::IllegalFormat { line: line.to_string() });
        }
        let id: u32 = id
            .parse()
            .map_err(|_| DecodeError::IllegalFormat { line: line.to_string() })?;
        let type_name = mapping
            .get(id)
            .ok_or_else(|| DecodeError::UnknownType {
                type_name: format!("${id}"),
            })?;
        let (name, schema) = self.resolve(type_name)?;

        let logging_timestamp: i64 = fields[1].parse().map_err(|_| DecodeError::FieldFormat {
            type_name: name.to_string(),
            index: 1,
            expected: "logging timestamp",
            value: fields[1].to_string(),
        })?;

        let skip = if fields.len() == OLD_OPERATION_EXECUTION_LINE_FIELDS && &*name == OPERATION_EXECUTION_RECORD {
            3
        } else {
            2
        };
        let values = decode_fields(&name, &schema, &fields[skip..])?;
        Ok(Record::new(name, logging_timestamp, values))
    }

    fn decode_legacy(&self, fields: &[&str]) -> Result<Record, DecodeError> {
        let (name, schema) = self.resolve(OPERATION_EXECUTION_RECORD)?;
        let values = decode_fields(&name, &schema, &fields[1..])?;
        let logging_timestamp = schema
            .default_timestamp_field
            .and_then(|i| values.get(i))
            .and_then(FieldValue::as_i64)
            .unwrap_or(Record::NO_TIMESTAMP);
        Ok(Record::new(name, logging_timestamp, values))
    }

    fn resolve(&self, type_name: &str) -> Result<(Arc<str>, Arc<RecordSchema>), DecodeError> {
        self.registry.resolve(type_name).ok_or_else(|| DecodeError::UnknownType {
            type_name: type_name.to_string(),
        })
    }
}

fn decode_fields(type_name: &str, schema: &RecordSchema, raw: &[&str]) -> Result<Vec<FieldValue>, DecodeError> {
    if raw.len() != schema.arity() {
        return Err(DecodeError::FieldCount {
            type_name: type_name.to_string(),
            expected: schema.arity(),
            actual: raw.len(),
        });
    }
    schema
        .fields
        .iter()
        .zip(raw)
        .enumerate()
        .map(|(index, (ty, text))| {
            ty.parse(text).ok_or_else(|| DecodeError::FieldFormat {
                type_name: type_name.to_string(),
                index,
                expected: ty.name(),
                value: (*text).to_string(),
            })
        })
        .collect()
}
