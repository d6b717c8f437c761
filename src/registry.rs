//! Record-type registry.
//!
//! Maps fully-qualified record type names (as found in mapping files) to the
//! field layout used to decode their text representation. A registry is built
//! explicitly by the caller and shared read-only with every directory reader
//! of one merge.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::value::FieldType;

/// Type name of the classic operation-execution record. Legacy lines always
/// decode to this type.
pub const OPERATION_EXECUTION_RECORD: &str = "kieker.common.record.controlflow.OperationExecutionRecord";

/// Type name of the extended operation-execution record carrying action,
/// user, thread, and success information.
pub const CUSTOM_OPERATION_EXECUTION_RECORD: &str = "org.oasp.module.monitoring.CustomOperationExecutionRecord";

/// Index of `tout` in both operation-execution layouts.
const TOUT_INDEX: usize = 4;

/// Field layout of one record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    /// Declared field types, in line order.
    pub fields: Vec<FieldType>,
    /// Field whose value becomes the logging timestamp when a line carries no
    /// explicit one (legacy lines).
    pub default_timestamp_field: Option<usize>,
}

impl RecordSchema {
    /// Creates a schema without a default timestamp field.
    #[must_use]
    pub fn new(fields: Vec<FieldType>) -> Self {
        Self {
            fields,
            default_timestamp_field: None,
        }
    }

    /// Uses the given field as the default logging timestamp.
    #[must_use]
    pub fn with_default_timestamp(mut self, index: usize) -> Self {
        self.default_timestamp_field = Some(index);
        self
    }

    /// Number of fields a line of this type must carry.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    /// Layout of [`OPERATION_EXECUTION_RECORD`].
    #[must_use]
    pub fn operation_execution() -> Self {
        Self::new(vec![
            FieldType::String, // operationSignature
            FieldType::String, // sessionId
            FieldType::Long,   // traceId
            FieldType::Long,   // tin
            FieldType::Long,   // tout
            FieldType::String, // hostname
            FieldType::Int,    // eoi
            FieldType::Int,    // ess
        ])
        .with_default_timestamp(TOUT_INDEX)
    }

    /// Layout of [`CUSTOM_OPERATION_EXECUTION_RECORD`].
    #[must_use]
    pub fn custom_operation_execution() -> Self {
        let mut schema = Self::operation_execution();
        schema.fields.extend([
            FieldType::String, // actionId
            FieldType::Long,   // userId
            FieldType::Long,   // threadId
            FieldType::Bool,   // success
        ]);
        schema
    }
}

/// Registry of known record types.
///
/// # Examples
///
/// ```
/// use tailmerge::{FieldType, RecordSchema, TypeRegistry};
///
/// let mut registry = TypeRegistry::with_builtin_types();
/// registry.register("com.example.Ping", RecordSchema::new(vec![FieldType::String]));
/// assert!(registry.contains("com.example.Ping"));
/// assert!(!registry.contains("com.example.Pong"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<Arc<str>, Arc<RecordSchema>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the operation-execution record types.
    #[must_use]
    pub fn with_builtin_types() -> Self {
        let mut registry = Self::new();
        registry.register(OPERATION_EXECUTION_RECORD, RecordSchema::operation_execution());
        registry.register(
            CUSTOM_OPERATION_EXECUTION_RECORD,
            RecordSchema::custom_operation_execution(),
        );
        registry
    }

    /// Registers (or replaces) a record type.
    pub fn register(&mut self, type_name: &str, schema: RecordSchema) {
        self.types.insert(Arc::from(type_name), Arc::new(schema));
    }

    /// Looks up a record type, returning its interned name and layout.
    #[must_use]
    pub fn resolve(&self, type_name: &str) -> Option<(Arc<str>, Arc<RecordSchema>)> {
        self.types
            .get_key_value(type_name)
            .map(|(name, schema)| (Arc::clone(name), Arc::clone(schema)))
    }

    /// Whether `type_name` has a registered schema.
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no type is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
