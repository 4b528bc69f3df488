// Field mapper - renames record keys according to a task's map

use crate::errors::MappingError;
use crate::models::{FieldMap, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What to do when a record lacks a field named as a mapping key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFieldPolicy {
    /// Emit the target field with a null value
    #[default]
    Null,
    /// Leave the target field out of the record
    Omit,
    /// Fail the mapping stage for the whole task
    Error,
}

/// FieldMapper applies a task's field mapping to extracted records
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldMapper {
    policy: MissingFieldPolicy,
}

impl FieldMapper {
    pub fn new(policy: MissingFieldPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MissingFieldPolicy {
        self.policy
    }

    /// Remap every record, preserving order and count.
    ///
    /// Without a mapping the records are returned untouched. With a mapping,
    /// each output record holds only the mapped fields under their target names.
    pub fn remap(
        &self,
        mapping: Option<&FieldMap>,
        records: Vec<Record>,
    ) -> Result<Vec<Record>, MappingError> {
        let Some(mapping) = mapping else {
            return Ok(records);
        };

        records
            .iter()
            .enumerate()
            .map(|(index, record)| self.remap_record(mapping, index, record))
            .collect()
    }

    fn remap_record(
        &self,
        mapping: &FieldMap,
        index: usize,
        record: &Record,
    ) -> Result<Record, MappingError> {
        let mut mapped = Record::new();

        for (source, target) in mapping {
            match record.get(source) {
                Some(value) => {
                    mapped.insert(target.clone(), value.clone());
                }
                None => match self.policy {
                    MissingFieldPolicy::Null => {
                        mapped.insert(target.clone(), Value::Null);
                    }
                    MissingFieldPolicy::Omit => {}
                    MissingFieldPolicy::Error => {
                        return Err(MappingError::MissingField {
                            index,
                            field: source.clone(),
                        });
                    }
                },
            }
        }

        Ok(mapped)
    }
}
