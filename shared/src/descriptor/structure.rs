use std::collections::HashMap;

use super::{error::DescriptorError, field::FieldDescriptor};

/// Ordered set of field descriptors, indexed by uid and by dense index
#[derive(Clone, Debug, Default)]
pub struct StructDescriptor {
    fields: Vec<FieldDescriptor>,
    uids: HashMap<u16, usize>,
}

impl StructDescriptor {
    pub fn new(fields: impl IntoIterator<Item = FieldDescriptor>) -> Result<Self, DescriptorError> {
        let mut output = Self::default();
        for field in fields {
            output.add_field(field)?;
        }
        Ok(output)
    }

    /// Adds a field and assigns its dense index
    pub fn add_field(&mut self, mut field: FieldDescriptor) -> Result<usize, DescriptorError> {
        if self.uids.contains_key(&field.uid()) {
            return Err(DescriptorError::DuplicateFieldUid {
                name: field.name().to_string(),
                uid: field.uid(),
            });
        }
        let index = self.fields.len();
        field.set_index(index);
        self.uids.insert(field.uid(), index);
        self.fields.push(field);
        Ok(index)
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_by_uid(&self, uid: u16) -> Option<&FieldDescriptor> {
        self.uids.get(&uid).map(|index| &self.fields[*index])
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name() == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether `field` is the descriptor stored at its index in this struct
    pub fn contains(&self, field: &FieldDescriptor) -> bool {
        self.fields.get(field.index()) == Some(field)
    }
}
