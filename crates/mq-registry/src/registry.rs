// registry.rs — Static table of moderatable entity types.
//
// Each integrating module contributes its descriptors to a RegistryBuilder at
// startup; `build()` checks that every relation points at a registered type
// and freezes the table. Nothing is discovered at runtime.

use std::collections::BTreeMap;
use std::sync::Arc;

use mq_changeset::EntityTypeDescriptor;

use crate::error::RegistryError;

/// A relation field on some type that points at another type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Referrer {
    pub entity_type: String,
    pub field: String,
}

/// Collects descriptors before the registry is frozen.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    types: BTreeMap<String, Arc<EntityTypeDescriptor>>,
}

impl RegistryBuilder {
    /// Register one type. Fails if the name is already taken.
    pub fn register(mut self, descriptor: EntityTypeDescriptor) -> Result<Self, RegistryError> {
        if self.types.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateType(descriptor.name));
        }
        self.types
            .insert(descriptor.name.clone(), Arc::new(descriptor));
        Ok(self)
    }

    /// Register several types at once.
    pub fn register_all(
        self,
        descriptors: impl IntoIterator<Item = EntityTypeDescriptor>,
    ) -> Result<Self, RegistryError> {
        descriptors
            .into_iter()
            .try_fold(self, |builder, descriptor| builder.register(descriptor))
    }

    /// Freeze the table, checking relation targets.
    pub fn build(self) -> Result<EntityRegistry, RegistryError> {
        for descriptor in self.types.values() {
            let tag_fields = descriptor
                .fields
                .iter()
                .filter(|field| field.kind == mq_changeset::FieldKind::TagList)
                .count();
            if tag_fields > 1 {
                return Err(RegistryError::MultipleTagFields {
                    entity_type: descriptor.name.clone(),
                });
            }
            for field in &descriptor.fields {
                let target = match &field.kind {
                    mq_changeset::FieldKind::Relation { target }
                    | mq_changeset::FieldKind::ManyRelation { target } => target,
                    _ => continue,
                };
                if !self.types.contains_key(target) {
                    return Err(RegistryError::UnknownRelationTarget {
                        entity_type: descriptor.name.clone(),
                        field: field.name.clone(),
                        target: target.clone(),
                    });
                }
            }
        }
        Ok(EntityRegistry { types: self.types })
    }
}

/// Immutable registry of entity-type descriptors.
#[derive(Debug, Clone)]
pub struct EntityRegistry {
    types: BTreeMap<String, Arc<EntityTypeDescriptor>>,
}

impl EntityRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn descriptor(&self, entity_type: &str) -> Result<&EntityTypeDescriptor, RegistryError> {
        self.types
            .get(entity_type)
            .map(|d| d.as_ref())
            .ok_or_else(|| RegistryError::UnknownType(entity_type.to_string()))
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.types.contains_key(entity_type)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Every single-value relation field, across all types, that targets
    /// `entity_type`. Used for the reverse-reference (dependents) scan.
    pub fn referrers(&self, entity_type: &str) -> Vec<Referrer> {
        self.types
            .values()
            .flat_map(|descriptor| {
                descriptor
                    .relations_to(entity_type)
                    .map(move |field| Referrer {
                        entity_type: descriptor.name.clone(),
                        field: field.name.clone(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mq_changeset::FieldDescriptor;

    fn author() -> EntityTypeDescriptor {
        EntityTypeDescriptor::new("author").with_field(FieldDescriptor::scalar("name"))
    }

    fn book() -> EntityTypeDescriptor {
        EntityTypeDescriptor::new("book")
            .with_field(FieldDescriptor::scalar("title"))
            .with_field(FieldDescriptor::relation("author", "author"))
            .with_field(FieldDescriptor::relation("translator", "author").nullable().optional())
    }

    #[test]
    fn build_and_lookup() {
        let registry = EntityRegistry::builder()
            .register_all([author(), book()])
            .unwrap()
            .build()
            .unwrap();

        assert!(registry.descriptor("book").is_ok());
        assert!(matches!(
            registry.descriptor("film"),
            Err(RegistryError::UnknownType(_))
        ));
        let names: Vec<&str> = registry.type_names().collect();
        assert_eq!(names, vec!["author", "book"]);
    }

    #[test]
    fn second_tag_field_is_rejected() {
        let result = EntityRegistry::builder()
            .register(
                EntityTypeDescriptor::new("photo")
                    .with_field(FieldDescriptor::tags("tags"))
                    .with_field(FieldDescriptor::tags("keywords")),
            )
            .unwrap()
            .build();
        assert!(matches!(
            result,
            Err(RegistryError::MultipleTagFields { entity_type }) if entity_type == "photo"
        ));
    }

    #[test]
    fn duplicate_registration_fails() {
        let result = EntityRegistry::builder()
            .register(author())
            .unwrap()
            .register(author());
        assert!(matches!(result, Err(RegistryError::DuplicateType(_))));
    }

    #[test]
    fn dangling_relation_target_fails_build() {
        let result = EntityRegistry::builder().register(book()).unwrap().build();
        assert!(matches!(
            result,
            Err(RegistryError::UnknownRelationTarget { .. })
        ));
    }

    #[test]
    fn referrers_lists_relation_fields_pointing_at_type() {
        let registry = EntityRegistry::builder()
            .register_all([author(), book()])
            .unwrap()
            .build()
            .unwrap();

        let referrers = registry.referrers("author");
        assert_eq!(
            referrers,
            vec![
                Referrer {
                    entity_type: "book".to_string(),
                    field: "author".to_string()
                },
                Referrer {
                    entity_type: "book".to_string(),
                    field: "translator".to_string()
                },
            ]
        );
        assert!(registry.referrers("book").is_empty());
    }
}
