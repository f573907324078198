//! Object model interface.
//!
//! The object model (FOM) declares object classes with their attributes and
//! interaction classes. Parsing FOM documents is left to an external loader;
//! this type is what the loader produces and what a federation execution
//! consumes. It is serde-deserializable so loaders can hand it over as data.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    error::RtiError,
    handle::{AttributeHandle, InteractionClassHandle, ObjectClassHandle},
};

/// Attribute implicitly declared by every object class. Its owner may delete
/// the instance.
pub const PRIVILEGE_TO_DELETE: AttributeHandle = AttributeHandle::new(0);

/// An object class and the attributes it declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectClassDef {
    /// Class name
    pub name: String,
    /// Declared attributes, excluding [`PRIVILEGE_TO_DELETE`]
    pub attributes: BTreeSet<AttributeHandle>,
}

/// Object and interaction classes known to a federation execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectModel {
    object_classes: BTreeMap<ObjectClassHandle, ObjectClassDef>,
    interaction_classes: BTreeMap<InteractionClassHandle, String>,
}

impl ObjectModel {
    /// Start building a model.
    pub fn builder() -> ObjectModelBuilder {
        ObjectModelBuilder::default()
    }

    /// Class definition. `None` if not declared.
    pub fn object_class(&self, class: ObjectClassHandle) -> Option<&ObjectClassDef> {
        self.object_classes.get(&class)
    }

    /// Attributes every instance of `class` carries, privilege-to-delete
    /// included.
    pub fn instance_attributes(
        &self,
        class: ObjectClassHandle,
    ) -> Result<BTreeSet<AttributeHandle>, RtiError> {
        let def = self.object_class(class).ok_or(RtiError::ObjectClassNotDefined(class))?;
        let mut attributes = def.attributes.clone();
        attributes.insert(PRIVILEGE_TO_DELETE);
        Ok(attributes)
    }

    /// Check that an interaction class is declared.
    pub fn require_interaction_class(&self, class: InteractionClassHandle) -> Result<(), RtiError> {
        if self.interaction_classes.contains_key(&class) {
            Ok(())
        } else {
            Err(RtiError::InteractionClassNotDefined(class))
        }
    }

    /// Interaction class name. `None` if not declared.
    pub fn interaction_class_name(&self, class: InteractionClassHandle) -> Option<&str> {
        self.interaction_classes.get(&class).map(String::as_str)
    }

    /// Declared object classes in handle order.
    pub fn object_classes(&self) -> impl Iterator<Item = (ObjectClassHandle, &ObjectClassDef)> {
        self.object_classes.iter().map(|(handle, def)| (*handle, def))
    }
}

/// Builder for [`ObjectModel`].
#[derive(Debug, Default)]
pub struct ObjectModelBuilder {
    model: ObjectModel,
}

impl ObjectModelBuilder {
    /// Declare an object class. Redeclaring a handle replaces it.
    pub fn object_class(
        mut self,
        class: ObjectClassHandle,
        name: impl Into<String>,
        attributes: impl IntoIterator<Item = AttributeHandle>,
    ) -> Self {
        let mut attributes: BTreeSet<_> = attributes.into_iter().collect();
        attributes.remove(&PRIVILEGE_TO_DELETE);
        self.model.object_classes.insert(class, ObjectClassDef { name: name.into(), attributes });
        self
    }

    /// Declare an interaction class.
    pub fn interaction_class(mut self, class: InteractionClassHandle, name: impl Into<String>) -> Self {
        self.model.interaction_classes.insert(class, name.into());
        self
    }

    /// Finish building.
    pub fn build(self) -> ObjectModel {
        self.model
    }
}
