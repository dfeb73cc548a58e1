use crate::{
    foundation::core::Bounds3,
    scene::{
        camera::Camera,
        entity::{Entity, EntityId},
    },
};

/// Everything the off-screen renderer draws: one camera slot and a set of entities.
///
/// The camera is not an entity, so clearing the entity set never removes it.
#[derive(Clone, Debug, Default)]
pub struct Stage {
    camera: Camera,
    entities: Vec<Entity>,
}

impl Stage {
    /// Stage with `camera` and no entities.
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            entities: Vec::new(),
        }
    }

    /// The camera.
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Mutable camera.
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Insert `entity`, replacing one with the same id.
    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        let id = entity.id();
        match self.entities.iter_mut().find(|e| e.id() == id) {
            Some(slot) => *slot = entity,
            None => self.entities.push(entity),
        }
        id
    }

    /// Remove and return an entity.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let pos = self.entities.iter().position(|e| e.id() == id)?;
        Some(self.entities.remove(pos))
    }

    /// Drop every entity; the camera stays.
    pub fn remove_all_entities(&mut self) {
        self.entities.clear();
    }

    /// Entity by id.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id() == id)
    }

    /// Mutable entity by id.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id() == id)
    }

    /// Entities in insertion order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Union of the visual bounds of enabled entities.
    pub fn visual_bounds(&self) -> Option<Bounds3> {
        self.entities
            .iter()
            .filter_map(Entity::visual_bounds)
            .fold(None, Bounds3::merge)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/stage.rs"]
mod tests;
