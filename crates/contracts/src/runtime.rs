//! Runtime actor records reported by the simulator

/// CARLA actor handle type
pub type ActorId = u32;

/// Actor as reported by the simulator: id plus type id
/// (e.g. `vehicle.tesla.model3`, `sensor.camera.rgb`, `spectator`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorRecord {
    pub id: ActorId,
    pub type_id: String,
}

impl ActorRecord {
    pub fn new(id: ActorId, type_id: impl Into<String>) -> Self {
        Self {
            id,
            type_id: type_id.into(),
        }
    }
}
