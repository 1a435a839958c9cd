// ABOUTME: Source of locally generated identifiers.
// ABOUTME: Director, installation, and record ids all come from a UuidGenerator.

/// Generates unique identifiers for state records.
pub trait UuidGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random (v4) UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomUuidGenerator;

impl UuidGenerator for RandomUuidGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
