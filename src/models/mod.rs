pub mod curriculum;
pub mod entry;
pub mod metadata;
pub mod structure;

pub use curriculum::{CourseInfo, CourseSelection, PortfolioKey};
pub use entry::Entry;
pub use metadata::{MetadataPatch, PortfolioMetadata};
pub use structure::{
    NewStructureRequest, StructureRecord, StructureType, UpdateStructureRequest, STARTER_TITLE,
};
