mod locator;

pub use locator::{ArtifactLocator, ArtifactReference, ARTIFACT_EXTENSION};
