use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{metadata::ModelMetadata, spec::ModelSpec, Model, ModelState};

/// Architecture, annotations and trained parameters of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub spec: ModelSpec,
    #[serde(default)]
    pub metadata: ModelMetadata,
    pub state: ModelState,
}

impl Checkpoint {
    /// Captures the current parameters of `model`.
    pub fn capture(spec: ModelSpec, metadata: ModelMetadata, model: &mut dyn Model) -> Result<Checkpoint> {
        if model.num_classes() != spec.num_classes() {
            return Err(Error::ClassCountMismatch {
                expected: spec.num_classes(),
                found: model.num_classes(),
            });
        }
        Ok(Checkpoint { spec, metadata, state: model.state_dict() })
    }

    /// Rebuilds the model described by `spec` and loads the stored parameters.
    pub fn into_model(&self) -> Result<Box<dyn Model>> {
        let mut model = self.spec.build()?;
        model.load_state_dict(&self.state)?;
        Ok(model)
    }

    /// Serializes the checkpoint to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a checkpoint previously written by `save_json`.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Checkpoint> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
