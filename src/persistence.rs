use serde::{Deserialize, Serialize};
use ndarray::{Array2, Dimension};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

use crate::layers::linear::LinearLayer;
use crate::layers::lstm_cell::LSTMCell;
use crate::models::lstm_regressor::LstmRegressor;
use crate::normalize::NormalizationStats;

/// Serializable version of Array2<f64> for persistence
#[derive(Serialize, Deserialize)]
struct SerializableArray2 {
    data: Vec<f64>,
    shape: (usize, usize),
}

impl From<&Array2<f64>> for SerializableArray2 {
    fn from(array: &Array2<f64>) -> Self {
        Self {
            data: array.iter().cloned().collect(),
            shape: array.raw_dim().into_pattern(),
        }
    }
}

impl TryFrom<SerializableArray2> for Array2<f64> {
    type Error = PersistenceError;

    fn try_from(array: SerializableArray2) -> Result<Self, Self::Error> {
        let shape = array.shape;
        Array2::from_shape_vec(shape, array.data)
            .map_err(|_| PersistenceError::CorruptModel(format!("array data does not fit shape {:?}", shape)))
    }
}

/// Serializable regressor parameters
#[derive(Serialize, Deserialize)]
pub struct SerializableLstmRegressor {
    w_ih: SerializableArray2,
    w_hh: SerializableArray2,
    b_ih: SerializableArray2,
    b_hh: SerializableArray2,
    head_weight: SerializableArray2,
    head_bias: SerializableArray2,
    input_size: usize,
    hidden_size: usize,
}

impl From<&LstmRegressor> for SerializableLstmRegressor {
    fn from(model: &LstmRegressor) -> Self {
        Self {
            w_ih: (&model.cell.w_ih).into(),
            w_hh: (&model.cell.w_hh).into(),
            b_ih: (&model.cell.b_ih).into(),
            b_hh: (&model.cell.b_hh).into(),
            head_weight: (&model.head.weight).into(),
            head_bias: (&model.head.bias).into(),
            input_size: model.input_size,
            hidden_size: model.hidden_size,
        }
    }
}

impl TryFrom<SerializableLstmRegressor> for LstmRegressor {
    type Error = PersistenceError;

    fn try_from(saved: SerializableLstmRegressor) -> Result<Self, Self::Error> {
        let gates = 4 * saved.hidden_size;
        let cell = LSTMCell {
            w_ih: saved.w_ih.try_into()?,
            w_hh: saved.w_hh.try_into()?,
            b_ih: saved.b_ih.try_into()?,
            b_hh: saved.b_hh.try_into()?,
            input_size: saved.input_size,
            hidden_size: saved.hidden_size,
        };
        let head_weight: Array2<f64> = saved.head_weight.try_into()?;
        let head_bias: Array2<f64> = saved.head_bias.try_into()?;

        let consistent = cell.w_ih.dim() == (gates, saved.input_size)
            && cell.w_hh.dim() == (gates, saved.hidden_size)
            && cell.b_ih.dim() == (gates, 1)
            && cell.b_hh.dim() == (gates, 1)
            && head_weight.dim() == (1, saved.hidden_size)
            && head_bias.dim() == (1, 1);
        if !consistent {
            return Err(PersistenceError::CorruptModel(
                "parameter shapes do not match the stored layer sizes".to_string(),
            ));
        }

        Ok(LstmRegressor::from_layers(cell, LinearLayer::from_weights(head_weight, head_bias)))
    }
}

/// Model metadata for tracking training information
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ModelMetadata {
    pub model_name: String,
    pub version: String,
    pub created_at: String,
    pub input_size: usize,
    pub hidden_size: usize,
    pub sequence_length: usize,
    pub epochs_trained: usize,
    pub best_loss: Option<f64>,
    /// Statistics the training inputs were scaled with
    pub normalization: Option<NormalizationStats>,
}

impl ModelMetadata {
    /// Metadata stamped with the crate version and the current time
    pub fn new(model_name: impl Into<String>, model: &LstmRegressor, sequence_length: usize) -> Self {
        ModelMetadata {
            model_name: model_name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            input_size: model.input_size,
            hidden_size: model.hidden_size,
            sequence_length,
            epochs_trained: 0,
            best_loss: None,
            normalization: None,
        }
    }
}

/// Complete saved model including parameters and metadata
#[derive(Serialize, Deserialize)]
pub struct SavedModel {
    pub model: SerializableLstmRegressor,
    pub metadata: ModelMetadata,
}

/// Errors that can occur during model persistence operations
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Corrupt model file: {0}")]
    CorruptModel(String),
}

impl From<serde_json::Error> for PersistenceError {
    fn from(error: serde_json::Error) -> Self {
        PersistenceError::SerializationError(error.to_string())
    }
}

impl From<bincode::Error> for PersistenceError {
    fn from(error: bincode::Error) -> Self {
        PersistenceError::SerializationError(error.to_string())
    }
}

/// Model persistence operations
pub struct ModelPersistence;

impl ModelPersistence {
    /// Save model to JSON format (human-readable)
    pub fn save_to_json<P: AsRef<Path>>(model: &SavedModel, path: P) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(model)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Load model from JSON format
    pub fn load_from_json<P: AsRef<Path>>(path: P) -> Result<SavedModel, PersistenceError> {
        let mut contents = String::new();
        File::open(path)?.read_to_string(&mut contents)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save model to binary format (compact and fast)
    pub fn save_to_binary<P: AsRef<Path>>(model: &SavedModel, path: P) -> Result<(), PersistenceError> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, model)?;
        Ok(())
    }

    /// Load model from binary format
    pub fn load_from_binary<P: AsRef<Path>>(path: P) -> Result<SavedModel, PersistenceError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }
}

/// Convenience trait for easy model saving/loading
pub trait PersistentModel {
    /// Save model to file (format determined by file extension)
    fn save<P: AsRef<Path>>(&self, path: P, metadata: ModelMetadata) -> Result<(), PersistenceError>;

    /// Load model from file (format determined by file extension)
    fn load<P: AsRef<Path>>(path: P) -> Result<(Self, ModelMetadata), PersistenceError>
    where
        Self: Sized;
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("json")
}

impl PersistentModel for LstmRegressor {
    fn save<P: AsRef<Path>>(&self, path: P, metadata: ModelMetadata) -> Result<(), PersistenceError> {
        let saved_model = SavedModel {
            model: self.into(),
            metadata,
        };

        // anything other than .json is written as bincode
        if is_json(path.as_ref()) {
            ModelPersistence::save_to_json(&saved_model, path)
        } else {
            ModelPersistence::save_to_binary(&saved_model, path)
        }
    }

    fn load<P: AsRef<Path>>(path: P) -> Result<(Self, ModelMetadata), PersistenceError> {
        let saved_model = if is_json(path.as_ref()) {
            ModelPersistence::load_from_json(path)?
        } else {
            ModelPersistence::load_from_binary(path)?
        };

        Ok((saved_model.model.try_into()?, saved_model.metadata))
    }
}
