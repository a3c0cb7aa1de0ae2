//! Persisted model artifacts.
//!
//! An artifact file is laid out as
//!
//! ```text
//! +------+---------+----------+----------------------+
//! | QTAG | version | checksum | bincode payload ...  |
//! +------+---------+----------+----------------------+
//!   4 B     u32 LE    u32 LE
//! ```
//!
//! where the checksum is the CRC32 of the payload. Saving writes a sibling
//! temporary file, syncs it and renames it over the target, so readers see
//! either the old or the new artifact.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::analysis::lemmatizer::LemmatizerKind;
use crate::analysis::tokenizer::TokenizerKind;
use crate::error::{QuerytagError, Result};
use crate::features::{FeatureConfig, FeatureVariant};
use crate::lexicon::Lexicon;
use crate::ml::crf::Crf;
use crate::ml::ensemble::BaseEnsemble;
use crate::ml::models::ModelMetadata;
use crate::ml::stacker::StackedTagger;

/// File magic.
pub const MAGIC: &[u8; 4] = b"QTAG";

/// Current artifact format version.
pub const FORMAT_VERSION: u32 = 2;

const HEADER_LEN: usize = 12;

/// Everything needed to rebuild a [`StackedTagger`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelBundle {
    pub metadata: ModelMetadata,
    pub tokenizer: TokenizerKind,
    pub lemmatizer: LemmatizerKind,
    pub lexicon: Lexicon,
    /// Base variants in training order.
    pub base_variants: Vec<FeatureVariant>,
    pub meta_features: FeatureConfig,
    pub ensemble: BaseEnsemble,
    pub meta: Crf,
}

impl ModelBundle {
    /// Encode the bundle with its header.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Decode and verify a header-prefixed bundle.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(QuerytagError::artifact(format!(
                "truncated artifact: {} bytes",
                bytes.len()
            )));
        }
        if &bytes[0..4] != MAGIC {
            return Err(QuerytagError::artifact("invalid artifact magic"));
        }

        let version = read_u32(&bytes[4..8]);
        if version != FORMAT_VERSION {
            return Err(QuerytagError::artifact(format!(
                "unsupported artifact version {version}, expected {FORMAT_VERSION}"
            )));
        }

        let expected = read_u32(&bytes[8..12]);
        let payload = &bytes[HEADER_LEN..];
        let actual = crc32fast::hash(payload);
        if actual != expected {
            return Err(QuerytagError::artifact(format!(
                "checksum mismatch: stored {expected:#010x}, computed {actual:#010x}"
            )));
        }

        bincode::deserialize(payload)
            .map_err(|e| QuerytagError::artifact(format!("cannot decode payload: {e}")))
    }

    /// Atomically write the bundle to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let tmp = temp_path(path);
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!("Saved model artifact to {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// Read and verify a bundle from `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            QuerytagError::artifact(format!("cannot read {}: {e}", path.display()))
        })?;
        debug!("Read {} bytes from {}", bytes.len(), path.display());
        Self::from_bytes(&bytes)
    }
}

impl StackedTagger {
    /// Save the tagger as an artifact.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_bundle().save(path)
    }

    /// Load and validate a tagger artifact.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let tagger = StackedTagger::from_bundle(ModelBundle::load(path)?)?;
        info!(
            "Loaded model {:?} from {} ({} variants x {} folds)",
            tagger.metadata().name,
            path.display(),
            tagger.metadata().variants.len(),
            tagger.metadata().n_splits
        );
        Ok(tagger)
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".tmp-{}", std::process::id()));
    path.with_file_name(name)
}
