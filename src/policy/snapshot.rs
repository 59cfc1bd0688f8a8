//! Immutable parameter snapshots
//!
//! A [`PolicySnapshot`] is a named mapping from parameter identifier to a
//! detached tensor copy, taken at a specific point in training. Snapshots are
//! the only form in which parameters cross a boundary: rollout workers
//! receive one by value, the PPO "old policy" is refreshed from one, and the
//! Reptile meta-initialization is one. A snapshot is replaced, never mutated.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Result};
use tch::Tensor;

/// Named, detached copies of a policy's parameters.
#[derive(Debug)]
pub struct PolicySnapshot {
    params: BTreeMap<String, Tensor>,
}

impl PolicySnapshot {
    /// Build a snapshot from named tensors, detaching and copying each one so
    /// the snapshot never aliases live parameters.
    pub fn from_named_tensors<I>(named: I) -> Self
    where
        I: IntoIterator<Item = (String, Tensor)>,
    {
        let params = tch::no_grad(|| {
            named
                .into_iter()
                .map(|(name, tensor)| (name, tensor.detach().copy()))
                .collect()
        });
        Self { params }
    }

    /// Look up one parameter tensor by name.
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.params.get(name)
    }

    /// Iterate parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Tensor)> {
        self.params.iter()
    }

    /// Number of parameter tensors.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the snapshot holds no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Persist the full parameter mapping to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let named: Vec<(&str, &Tensor)> =
            self.params.iter().map(|(name, tensor)| (name.as_str(), tensor)).collect();
        Tensor::save_multi(&named, path.as_ref())
            .map_err(|e| anyhow!("failed to save snapshot to {:?}: {e}", path.as_ref()))
    }

    /// Load a parameter mapping previously written by [`save`](Self::save).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let named = Tensor::load_multi(path.as_ref())
            .map_err(|e| anyhow!("failed to load snapshot from {:?}: {e}", path.as_ref()))?;
        Ok(Self::from_named_tensors(named))
    }
}

impl Clone for PolicySnapshot {
    fn clone(&self) -> Self {
        let params = tch::no_grad(|| {
            self.params
                .iter()
                .map(|(name, tensor)| (name.clone(), tensor.copy()))
                .collect()
        });
        Self { params }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PolicySnapshot {
        PolicySnapshot::from_named_tensors([
            ("fc.weight".to_string(), Tensor::from_slice(&[1.0f32, 2.0, 3.0])),
            ("fc.bias".to_string(), Tensor::from_slice(&[0.5f32])),
        ])
    }

    #[test]
    fn test_snapshot_detaches_from_source() {
        let mut source = Tensor::from_slice(&[1.0f32, 2.0]);
        let snapshot =
            PolicySnapshot::from_named_tensors([("w".to_string(), source.shallow_clone())]);

        tch::no_grad(|| {
            source.copy_(&Tensor::from_slice(&[11.0f32, 12.0]));
        });

        let stored: Vec<f32> = Vec::try_from(snapshot.get("w").unwrap().copy()).unwrap();
        assert_eq!(stored, vec![1.0, 2.0]);
    }

    #[test]
    fn test_clone_is_deep() {
        let snapshot = sample();
        let cloned = snapshot.clone();

        tch::no_grad(|| {
            let mut t = snapshot.get("fc.bias").unwrap().shallow_clone();
            t.copy_(&Tensor::from_slice(&[9.0f32]));
        });

        let original: Vec<f32> = Vec::try_from(cloned.get("fc.bias").unwrap().copy()).unwrap();
        assert_eq!(original, vec![0.5]);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.pt");

        let snapshot = sample();
        snapshot.save(&path).unwrap();

        let loaded = PolicySnapshot::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        let weight: Vec<f32> = Vec::try_from(loaded.get("fc.weight").unwrap().copy()).unwrap();
        assert_eq!(weight, vec![1.0, 2.0, 3.0]);
    }
}
