//! Checkpoint restoration with full coverage checking.
//!
//! Checkpoints are safetensors files whose keys are
//! `<root>.<wrapper>.<parameter>` (for example
//! `state_dicts.module.backbone.conv1.weight`). Loading is all-or-nothing:
//! the model is first composed over shape-only placeholders to learn every
//! name and shape it expects, the file is compared against that set, and only
//! a checkpoint covering it exactly is used to build the real model.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use candle_core::{DType, Device, Shape, Tensor};
use candle_nn::var_builder::SimpleBackend;
use candle_nn::VarBuilder;

use super::{device, AttributeModel};
use crate::attributes::AttributeList;
use crate::backbone::BackboneRegistry;
use crate::config::{Config, ModelConfig};
use crate::error::{ConfigError, LoadError, MismatchReport, Result, ShapeMismatch};

/// Buffer that PyTorch stores next to batch-norm statistics but never reads
/// at inference time.
const IGNORED_SUFFIX: &str = "num_batches_tracked";

/// Mapping between model parameter names and checkpoint keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterNaming {
    prefix: String,
}

impl ParameterNaming {
    /// Empty segments are skipped, so `("", "")` means bare parameter names.
    pub fn new(root: &str, wrapper: &str) -> Self {
        let prefix = [root, wrapper]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(".");
        Self { prefix }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(&config.checkpoint_root, &config.wrapper_prefix)
    }

    /// Checkpoint key for a model parameter.
    pub fn key(&self, param: &str) -> String {
        if self.prefix.is_empty() {
            param.to_string()
        } else {
            format!("{}.{}", self.prefix, param)
        }
    }

    /// Model parameter for a checkpoint key, if the key carries the prefix.
    pub fn strip<'a>(&self, key: &'a str) -> Option<&'a str> {
        if self.prefix.is_empty() {
            return Some(key);
        }
        key.strip_prefix(self.prefix.as_str())?.strip_prefix('.')
    }
}

/// A model with restored weights and the device it lives on.
#[derive(Debug)]
pub struct LoadedModel {
    pub model: AttributeModel,
    pub device: Device,
    pub checkpoint: PathBuf,
}

/// Builds models and restores their weights.
#[derive(Debug, Clone, Default)]
pub struct CheckpointLoader {
    registry: BackboneRegistry,
}

impl CheckpointLoader {
    pub fn new(registry: BackboneRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &BackboneRegistry {
        &self.registry
    }

    /// Select the device, then restore the configured checkpoint onto it.
    pub fn load(&self, config: &Config, attributes: &AttributeList) -> Result<LoadedModel> {
        let model_cfg = &config.model;
        let device = device::select(&model_cfg.device, model_cfg.force_cpu, model_cfg.seed)?;
        let checkpoint = config.checkpoint_path();
        let model = self.load_on(
            model_cfg,
            &ParameterNaming::from_config(model_cfg),
            &checkpoint,
            attributes.len(),
            &device,
        )?;
        Ok(LoadedModel {
            model,
            device,
            checkpoint,
        })
    }

    /// Restore `path` into a freshly composed model on `device`.
    pub fn load_on(
        &self,
        model_cfg: &ModelConfig,
        naming: &ParameterNaming,
        path: &Path,
        num_attributes: usize,
        device: &Device,
    ) -> Result<AttributeModel> {
        let start = Instant::now();
        let backbone = model_cfg.backbone.as_str();
        self.check_feature_width(model_cfg)?;

        std::fs::metadata(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let stored =
            candle_core::safetensors::load(path, device).map_err(|source| LoadError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let expected = self.expected_parameters(backbone, num_attributes)?;
        tracing::debug!(
            backbone,
            expected = expected.len(),
            stored = stored.len(),
            "Matching checkpoint against model parameters"
        );
        let (tensors, parameter_count) = match_parameters(&expected, stored, naming, path)?;

        let vb = VarBuilder::from_tensors(tensors, DType::F32, device);
        let model = AttributeModel::new(&self.registry, backbone, num_attributes, vb)?
            .with_parameter_count(parameter_count);

        tracing::info!(
            backbone,
            checkpoint = %path.display(),
            parameters = parameter_count,
            attributes = num_attributes,
            device = %device::label(device),
            "Loaded checkpoint in {:.2?}",
            start.elapsed()
        );
        Ok(model)
    }

    fn check_feature_width(&self, model_cfg: &ModelConfig) -> Result<()> {
        let entry = self.registry.resolve(&model_cfg.backbone)?;
        match model_cfg.feature_width {
            Some(configured) if configured != entry.feature_width => {
                Err(ConfigError::FeatureWidthMismatch {
                    backbone: model_cfg.backbone.clone(),
                    registered: entry.feature_width,
                    configured,
                }
                .into())
            }
            _ => Ok(()),
        }
    }

    /// Every parameter name the composed model asks for, with its shape.
    fn expected_parameters(
        &self,
        backbone: &str,
        num_attributes: usize,
    ) -> Result<BTreeMap<String, Vec<usize>>> {
        let recorder = ShapeRecorder::default();
        let vb = VarBuilder::from_backend(Box::new(recorder.clone()), DType::F32, Device::Cpu);
        AttributeModel::new(&self.registry, backbone, num_attributes, vb)?;
        Ok(recorder.into_shapes())
    }
}

/// Parameter source that records each requested name and shape and hands
/// back a broadcast zero, so composing even the largest backbone allocates
/// no weight storage.
#[derive(Clone, Default)]
struct ShapeRecorder {
    shapes: Arc<Mutex<BTreeMap<String, Vec<usize>>>>,
}

impl ShapeRecorder {
    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<usize>>> {
        self.shapes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn into_shapes(self) -> BTreeMap<String, Vec<usize>> {
        std::mem::take(&mut *self.lock())
    }
}

impl SimpleBackend for ShapeRecorder {
    fn get(
        &self,
        shape: Shape,
        name: &str,
        _init: candle_nn::Init,
        dtype: DType,
        dev: &Device,
    ) -> candle_core::Result<Tensor> {
        self.lock().insert(name.to_string(), shape.dims().to_vec());
        Tensor::zeros((), dtype, dev)?.broadcast_as(shape)
    }

    fn contains_tensor(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }
}

/// Pair checkpoint tensors with model parameters by exact name.
///
/// Returns the tensors keyed by parameter name, converted to F32, and the
/// total number of scalars restored.
fn match_parameters(
    expected: &BTreeMap<String, Vec<usize>>,
    stored: HashMap<String, Tensor>,
    naming: &ParameterNaming,
    path: &Path,
) -> Result<(HashMap<String, Tensor>, usize)> {
    let mut report = MismatchReport::default();
    let mut tensors = HashMap::with_capacity(expected.len());

    for (key, tensor) in stored {
        if key.ends_with(IGNORED_SUFFIX) {
            continue;
        }
        let Some(name) = naming.strip(&key) else {
            report.unexpected.push(key);
            continue;
        };
        match expected.get(name) {
            None => report.unexpected.push(key),
            Some(shape) if shape.as_slice() != tensor.dims() => {
                report.shapes.push(ShapeMismatch {
                    name: name.to_string(),
                    expected: shape.clone(),
                    found: tensor.dims().to_vec(),
                });
            }
            Some(_) => {
                tensors.insert(name.to_string(), tensor);
            }
        }
    }

    report.missing = expected
        .keys()
        .filter(|name| {
            !tensors.contains_key(name.as_str()) && !report.shapes.iter().any(|s| &s.name == *name)
        })
        .cloned()
        .collect();

    if !report.is_empty() {
        report.unexpected.sort();
        report.shapes.sort_by(|a, b| a.name.cmp(&b.name));
        return Err(LoadError::Mismatch {
            path: path.to_path_buf(),
            report,
        }
        .into());
    }

    let mut parameter_count = 0;
    let mut converted = HashMap::with_capacity(tensors.len());
    for (name, tensor) in tensors {
        parameter_count += tensor.elem_count();
        let tensor = if tensor.dtype() == DType::F32 {
            tensor
        } else {
            tensor
                .to_dtype(DType::F32)
                .map_err(|source| LoadError::Assign {
                    name: name.clone(),
                    source,
                })?
        };
        converted.insert(name, tensor);
    }
    Ok((converted, parameter_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PedattrError;

    #[test]
    fn test_naming_key_and_strip() {
        let naming = ParameterNaming::new("state_dicts", "module");
        assert_eq!(
            naming.key("head.weight"),
            "state_dicts.module.head.weight"
        );
        assert_eq!(
            naming.strip("state_dicts.module.head.weight"),
            Some("head.weight")
        );
        assert_eq!(naming.strip("state_dicts.head.weight"), None);
        assert_eq!(naming.strip("state_dicts.modulehead.weight"), None);
    }

    #[test]
    fn test_naming_without_wrapper() {
        let naming = ParameterNaming::new("state_dicts", "");
        assert_eq!(naming.key("head.bias"), "state_dicts.head.bias");
        let bare = ParameterNaming::new("", "");
        assert_eq!(bare.key("head.bias"), "head.bias");
        assert_eq!(bare.strip("head.bias"), Some("head.bias"));
    }

    fn expected() -> BTreeMap<String, Vec<usize>> {
        BTreeMap::from([
            ("head.weight".to_string(), vec![2, 4]),
            ("head.bias".to_string(), vec![2]),
        ])
    }

    fn zeros(shape: &[usize]) -> Tensor {
        Tensor::zeros(shape, DType::F32, &Device::Cpu).unwrap()
    }

    #[test]
    fn test_match_accepts_exact_cover() {
        let naming = ParameterNaming::new("state_dicts", "module");
        let stored = HashMap::from([
            ("state_dicts.module.head.weight".to_string(), zeros(&[2, 4])),
            ("state_dicts.module.head.bias".to_string(), zeros(&[2])),
            (
                "state_dicts.module.bn.num_batches_tracked".to_string(),
                zeros(&[]),
            ),
        ]);
        let (tensors, count) =
            match_parameters(&expected(), stored, &naming, Path::new("x")).unwrap();
        assert_eq!(count, 10);
        assert!(tensors.contains_key("head.weight"));
        assert!(tensors.contains_key("head.bias"));
    }

    #[test]
    fn test_match_converts_dtype() {
        let naming = ParameterNaming::new("", "");
        let stored = HashMap::from([
            (
                "head.weight".to_string(),
                Tensor::zeros((2, 4), DType::F16, &Device::Cpu).unwrap(),
            ),
            ("head.bias".to_string(), zeros(&[2])),
        ]);
        let (tensors, _) = match_parameters(&expected(), stored, &naming, Path::new("x")).unwrap();
        assert_eq!(tensors["head.weight"].dtype(), DType::F32);
    }

    #[test]
    fn test_match_reports_every_problem() {
        let naming = ParameterNaming::new("state_dicts", "module");
        let stored = HashMap::from([
            ("state_dicts.module.head.weight".to_string(), zeros(&[3, 4])),
            ("state_dicts.module.extra.weight".to_string(), zeros(&[1])),
        ]);
        let err = match_parameters(&expected(), stored, &naming, Path::new("ckpt")).unwrap_err();
        let PedattrError::Load(LoadError::Mismatch { report, .. }) = &err else {
            panic!("expected mismatch, got {err}");
        };
        assert_eq!(report.missing, vec!["head.bias".to_string()]);
        assert_eq!(
            report.unexpected,
            vec!["state_dicts.module.extra.weight".to_string()]
        );
        assert_eq!(report.shapes.len(), 1);
        assert_eq!(report.shapes[0].name, "head.weight");
        assert_eq!(report.shapes[0].expected, vec![2, 4]);
        assert_eq!(report.shapes[0].found, vec![3, 4]);
    }

    #[test]
    fn test_wrong_wrapper_is_all_unexpected() {
        let naming = ParameterNaming::new("state_dicts", "module");
        let stored = HashMap::from([
            ("state_dicts.head.weight".to_string(), zeros(&[2, 4])),
            ("state_dicts.head.bias".to_string(), zeros(&[2])),
        ]);
        let err = match_parameters(&expected(), stored, &naming, Path::new("ckpt")).unwrap_err();
        let PedattrError::Load(LoadError::Mismatch { report, .. }) = &err else {
            panic!("expected mismatch, got {err}");
        };
        assert_eq!(report.missing.len(), 2);
        assert_eq!(report.unexpected.len(), 2);
    }

    #[test]
    fn test_feature_width_cross_check() {
        let loader = CheckpointLoader::default();
        let mut cfg = ModelConfig::default();
        cfg.feature_width = Some(2048);
        assert!(loader.check_feature_width(&cfg).is_ok());
        cfg.feature_width = Some(1024);
        let err = loader.check_feature_width(&cfg).unwrap_err();
        assert!(matches!(
            err,
            PedattrError::Config(ConfigError::FeatureWidthMismatch {
                registered: 2048,
                configured: 1024,
                ..
            })
        ));
    }

    #[test]
    fn test_missing_checkpoint_is_io_error() {
        let loader = CheckpointLoader::default();
        let cfg = ModelConfig::default();
        let err = loader
            .load_on(
                &cfg,
                &ParameterNaming::from_config(&cfg),
                Path::new("/nonexistent/ckpt.safetensors"),
                4,
                &Device::Cpu,
            )
            .unwrap_err();
        assert!(matches!(err, PedattrError::Load(LoadError::Io { .. })));
    }

    #[test]
    fn test_garbage_checkpoint_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ckpt.safetensors");
        std::fs::write(&path, b"not a tensor file").unwrap();
        let loader = CheckpointLoader::default();
        let cfg = ModelConfig::default();
        let err = loader
            .load_on(&cfg, &ParameterNaming::from_config(&cfg), &path, 4, &Device::Cpu)
            .unwrap_err();
        assert!(matches!(err, PedattrError::Load(LoadError::Read { .. })));
    }

    #[test]
    fn test_expected_parameters_match_materialized_model() {
        let loader = CheckpointLoader::default();
        let expected = loader.expected_parameters("densenet121", 7).unwrap();

        let varmap = candle_nn::VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        AttributeModel::new(loader.registry(), "densenet121", 7, vb).unwrap();
        let materialized: BTreeMap<String, Vec<usize>> = varmap
            .data()
            .lock()
            .unwrap()
            .iter()
            .map(|(name, var)| (name.clone(), var.dims().to_vec()))
            .collect();

        assert_eq!(expected, materialized);
        assert_eq!(expected["head.weight"], vec![7, 1024]);
        assert!(expected.contains_key("backbone.features.norm0.running_var"));
    }
}
