//! Backbone registry and feature extractor implementations.
//!
//! A backbone turns an image batch `[N, 3, H, W]` into a pooled feature
//! matrix `[N, width]`. The registry is the single place where a backbone
//! name is bound to both its constructor and its output width; widths are
//! never inferred from the network, so the two must be registered together.
//!
//! ```rust,ignore
//! use pedattr_core::backbone::BackboneRegistry;
//!
//! let registry = BackboneRegistry::builtin();
//! let entry = registry.resolve("dpn107")?;
//! assert_eq!(entry.feature_width, 2688);
//! ```

pub mod densenet;
pub mod dpn;
pub(crate) mod layers;
pub mod resnet;

use candle_core::Module;
use candle_nn::VarBuilder;

use crate::error::ConfigError;

/// Type-erased feature extractor.
pub type BoxedBackbone = Box<dyn Module + Send + Sync>;

/// Constructor registered for a backbone name.
pub type BackboneCtor = fn(VarBuilder) -> candle_core::Result<BoxedBackbone>;

/// One row of the registry.
#[derive(Clone, Copy)]
pub struct BackboneEntry {
    pub name: &'static str,
    /// Width of the pooled feature vector the constructor produces.
    pub feature_width: usize,
    pub build: BackboneCtor,
}

impl std::fmt::Debug for BackboneEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackboneEntry")
            .field("name", &self.name)
            .field("feature_width", &self.feature_width)
            .finish()
    }
}

const BUILTIN: &[BackboneEntry] = &[
    BackboneEntry {
        name: "resnet50",
        feature_width: resnet::FEATURE_WIDTH,
        build: resnet::resnet50,
    },
    BackboneEntry {
        name: "resnet101",
        feature_width: resnet::FEATURE_WIDTH,
        build: resnet::resnet101,
    },
    BackboneEntry {
        name: "resnet152",
        feature_width: resnet::FEATURE_WIDTH,
        build: resnet::resnet152,
    },
    BackboneEntry {
        name: "dpn68",
        feature_width: 832,
        build: dpn::dpn68,
    },
    BackboneEntry {
        name: "dpn68b",
        feature_width: 832,
        build: dpn::dpn68b,
    },
    BackboneEntry {
        name: "dpn92",
        feature_width: 2688,
        build: dpn::dpn92,
    },
    BackboneEntry {
        name: "dpn98",
        feature_width: 2688,
        build: dpn::dpn98,
    },
    BackboneEntry {
        name: "dpn131",
        feature_width: 2688,
        build: dpn::dpn131,
    },
    BackboneEntry {
        name: "dpn107",
        feature_width: 2688,
        build: dpn::dpn107,
    },
    BackboneEntry {
        name: "densenet121",
        feature_width: 1024,
        build: densenet::densenet121,
    },
];

/// Name → (constructor, width) table.
#[derive(Debug, Clone)]
pub struct BackboneRegistry {
    entries: Vec<BackboneEntry>,
}

impl Default for BackboneRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl BackboneRegistry {
    /// Registry with every backbone shipped in this crate.
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN.to_vec(),
        }
    }

    /// Registry with no entries.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a backbone. Names are unique.
    pub fn register(&mut self, entry: BackboneEntry) -> Result<(), ConfigError> {
        if self.entries.iter().any(|e| e.name == entry.name) {
            return Err(ConfigError::DuplicateBackbone(entry.name.to_string()));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Look up a backbone by exact name.
    pub fn resolve(&self, name: &str) -> Result<&BackboneEntry, ConfigError> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| ConfigError::UnknownBackbone {
                name: name.to_string(),
                known: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    /// Construct a backbone and report its registered width.
    pub fn build(
        &self,
        name: &str,
        vb: VarBuilder,
    ) -> Result<(BoxedBackbone, usize), crate::error::PedattrError> {
        let entry = self.resolve(name)?;
        let backbone = (entry.build)(vb).map_err(|source| crate::error::LoadError::Build {
            backbone: name.to_string(),
            source,
        })?;
        Ok((backbone, entry.feature_width))
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.name)
    }

    pub fn entries(&self) -> &[BackboneEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, Tensor};

    #[test]
    fn test_builtin_widths() {
        let registry = BackboneRegistry::builtin();
        let width = |name| registry.resolve(name).unwrap().feature_width;
        assert_eq!(width("resnet50"), 2048);
        assert_eq!(width("dpn68"), 832);
        assert_eq!(width("dpn92"), 2688);
        assert_eq!(width("dpn107"), 2688);
        assert_eq!(width("densenet121"), 1024);
    }

    #[test]
    fn test_unknown_backbone() {
        let registry = BackboneRegistry::builtin();
        let err = registry.resolve("vgg16").unwrap_err();
        match err {
            ConfigError::UnknownBackbone { name, known } => {
                assert_eq!(name, "vgg16");
                assert!(known.contains("resnet50"));
                assert!(known.contains("dpn107"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_names_are_exact() {
        // substring matches are not lookups
        let registry = BackboneRegistry::builtin();
        assert!(registry.resolve("dpn").is_err());
        assert!(registry.resolve("ResNet50").is_err());
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = BackboneRegistry::builtin();
        let entry = *registry.resolve("dpn68").unwrap();
        assert!(matches!(
            registry.register(entry),
            Err(ConfigError::DuplicateBackbone(_))
        ));
    }

    #[test]
    fn test_register_custom_backbone() {
        fn mean_rgb(_vb: VarBuilder) -> candle_core::Result<BoxedBackbone> {
            Ok(Box::new(candle_nn::func(|xs: &Tensor| {
                xs.mean(candle_core::D::Minus1)?.mean(candle_core::D::Minus1)
            })))
        }
        let mut registry = BackboneRegistry::empty();
        registry
            .register(BackboneEntry {
                name: "mean_rgb",
                feature_width: 3,
                build: mean_rgb,
            })
            .unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["mean_rgb"]);
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let (backbone, width) = registry.build("mean_rgb", vb).unwrap();
        let xs = Tensor::ones((1, 3, 4, 4), DType::F32, &Device::Cpu).unwrap();
        assert_eq!(backbone.forward(&xs).unwrap().dims(), &[1, width]);
    }

    /// Every registered width must equal what the network actually emits.
    #[test]
    fn test_every_builtin_backbone_emits_registered_width() {
        let registry = BackboneRegistry::builtin();
        let device = Device::Cpu;
        let xs = Tensor::zeros((1, 3, 32, 32), DType::F32, &device).unwrap();
        for entry in registry.entries() {
            let vb = VarBuilder::zeros(DType::F32, &device);
            let (backbone, width) = registry.build(entry.name, vb).unwrap();
            let features = backbone.forward(&xs).unwrap();
            assert_eq!(features.dims(), &[1, width], "{}", entry.name);
        }
    }
}
