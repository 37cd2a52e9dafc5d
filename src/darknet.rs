// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Darknet model definition (`.cfg`) parsing.
//!
//! A definition is a sequence of `[type]` blocks, each followed by
//! `key=value` options. The detector only needs the `[net]` input geometry
//! and the `[yolo]` heads to check that a checkpoint matches the definition.

use std::fs;
use std::path::Path;

use crate::error::{DetectError, Result};

/// One `[type]` block and its options, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block type without brackets (`net`, `convolutional`, `yolo`, ...).
    pub kind: String,
    /// `key=value` options.
    pub options: Vec<(String, String)>,
}

impl Block {
    fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            options: Vec::new(),
        }
    }

    /// Raw value of an option.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn parse_usize(&self, key: &str) -> Result<Option<usize>> {
        self.get(key)
            .map(|value| {
                value.parse().map_err(|_| {
                    DetectError::ModelDefinitionError(format!(
                        "Invalid {key} value in [{}]: {value}",
                        self.kind
                    ))
                })
            })
            .transpose()
    }

    fn parse_list(&self, key: &str) -> Result<Vec<usize>> {
        let Some(value) = self.get(key) else {
            return Ok(Vec::new());
        };
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse().map_err(|_| {
                    DetectError::ModelDefinitionError(format!(
                        "Invalid {key} entry in [{}]: {s}",
                        self.kind
                    ))
                })
            })
            .collect()
    }
}

/// A `[yolo]` detection head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YoloHead {
    /// Number of classes predicted by this head.
    pub classes: usize,
    /// Indices into `anchors` used by this head.
    pub mask: Vec<usize>,
    /// All anchor boxes as `(width, height)` pairs.
    pub anchors: Vec<(usize, usize)>,
}

impl YoloHead {
    /// Anchors selected by the mask.
    #[must_use]
    pub fn masked_anchors(&self) -> Vec<(usize, usize)> {
        self.mask
            .iter()
            .filter_map(|&i| self.anchors.get(i).copied())
            .collect()
    }
}

/// Parsed Darknet model definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDefinition {
    blocks: Vec<Block>,
    heads: Vec<YoloHead>,
}

impl ModelDefinition {
    /// Read and parse a definition file.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::ModelDefinitionError`] if the file is missing
    /// or malformed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            DetectError::ModelDefinitionError(format!(
                "Failed to read model definition {}: {e}",
                path.display()
            ))
        })?;
        Self::from_cfg_str(&text)
    }

    /// Parse a definition from its text.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::ModelDefinitionError`] when the first block is
    /// not `[net]`, an option appears before any block, a line is neither a
    /// header nor `key=value`, there is no `[yolo]` head, or heads disagree
    /// on the class count.
    pub fn from_cfg_str(text: &str) -> Result<Self> {
        let mut blocks: Vec<Block> = Vec::new();

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let kind = header.strip_suffix(']').ok_or_else(|| {
                    DetectError::ModelDefinitionError(format!(
                        "Unterminated block header on line {}: {line}",
                        lineno + 1
                    ))
                })?;
                blocks.push(Block::new(kind.trim()));
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                DetectError::ModelDefinitionError(format!(
                    "Expected key=value on line {}: {line}",
                    lineno + 1
                ))
            })?;
            let block = blocks.last_mut().ok_or_else(|| {
                DetectError::ModelDefinitionError(format!(
                    "Option outside of any block on line {}: {line}",
                    lineno + 1
                ))
            })?;
            block
                .options
                .push((key.trim().to_string(), value.trim().to_string()));
        }

        match blocks.first() {
            Some(first) if first.kind == "net" => {}
            _ => {
                return Err(DetectError::ModelDefinitionError(
                    "Model definition must start with a [net] block".to_string(),
                ));
            }
        }

        let heads = blocks
            .iter()
            .filter(|b| b.kind == "yolo")
            .map(Self::parse_head)
            .collect::<Result<Vec<_>>>()?;

        let Some(first_head) = heads.first() else {
            return Err(DetectError::ModelDefinitionError(
                "Model definition has no [yolo] head".to_string(),
            ));
        };
        if let Some(other) = heads.iter().find(|h| h.classes != first_head.classes) {
            return Err(DetectError::ModelDefinitionError(format!(
                "Inconsistent class counts across [yolo] heads: {} vs {}",
                first_head.classes, other.classes
            )));
        }

        Ok(Self { blocks, heads })
    }

    fn parse_head(block: &Block) -> Result<YoloHead> {
        let classes = block.parse_usize("classes")?.ok_or_else(|| {
            DetectError::ModelDefinitionError("[yolo] head without classes".to_string())
        })?;
        let flat = block.parse_list("anchors")?;
        if flat.len() % 2 != 0 {
            return Err(DetectError::ModelDefinitionError(format!(
                "Odd number of anchor values in [yolo]: {}",
                flat.len()
            )));
        }
        let anchors: Vec<(usize, usize)> = flat.chunks_exact(2).map(|c| (c[0], c[1])).collect();
        let mask = block.parse_list("mask")?;
        if let Some(&bad) = mask.iter().find(|&&i| i >= anchors.len()) {
            return Err(DetectError::ModelDefinitionError(format!(
                "Anchor mask index {bad} out of range for {} anchors",
                anchors.len()
            )));
        }
        Ok(YoloHead {
            classes,
            mask,
            anchors,
        })
    }

    /// All blocks in file order.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The leading `[net]` block.
    #[must_use]
    pub fn net(&self) -> &Block {
        // from_cfg_str guarantees a leading [net]
        &self.blocks[0]
    }

    /// Detection heads in file order.
    #[must_use]
    pub fn heads(&self) -> &[YoloHead] {
        &self.heads
    }

    /// Number of classes shared by every head.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.heads[0].classes
    }

    /// Values per prediction row: box, objectness and one score per class.
    #[must_use]
    pub fn num_outputs(&self) -> usize {
        5 + self.num_classes()
    }

    /// Declared input width, if present.
    #[must_use]
    pub fn width(&self) -> Option<usize> {
        self.net().get("width").and_then(|v| v.parse().ok())
    }

    /// Declared input height, if present.
    #[must_use]
    pub fn height(&self) -> Option<usize> {
        self.net().get("height").and_then(|v| v.parse().ok())
    }

    /// True unless `[net]` declares a width or height other than `img_size`.
    #[must_use]
    pub fn accepts_input_size(&self, img_size: usize) -> bool {
        [self.width(), self.height()]
            .into_iter()
            .flatten()
            .all(|side| side == img_size)
    }

    /// Declared input channels, defaulting to 3.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.net()
            .get("channels")
            .and_then(|v| v.parse().ok())
            .unwrap_or(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CFG: &str = "
[net]
# Testing
batch=1
width=416
height=416
channels=3

[convolutional]
filters=45
size=1

[yolo]
mask = 3,4,5
anchors = 10,14,  23,27,  37,58,  81,82,  135,169,  344,319
classes=10

[route]
layers = -4

[yolo]
mask = 0,1,2
anchors = 10,14,  23,27,  37,58,  81,82,  135,169,  344,319
classes=10
";

    #[test]
    fn test_parse_definition() {
        let def = ModelDefinition::from_cfg_str(CFG).unwrap();
        assert_eq!(def.blocks().len(), 5);
        assert_eq!(def.heads().len(), 2);
        assert_eq!(def.num_classes(), 10);
        assert_eq!(def.num_outputs(), 15);
        assert_eq!(def.width(), Some(416));
        assert_eq!(def.height(), Some(416));
        assert_eq!(def.channels(), 3);
        assert_eq!(
            def.heads()[0].masked_anchors(),
            vec![(81, 82), (135, 169), (344, 319)]
        );
    }

    #[test]
    fn test_accepts_input_size() {
        let def = ModelDefinition::from_cfg_str(CFG).unwrap();
        assert!(def.accepts_input_size(416));
        assert!(!def.accepts_input_size(320));

        let undeclared = ModelDefinition::from_cfg_str("[net]\n[yolo]\nclasses=2\n").unwrap();
        assert!(undeclared.accepts_input_size(320));
    }

    #[test]
    fn test_requires_net_first() {
        let err = ModelDefinition::from_cfg_str("[yolo]\nclasses=1\n").unwrap_err();
        assert!(matches!(err, DetectError::ModelDefinitionError(_)));
    }

    #[test]
    fn test_requires_yolo_head() {
        let err = ModelDefinition::from_cfg_str("[net]\nwidth=416\n").unwrap_err();
        assert!(err.to_string().contains("no [yolo] head"));
    }

    #[test]
    fn test_option_outside_block() {
        let err = ModelDefinition::from_cfg_str("width=416\n[net]\n").unwrap_err();
        assert!(err.to_string().contains("outside of any block"));
    }

    #[test]
    fn test_inconsistent_classes() {
        let cfg = "[net]\n[yolo]\nclasses=3\n[yolo]\nclasses=4\n";
        let err = ModelDefinition::from_cfg_str(cfg).unwrap_err();
        assert!(err.to_string().contains("Inconsistent class counts"));
    }

    #[test]
    fn test_missing_file() {
        let err = ModelDefinition::from_file("does/not/exist.cfg").unwrap_err();
        assert!(matches!(err, DetectError::ModelDefinitionError(_)));
    }
}
