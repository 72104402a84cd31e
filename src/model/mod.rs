//! Model module: the classifier boundary and the banana leaf CNN
//!
//! - `classifier`: the [`Classifier`] trait the pipeline is written against,
//!   plus layer enumeration and Grad-CAM layer selection
//! - `cnn`: the concrete [`BananaClassifier`] Burn module

pub mod classifier;
pub mod cnn;

#[cfg(test)]
pub(crate) mod stub;

pub use classifier::{select_target_layer, Classifier, LayerInfo, LayerKind};
pub use cnn::{BananaClassifier, BananaClassifierConfig};

/// Number of classes the classifier distinguishes
pub const NUM_CLASSES: usize = 3;

/// Class labels, in the classifier's output order
pub const CLASS_NAMES: [&str; NUM_CLASSES] = [
    "Banana Black Sigatoka Disease",
    "Banana Healthy Leaf",
    "Banana Panama Disease",
];

/// Get the class name for a given output index
pub fn class_name(index: usize) -> Option<&'static str> {
    CLASS_NAMES.get(index).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_name_lookup() {
        assert_eq!(class_name(0), Some("Banana Black Sigatoka Disease"));
        assert_eq!(class_name(1), Some("Banana Healthy Leaf"));
        assert_eq!(class_name(3), None);
    }
}
