use serde::{Deserialize, Serialize};

use crate::classifier::{MethodClassifier, MethodRule};
use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingSettings {
    pub rules: Vec<MethodRule>,
}

impl RoutingSettings {
    pub fn classifier(&self) -> Result<MethodClassifier> {
        MethodClassifier::new(&self.rules)
    }
}
