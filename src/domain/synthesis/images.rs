// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::shared::error::{HcpError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Caller-supplied mapping from image name to pull reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRefs(BTreeMap<String, String>);

impl ImageRefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, reference: impl Into<String>) -> Self {
        self.0.insert(name.into(), reference.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, reference: impl Into<String>) {
        self.0.insert(name.into(), reference.into());
    }

    /// A missing or blank reference is malformed input.
    pub fn require(&self, name: &str) -> Result<&str> {
        match self.0.get(name) {
            Some(reference) if !reference.trim().is_empty() => Ok(reference),
            _ => Err(HcpError::validation(format!(
                "missing required image reference '{}'",
                name
            ))),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

impl FromIterator<(String, String)> for ImageRefs {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require() {
        let images = ImageRefs::new()
            .with("hyperkube", "quay.io/hcp/hyperkube@sha256:abc")
            .with("blank", "  ");

        assert_eq!(
            images.require("hyperkube").unwrap(),
            "quay.io/hcp/hyperkube@sha256:abc"
        );
        assert!(matches!(
            images.require("blank"),
            Err(HcpError::Validation(_))
        ));
        assert!(matches!(
            images.require("cluster-autoscaler"),
            Err(HcpError::Validation(_))
        ));
    }
}
