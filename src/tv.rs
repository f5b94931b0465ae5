// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Test-vector specification (TVInfo) JSON data model.
//!
//! Vector values are arbitrary-precision unsigned integers: a declared scan
//! register can be wider than a machine word. The JSON side accepts plain
//! numbers of any magnitude (serde_json's `arbitrary_precision` keeps their
//! exact text) as well as decimal strings.

use std::path::Path;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer};

/// Logical direction of a declared test-vector signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Polarity {
    #[serde(rename = "input")]
    Input,
    #[serde(rename = "output")]
    Output,
    #[serde(rename = "inout")]
    Inout,
}

/// A logically declared test-vector signal, independent of physical ordinal.
#[derive(Debug, Clone, Deserialize)]
pub struct PortDescriptor {
    pub name: String,
    pub polarity: Polarity,
    #[serde(default = "default_width")]
    pub width: usize,
}

fn default_width() -> usize {
    1
}

/// Arbitrary-precision unsigned vector value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TvValue(pub BigUint);

impl<'de> Deserialize<'de> for TvValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let text = match &value {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => s.clone(),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "test vector value must be an unsigned integer, got {}",
                    other
                )))
            }
        };
        BigUint::from_str(text.trim()).map(TvValue).map_err(|_| {
            serde::de::Error::custom(format!(
                "test vector value '{}' is not an unsigned integer",
                text
            ))
        })
    }
}

/// One test case: per-input-port stimulus values (declaration order) plus the
/// fault-free simulated response bit string (stored reversed relative to the
/// scan-out shift order).
#[derive(Debug, Clone, Deserialize)]
pub struct CoverageEntry {
    pub vector: Vec<TvValue>,
    #[serde(rename = "goldenOutput")]
    pub golden_output: String,
}

/// Full test-vector specification: declared ports plus coverage entries.
#[derive(Debug, Clone, Deserialize)]
pub struct TVInfo {
    pub inputs: Vec<PortDescriptor>,
    #[serde(rename = "coverageList")]
    pub coverage_list: Vec<CoverageEntry>,
}

impl TVInfo {
    pub fn parse_file(path: &Path) -> Result<Self, TvError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TvError::Io(format!("{}: {}", path.display(), e)))?;
        Self::parse_str(&content)
    }

    pub fn parse_str(content: &str) -> Result<Self, TvError> {
        serde_json::from_str(content).map_err(|e| TvError::Malformed(e.to_string()))
    }
}

#[derive(Debug)]
pub enum TvError {
    Io(String),
    Malformed(String),
}

impl std::fmt::Display for TvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TvError::Io(msg) => write!(f, "test vector I/O error: {}", msg),
            TvError::Malformed(msg) => write!(f, "test vector json file is invalid: {}", msg),
        }
    }
}

impl std::error::Error for TvError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tvinfo() {
        let json = r#"{
            "inputs": [
                {"name": "a", "polarity": "input", "width": 2},
                {"name": "y", "polarity": "output", "width": 3}
            ],
            "coverageList": [
                {"vector": [3], "goldenOutput": "101"}
            ]
        }"#;
        let tv = TVInfo::parse_str(json).unwrap();
        assert_eq!(tv.inputs.len(), 2);
        assert_eq!(tv.inputs[0].polarity, Polarity::Input);
        assert_eq!(tv.coverage_list.len(), 1);
        assert_eq!(tv.coverage_list[0].vector[0].0, BigUint::from(3u32));
        assert_eq!(tv.coverage_list[0].golden_output, "101");
    }

    #[test]
    fn test_width_defaults_to_one() {
        let json = r#"{"inputs": [{"name": "a", "polarity": "input"}], "coverageList": []}"#;
        let tv = TVInfo::parse_str(json).unwrap();
        assert_eq!(tv.inputs[0].width, 1);
    }

    #[test]
    fn test_value_wider_than_machine_word() {
        // 2^100, exceeds u64; must survive exactly.
        let json = r#"{
            "inputs": [{"name": "a", "polarity": "input", "width": 101}],
            "coverageList": [
                {"vector": [1267650600228229401496703205376], "goldenOutput": ""}
            ]
        }"#;
        let tv = TVInfo::parse_str(json).unwrap();
        let expected = BigUint::from(2u32).pow(100);
        assert_eq!(tv.coverage_list[0].vector[0].0, expected);
    }

    #[test]
    fn test_value_as_decimal_string() {
        let json = r#"{
            "inputs": [{"name": "a", "polarity": "input", "width": 8}],
            "coverageList": [{"vector": ["255"], "goldenOutput": ""}]
        }"#;
        let tv = TVInfo::parse_str(json).unwrap();
        assert_eq!(tv.coverage_list[0].vector[0].0, BigUint::from(255u32));
    }

    #[test]
    fn test_negative_value_rejected() {
        let json = r#"{
            "inputs": [{"name": "a", "polarity": "input"}],
            "coverageList": [{"vector": [-1], "goldenOutput": ""}]
        }"#;
        assert!(TVInfo::parse_str(json).is_err());
    }
}
