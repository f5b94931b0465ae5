// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Scan-chain model and chain-metadata extraction.
//!
//! The chain-insertion stage embeds a JSON description of the finished scan
//! chain into the netlist it writes, inside a structured comment. `asm`
//! recovers the ordered chain from that comment rather than re-deriving it
//! from the netlist structure.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Marker grammar of the embedded metadata comment:
/// `/* SHEAR METADATA: '<json>' END SHEAR METADATA */`
pub const METADATA_START: &str = "/* SHEAR METADATA: '";
pub const METADATA_END: &str = "' END SHEAR METADATA */";

/// Role of one tap on the physical scan path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    #[serde(rename = "input")]
    Input,
    #[serde(rename = "output")]
    Output,
    /// A scan-in position with no logical test-vector signal; zero-filled.
    #[serde(rename = "bypassInput")]
    BypassInput,
    /// A scan-out position with no logical test-vector signal; zero-filled.
    #[serde(rename = "bypassOutput")]
    BypassOutput,
}

/// One named, widthed tap on the scan path. `ordinal` is its position in the
/// physical shift order; names are unique within a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainElement {
    pub name: String,
    pub kind: ElementKind,
    pub ordinal: u32,
    pub width: usize,
}

/// Ordered collection of scan-chain elements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Chain(pub Vec<ChainElement>);

impl Chain {
    /// Elements visible on the scan-in side (kind ≠ output), in ordinal order.
    pub fn scan_in_order(&self) -> Vec<&ChainElement> {
        let mut elems: Vec<&ChainElement> = self
            .0
            .iter()
            .filter(|e| e.kind != ElementKind::Output)
            .collect();
        elems.sort_by_key(|e| e.ordinal);
        elems
    }

    /// Elements visible on the scan-out side (kind ≠ input), in ordinal order.
    pub fn scan_out_order(&self) -> Vec<&ChainElement> {
        let mut elems: Vec<&ChainElement> = self
            .0
            .iter()
            .filter(|e| e.kind != ElementKind::Input)
            .collect();
        elems.sort_by_key(|e| e.ordinal);
        elems
    }
}

/// Chain description embedded in a chained netlist by the insertion stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainMetadata {
    pub boundary_count: usize,
    pub internal_count: usize,
    pub order: Chain,
}

impl ChainMetadata {
    /// Extract chain metadata from a netlist file.
    pub fn extract(path: &Path) -> Result<Self, ChainError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ChainError::Io(format!("{}: {}", path.display(), e)))?;
        Self::extract_str(&content)
    }

    /// Extract chain metadata from netlist text.
    pub fn extract_str(content: &str) -> Result<Self, ChainError> {
        let start = content
            .find(METADATA_START)
            .ok_or(ChainError::MetadataNotFound)?
            + METADATA_START.len();
        let end = content[start..]
            .find(METADATA_END)
            .ok_or(ChainError::MetadataNotFound)?
            + start;
        let metadata: ChainMetadata = serde_json::from_str(&content[start..end])
            .map_err(|e| ChainError::Malformed(e.to_string()))?;
        Ok(metadata)
    }

    /// Render the metadata comment line for embedding into a netlist.
    pub fn comment(&self) -> Result<String, ChainError> {
        let json = serde_json::to_string(self).map_err(|e| ChainError::Malformed(e.to_string()))?;
        Ok(format!("{}{}{}", METADATA_START, json, METADATA_END))
    }
}

#[derive(Debug)]
pub enum ChainError {
    Io(String),
    /// No embedded metadata comment in the netlist.
    MetadataNotFound,
    Malformed(String),
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainError::Io(msg) => write!(f, "chain metadata I/O error: {}", msg),
            ChainError::MetadataNotFound => {
                write!(f, "no scan-chain metadata comment found in netlist")
            }
            ChainError::Malformed(msg) => write!(f, "malformed scan-chain metadata: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(name: &str, kind: ElementKind, ordinal: u32, width: usize) -> ChainElement {
        ChainElement {
            name: name.to_string(),
            kind,
            ordinal,
            width,
        }
    }

    #[test]
    fn test_scan_orders() {
        let chain = Chain(vec![
            element("c", ElementKind::Output, 2, 1),
            element("a", ElementKind::Input, 0, 2),
            element("b", ElementKind::BypassInput, 1, 3),
            element("d", ElementKind::BypassOutput, 3, 1),
        ]);
        let scan_in: Vec<&str> = chain.scan_in_order().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(scan_in, vec!["a", "b", "d"]);
        let scan_out: Vec<&str> = chain.scan_out_order().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(scan_out, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_extract_from_netlist_text() {
        let meta = ChainMetadata {
            boundary_count: 2,
            internal_count: 1,
            order: Chain(vec![
                element("a", ElementKind::Input, 0, 2),
                element("b", ElementKind::Output, 1, 3),
            ]),
        };
        let netlist = format!(
            "/* generated */\n{}\nmodule top (a);\n  input a;\nendmodule\n",
            meta.comment().unwrap()
        );
        let extracted = ChainMetadata::extract_str(&netlist).unwrap();
        assert_eq!(extracted.boundary_count, 2);
        assert_eq!(extracted.internal_count, 1);
        assert_eq!(extracted.order, meta.order);
    }

    #[test]
    fn test_extract_missing_metadata() {
        let err = ChainMetadata::extract_str("module top; endmodule").unwrap_err();
        match err {
            ChainError::MetadataNotFound => {}
            other => panic!("expected MetadataNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_kind_json_names() {
        let json = r#"[{"name":"x","kind":"bypassInput","ordinal":0,"width":1}]"#;
        let chain: Chain = serde_json::from_str(json).unwrap();
        assert_eq!(chain.0[0].kind, ElementKind::BypassInput);
    }
}
