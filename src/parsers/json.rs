//! # JSON 结构格式
//!
//! `Crystal` 的 serde JSON 形式：
//! ```json
//! {"name": "X", "lattice": {"matrix": [[4,0,0],[0,4,0],[0,0,4]]},
//!  "atoms": [{"element": "X", "position": [0,0,0]}]}
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `serde_json`

use crate::error::{CrystanError, Result};
use crate::models::Crystal;

use std::fs;
use std::path::Path;

pub fn parse_json_file(path: &Path) -> Result<Crystal> {
    let content = fs::read_to_string(path).map_err(|e| CrystanError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_json_content(&content).map_err(|e| CrystanError::ParseError {
        format: "JSON".to_string(),
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

pub fn parse_json_content(content: &str) -> Result<Crystal> {
    Ok(serde_json::from_str(content)?)
}

pub fn to_json_string(crystal: &Crystal) -> Result<String> {
    Ok(serde_json::to_string_pretty(crystal)?)
}

pub fn write_json(crystal: &Crystal, path: &Path) -> Result<()> {
    fs::write(path, to_json_string(crystal)?).map_err(|e| CrystanError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Atom, Lattice};
    use tempfile::tempdir;

    #[test]
    fn test_minimal_document() {
        let content = r#"{
            "name": "X",
            "lattice": {"matrix": [[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]]},
            "atoms": [{"element": "X", "position": [0.0, 0.0, 0.0]}]
        }"#;
        let crystal = parse_json_content(content).unwrap();
        assert_eq!(crystal.atoms.len(), 1);
        assert_eq!(crystal.atoms[0].label, None);
        assert_eq!(crystal.lattice.lengths()[2], 4.0);
    }

    #[test]
    fn test_file_round_trip() {
        let crystal = Crystal::new(
            "NaCl",
            Lattice::cubic(5.64),
            vec![
                Atom::new("Na", [0.0, 0.0, 0.0]),
                Atom::new("Cl", [0.5, 0.5, 0.5]).with_label("Cl1"),
            ],
        );
        let dir = tempdir().unwrap();
        let path = dir.path().join("nacl.json");
        write_json(&crystal, &path).unwrap();
        assert_eq!(parse_json_file(&path).unwrap(), crystal);
    }

    #[test]
    fn test_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{\"name\": 1}").unwrap();
        assert!(matches!(
            parse_json_file(&path),
            Err(CrystanError::ParseError { .. })
        ));
    }
}
