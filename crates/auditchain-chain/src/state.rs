//! Atomic persistence of chain state between runs.
//!
//! `save` never leaves a half-written state file on disk: it writes to a
//! `.tmp` sibling, then renames it into place. A process killed mid-write
//! leaves the prior file, if any, untouched; a process killed after the
//! rename has committed leaves the new one.

use std::fs;
use std::path::Path;

use auditchain_model::chain::ChainState;
use auditchain_model::error::{AuditError, AuditResult};

/// Load chain state from `path`. A missing file is not an error — it means a
/// fresh chain, and the default state `(0, zero_hash)` is returned.
pub fn load(path: &Path) -> AuditResult<ChainState> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let state: ChainState = serde_json::from_str(&contents)?;
            Ok(state.normalised())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ChainState::default()),
        Err(e) => Err(AuditError::Io(e)),
    }
}

/// Persist `state` to `path` atomically via a temp-file-then-rename.
///
/// On any failure the temp file is removed and the prior file at `path`, if
/// it existed, is left intact.
pub fn save(path: &Path, state: &ChainState) -> AuditResult<()> {
    let tmp_path = tmp_path_for(path);
    let write_result = (|| -> AuditResult<()> {
        let json = serde_json::to_vec_pretty(state)?;
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if write_result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    write_result
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::path::PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_missing_file_returns_default_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let state = load(&path).unwrap();
        assert_eq!(state, ChainState::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let state = ChainState {
            last_chain_index: 7,
            last_head_hash: "ab".repeat(32),
        };
        save(&path, &state).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn save_leaves_no_tmp_file_behind_on_success() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        save(&path, &ChainState::default()).unwrap();
        assert!(!tmp_path_for(&path).exists());
    }

    #[test]
    fn load_coerces_empty_head_hash_to_zero_hash() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"LastChainIndex":2,"LastHeadHash":""}"#).unwrap();
        let state = load(&path).unwrap();
        assert_eq!(state.last_head_hash, auditchain_model::chain::zero_hash());
    }

    #[test]
    fn save_overwrites_prior_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        save(
            &path,
            &ChainState {
                last_chain_index: 1,
                last_head_hash: "aa".repeat(32),
            },
        )
        .unwrap();
        save(
            &path,
            &ChainState {
                last_chain_index: 2,
                last_head_hash: "bb".repeat(32),
            },
        )
        .unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.last_chain_index, 2);
    }
}
