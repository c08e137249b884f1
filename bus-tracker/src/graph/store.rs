//! Reading and writing the graph artifact.

use std::path::Path;

use super::error::GraphError;
use super::model::NetworkGraph;

/// Load a graph artifact from disk.
pub fn load(path: impl AsRef<Path>) -> Result<NetworkGraph, GraphError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| GraphError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&contents)?)
}

/// Save a graph artifact as pretty JSON.
///
/// Creates parent directories if they don't exist.
pub fn save(graph: &NetworkGraph, path: impl AsRef<Path>) -> Result<(), GraphError> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|source| GraphError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let json = serde_json::to_string_pretty(graph)?;

    std::fs::write(path, json).map_err(|source| GraphError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Coordinate, RouteKey};
    use crate::live::SnapshotStop;
    use chrono::Utc;
    use tempfile::tempdir;

    fn sample() -> NetworkGraph {
        let mut g = NetworkGraph::new("https://example.test/");
        let key: RouteKey = "33_0".parse().unwrap();
        g.record_route(
            &key,
            &[
                SnapshotStop::new("M1", "Barra").with_coordinate(Coordinate {
                    lat: 22.186,
                    lon: 113.533,
                }),
                SnapshotStop::new("M2", "Lilau"),
            ],
        );
        g.stops.get_mut("M2").unwrap().alias = Some("P2".to_string());
        g.refresh_meta(Utc::now());
        g
    }

    #[test]
    fn save_and_load_graph() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("graph.json");
        let graph = sample();

        save(&graph, &path).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded, graph);
        assert!(loaded.check_consistency().is_ok());
        assert_eq!(loaded.stop("M2").unwrap().coordinate, None);
        assert_eq!(loaded.stop("M2").unwrap().alias.as_deref(), Some("P2"));
    }

    #[test]
    fn load_missing_file() {
        let dir = tempdir().unwrap();
        let err = load(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, GraphError::Io { .. }));
    }

    #[test]
    fn load_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load(&path), Err(GraphError::Json(_))));
    }
}
