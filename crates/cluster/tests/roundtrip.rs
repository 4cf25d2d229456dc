//! Integration tests for the cluster file format

use rstest::{fixture, rstest};
use wxtools_cluster::{read_cluster_file, write_cluster_file, Cluster, ClusterList};
use wxtools_field::{CoordinateSystem, FeatureSpace, Point};

/// A small two-cluster scene on a 4x4 grid
#[fixture]
fn scene() -> (FeatureSpace, ClusterList) {
    let cs = CoordinateSystem::new(
        vec!["x".to_string(), "y".to_string()],
        vec![
            (0..4).map(f64::from).collect(),
            (0..4).map(f64::from).collect(),
        ],
    )
    .unwrap();

    let mut points = Vec::new();
    for i in 0..4_usize {
        for j in 0..2_usize {
            let coordinate = vec![i as f64, j as f64];
            let mut values = coordinate.clone();
            values.push(10.0 + (i + j) as f64);
            points.push(Point::new(vec![i, j], coordinate, values));
        }
    }
    let fs = FeatureSpace::from_points(cs, vec!["reflectivity".to_string()], points);

    let mut list = ClusterList::new(
        "scan_1200.json".to_string(),
        vec!["reflectivity".to_string()],
    );
    let mut a = Cluster::new(vec![1.0, 0.5, 11.0]);
    a.id = 3;
    (0..4).for_each(|p| a.add_point(p));
    let mut b = Cluster::new(vec![3.0, 0.5, 14.0]);
    b.id = 7;
    (4..8).for_each(|p| b.add_point(p));
    list.clusters = vec![a, b];

    (fs, list)
}

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("wxtools_{}_{}.json", name, std::process::id()))
}

#[rstest]
fn write_then_read_reproduces_the_list(scene: (FeatureSpace, ClusterList)) {
    let (fs, list) = scene;
    let path = temp_path("read_back");

    write_cluster_file(&path, &list, &fs, "bandwidth=2,2,5").unwrap();
    let data = read_cluster_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(data.cluster_list.len(), 2);
    assert_eq!(data.cluster_list.source_file, list.source_file);
    assert_eq!(data.cluster_list.feature_variables, list.feature_variables);
    assert_eq!(data.run_parameters, "bandwidth=2,2,5");

    for (original, read) in list.clusters.iter().zip(&data.cluster_list.clusters) {
        assert_eq!(original.id, read.id);
        assert_eq!(original.mode, read.mode);
        assert_eq!(original.size(), read.size());
    }

    // the rebuilt arena matches point for point
    assert_eq!(data.feature_space.len(), fs.len());
    for (original, read) in fs.points.iter().zip(&data.feature_space.points) {
        assert_eq!(original.gridpoint, read.gridpoint);
        assert_eq!(original.values, read.values);
    }
}

#[rstest]
fn read_then_write_is_byte_identical(scene: (FeatureSpace, ClusterList)) {
    let (fs, list) = scene;
    let first = temp_path("first");
    let second = temp_path("second");

    write_cluster_file(&first, &list, &fs, "kernel=gaussian").unwrap();
    let data = read_cluster_file(&first).unwrap();
    write_cluster_file(
        &second,
        &data.cluster_list,
        &data.feature_space,
        &data.run_parameters,
    )
    .unwrap();

    let a = std::fs::read(&first).unwrap();
    let b = std::fs::read(&second).unwrap();
    std::fs::remove_file(&first).unwrap();
    std::fs::remove_file(&second).unwrap();

    assert_eq!(a, b);
}

#[rstest]
fn read_binds_back_references(scene: (FeatureSpace, ClusterList)) {
    let (fs, list) = scene;
    let path = temp_path("backrefs");

    write_cluster_file(&path, &list, &fs, "").unwrap();
    let data = read_cluster_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    for (index, cluster) in data.cluster_list.clusters.iter().enumerate() {
        for &p in &cluster.points {
            assert_eq!(data.feature_space.points[p].cluster, Some(index));
        }
    }
}

#[test]
fn unsupported_version_is_rejected() {
    let path = temp_path("version");
    std::fs::write(
        &path,
        r#"{
  "file_version": 99,
  "source_file": "x",
  "run_parameters": "",
  "feature_variables": [],
  "dimensions": [],
  "clusters": []
}"#,
    )
    .unwrap();

    let result = read_cluster_file(&path);
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(
        result,
        Err(wxtools_cluster::Error::UnsupportedVersion { found: 99, .. })
    ));
}
