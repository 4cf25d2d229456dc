//! Integration tests for identifier propagation across frames

use wxtools_cluster::{Cluster, ClusterList};
use wxtools_field::Point;
use wxtools_track::{Tracking, TrackingParams};

/// Build one frame from blocks of grid cells, each with an identifier
fn frame(blocks: &[(u64, (usize, usize), (usize, usize))]) -> (ClusterList, Vec<Point>) {
    let mut arena = Vec::new();
    let mut list = ClusterList::new("frame".to_string(), vec!["reflectivity".to_string()]);

    for &(id, (x0, x1), (y0, y1)) in blocks {
        let mut cluster = Cluster::new(vec![
            (x0 + x1) as f64 / 2.0,
            (y0 + y1) as f64 / 2.0,
            5.0,
        ]);
        cluster.id = id;
        for i in x0..=x1 {
            for j in y0..=y1 {
                let coordinate = vec![i as f64, j as f64];
                let mut values = coordinate.clone();
                values.push(5.0);
                cluster.add_point(arena.len());
                arena.push(Point::new(vec![i, j], coordinate, values));
            }
        }
        list.clusters.push(cluster);
    }

    (list, arena)
}

fn tracker(max_velocity: f64) -> Tracking {
    Tracking::new(TrackingParams {
        delta_t: 1.0,
        max_delta_t: 10.0,
        max_velocity,
        ..Default::default()
    })
    .unwrap()
}

fn assert_bookkeeping(current: &ClusterList, previous: &ClusterList) {
    assert!(current.tracking_performed);
    assert_eq!(
        current.tracked_ids.len() + current.new_ids.len(),
        current.len(),
        "tracked + new must cover the current frame"
    );
    for id in &current.tracked_ids {
        assert!(
            !current.new_ids.contains(id),
            "id {id} is both tracked and new"
        );
        assert!(
            previous.clusters.iter().any(|c| c.id == *id),
            "tracked id {id} missing from the previous frame"
        );
    }
    let mut ids: Vec<u64> = current.clusters.iter().map(|c| c.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), current.len(), "identifiers must be unique");
}

#[test]
fn displaced_cluster_keeps_its_identity() {
    let (mut previous, prev_arena) = frame(&[(7, (9, 11), (9, 11))]);
    let (mut current, cur_arena) = frame(&[(0, (10, 12), (10, 12))]);

    tracker(2.0)
        .track(
            &mut previous,
            &prev_arena,
            &mut current,
            &cur_arena,
            2,
            0,
            0.0,
            10.0,
        )
        .unwrap();

    assert_eq!(current.tracked_ids, vec![7]);
    assert!(current.new_ids.is_empty());
    assert!(current.dropped_ids.is_empty());
    assert_eq!(current.clusters[0].id, 7);
    assert_bookkeeping(&current, &previous);
}

#[test]
fn merge_product_is_tagged_fresh_and_parents_drop() {
    let (mut previous, prev_arena) = frame(&[
        (3, (7, 9), (7, 9)),   // cluster at (8,8)
        (5, (11, 13), (7, 9)), // cluster at (12,8)
    ]);
    // one current cluster covering both parents completely
    let (mut current, cur_arena) = frame(&[(0, (7, 13), (7, 9))]);

    tracker(3.0)
        .track(
            &mut previous,
            &prev_arena,
            &mut current,
            &cur_arena,
            2,
            0,
            0.0,
            10.0,
        )
        .unwrap();

    let id = current.clusters[0].id;
    assert!(id != 3 && id != 5, "merge product must not inherit a parent id");
    assert_eq!(current.new_ids, vec![id]);
    assert!(current.tracked_ids.is_empty());
    let mut dropped = current.dropped_ids.clone();
    dropped.sort_unstable();
    assert_eq!(dropped, vec![3, 5]);
    assert_bookkeeping(&current, &previous);
}

#[test]
fn split_products_are_tagged_fresh_and_the_parent_drops() {
    let (mut previous, prev_arena) = frame(&[(9, (7, 13), (7, 9))]);
    let (mut current, cur_arena) = frame(&[
        (0, (7, 9), (7, 9)),   // left fragment
        (0, (11, 13), (7, 9)), // right fragment
    ]);

    tracker(3.0)
        .track(
            &mut previous,
            &prev_arena,
            &mut current,
            &cur_arena,
            2,
            0,
            0.0,
            10.0,
        )
        .unwrap();

    for cluster in &current.clusters {
        assert_ne!(cluster.id, 9, "split products must not keep the parent id");
    }
    assert_eq!(current.new_ids.len(), 2);
    assert!(current.tracked_ids.is_empty());
    assert_eq!(current.dropped_ids, vec![9]);
    assert_bookkeeping(&current, &previous);
}

#[test]
fn vanished_cluster_is_dropped() {
    let (mut previous, prev_arena) = frame(&[
        (7, (9, 11), (9, 11)),
        (8, (20, 22), (20, 22)), // disappears this frame
    ]);
    let (mut current, cur_arena) = frame(&[(0, (10, 12), (10, 12))]);

    tracker(2.0)
        .track(
            &mut previous,
            &prev_arena,
            &mut current,
            &cur_arena,
            2,
            0,
            0.0,
            10.0,
        )
        .unwrap();

    assert_eq!(current.tracked_ids, vec![7]);
    assert_eq!(current.dropped_ids, vec![8]);
    assert_bookkeeping(&current, &previous);
}

#[test]
fn appeared_cluster_gets_the_next_unused_id() {
    let (mut previous, prev_arena) = frame(&[(7, (9, 11), (9, 11))]);
    let (mut current, cur_arena) = frame(&[
        (0, (9, 11), (9, 11)),   // continuation of 7
        (0, (20, 22), (20, 22)), // newcomer, out of reach
    ]);

    tracker(2.0)
        .track(
            &mut previous,
            &prev_arena,
            &mut current,
            &cur_arena,
            2,
            0,
            0.0,
            10.0,
        )
        .unwrap();

    assert_eq!(current.tracked_ids, vec![7]);
    assert_eq!(current.new_ids, vec![8], "next id is one past the maximum");
    assert!(current.dropped_ids.is_empty());
    assert_bookkeeping(&current, &previous);
}

#[test]
fn excessive_time_delta_starts_a_fresh_series() {
    let (mut previous, prev_arena) = frame(&[(7, (9, 11), (9, 11))]);
    let (mut current, cur_arena) = frame(&[(0, (9, 11), (9, 11))]);

    let tracking = Tracking::new(TrackingParams {
        delta_t: 100.0,
        max_delta_t: 10.0,
        ..Default::default()
    })
    .unwrap();
    tracking
        .track(
            &mut previous,
            &prev_arena,
            &mut current,
            &cur_arena,
            2,
            0,
            0.0,
            10.0,
        )
        .unwrap();

    assert!(current.tracked_ids.is_empty());
    assert_eq!(current.new_ids, vec![8]);
    assert_eq!(current.dropped_ids, vec![7]);
    assert_bookkeeping(&current, &previous);
}

#[test]
fn velocity_constraint_blocks_distant_matches() {
    let (mut previous, prev_arena) = frame(&[(7, (0, 2), (0, 2))]);
    // same shape but far across the grid
    let (mut current, cur_arena) = frame(&[(0, (30, 32), (30, 32))]);

    tracker(2.0)
        .track(
            &mut previous,
            &prev_arena,
            &mut current,
            &cur_arena,
            2,
            0,
            0.0,
            10.0,
        )
        .unwrap();

    assert!(current.tracked_ids.is_empty());
    assert_eq!(current.new_ids, vec![8]);
    assert_eq!(current.dropped_ids, vec![7]);
    assert_bookkeeping(&current, &previous);
}

#[test]
fn mean_velocity_constraint_admits_within_the_running_mean() {
    // the hard limit is too small, but the seeded mean velocity allows it
    let (mut previous, prev_arena) = frame(&[(4, (9, 11), (9, 11))]);
    let (mut current, cur_arena) = frame(&[(0, (12, 14), (9, 11))]);

    let tracking = Tracking::new(TrackingParams {
        delta_t: 1.0,
        max_delta_t: 10.0,
        max_velocity: 2.0,
        use_mean_velocity_constraint: true,
        mean_velocity_security: 2.0,
        ..Default::default()
    })
    .unwrap();
    tracking
        .track(
            &mut previous,
            &prev_arena,
            &mut current,
            &cur_arena,
            2,
            0,
            0.0,
            10.0,
        )
        .unwrap();

    // displacement 3 > 2, but <= mean (2) * security (2) * delta_t
    assert_eq!(current.tracked_ids, vec![4]);
    assert_bookkeeping(&current, &previous);
}
