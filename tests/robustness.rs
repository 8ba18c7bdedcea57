use geo::Area;
use geo_dissolve::{MergeError, Merger};
use geo_types::{Geometry, LineString, Polygon};

fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![
            (x, y),
            (x + size, y),
            (x + size, y + size),
            (x, y + size),
            (x, y),
        ]),
        vec![],
    )
}

#[test]
fn test_nan_coordinate_fails_the_whole_call() {
    let mut merger = Merger::new();
    merger.add_geometry(square(0.0, 0.0, 1.0).into());
    merger.add_geometry(
        Polygon::new(
            LineString::from(vec![
                (5.0, 5.0),
                (6.0, f64::NAN),
                (6.0, 6.0),
                (5.0, 6.0),
                (5.0, 5.0),
            ]),
            vec![],
        )
        .into(),
    );

    let err = merger.merge().unwrap_err();
    assert!(matches!(err, MergeError::InvalidGeometry(_)));
}

#[test]
fn test_non_areal_input_fails_the_whole_call() {
    let mut merger = Merger::new();
    merger.add_geometry(square(0.0, 0.0, 1.0).into());
    merger.add_geometry(Geometry::LineString(LineString::from(vec![
        (0.0, 0.0),
        (1.0, 1.0),
    ])));

    let err = merger.merge().unwrap_err();
    assert!(matches!(err, MergeError::InvalidGeometry(_)));
}

#[test]
fn test_coincident_pair_fails_only_its_own_group() {
    // Two identical squares cancel every arc of their group, which leaves
    // no boundary to reassemble. The isolated third square must still come
    // through.
    let mut merger = Merger::new();
    merger.add_geometry(square(0.0, 0.0, 1.0).into());
    merger.add_geometry(square(0.0, 0.0, 1.0).into());
    merger.add_geometry(square(5.0, 5.0, 1.0).into());

    let output = merger.merge().unwrap();
    assert_eq!(output.features.len(), 1);
    assert_eq!(output.features[0].members, vec![2]);

    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].members, vec![0, 1]);
    assert!(matches!(
        output.failures[0].reason,
        MergeError::UnresolvableTopology(_)
    ));
}

#[test]
fn test_clockwise_inputs_are_normalized() {
    // Same touching pair, but wound clockwise. Winding is normalized before
    // topology construction, so the merge still works and the output shell
    // is CCW.
    let cw = |x: f64| {
        Polygon::new(
            LineString::from(vec![
                (x, 0.0),
                (x, 1.0),
                (x + 1.0, 1.0),
                (x + 1.0, 0.0),
                (x, 0.0),
            ]),
            vec![],
        )
    };

    let mut merger = Merger::new();
    merger.add_geometry(cw(0.0).into());
    merger.add_geometry(cw(1.0).into());

    let output = merger.merge().unwrap();
    assert_eq!(output.features.len(), 1);

    let poly = match &output.features[0].geometry {
        Geometry::Polygon(p) => p,
        other => panic!("expected a polygon, got {:?}", other),
    };
    assert!(Polygon::new(poly.exterior().clone(), vec![]).signed_area() > 0.0);
    assert!((poly.unsigned_area() - 2.0).abs() < 1e-9);
}

#[test]
fn test_shared_edge_must_match_exactly() {
    // The neighbor's left edge spans the same wall but is split into two
    // segments, so no single arc matches and nothing merges. Input repair
    // is out of scope.
    let split_edge = Polygon::new(
        LineString::from(vec![
            (1.0, 0.0),
            (2.0, 0.0),
            (2.0, 1.0),
            (1.0, 1.0),
            (1.0, 0.5),
            (1.0, 0.0),
        ]),
        vec![],
    );

    let mut merger = Merger::new();
    merger.add_geometry(square(0.0, 0.0, 1.0).into());
    merger.add_geometry(split_edge.into());

    let output = merger.merge().unwrap();
    assert_eq!(output.features.len(), 2);
}

#[test]
fn test_large_batch_of_isolated_squares() {
    let mut merger = Merger::new();
    for i in 0..100 {
        merger.add_geometry(square(3.0 * i as f64, 0.0, 1.0).into());
    }

    let output = merger.merge().unwrap();
    assert_eq!(output.features.len(), 100);
    for (i, feature) in output.features.iter().enumerate() {
        assert_eq!(feature.members, vec![i]);
    }
}
