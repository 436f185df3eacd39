//! End-to-end conversion of manifest trees into frames.

use std::sync::Arc;

use rstest::{fixture, rstest};

use treeplayer::application::services::frame::frame_column;
use treeplayer::application::services::{
    draw, get_tree_info, set_alias, tree_to_frame, tree_to_frame_selected, FrameOptions, TreeLoader,
};
use treeplayer::application::ApplicationError;
use treeplayer::domain::{DomainError, InMemoryTree};
use treeplayer::infrastructure::traits::RealFileSystem;
use treeplayer::util::testing;

#[ctor::ctor]
fn init() {
    testing::init_test_setup();
}

#[fixture]
fn qa() -> InMemoryTree {
    TreeLoader::new(Arc::new(RealFileSystem))
        .load(&testing::resource("qa.toml"))
        .expect("load qa.toml")
}

#[rstest]
fn given_variables_when_converting_then_masked_columns_in_order(qa: InMemoryTree) {
    // Act
    let frame = tree_to_frame(&qa, "run:track.fX:track.fY", "", &FrameOptions::default()).unwrap();

    // Assert
    let names: Vec<_> = frame
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    assert_eq!(names, vec!["run", "track_X", "track_Y"]);
    assert_eq!(frame.num_rows(), 4);
    assert_eq!(frame_column(&frame, "track_Y").unwrap(), vec![5.0, 6.0, 7.0, 8.0]);
}

#[rstest]
#[case("bzPos", vec![2.0, 3.0])]
#[case("dEdxOK", vec![1.0, 3.0, 4.0])]
#[case("global_Warning", vec![4.0])]
#[case("bz<0&&ncl>75", vec![1.0])]
fn given_alias_selection_when_converting_then_only_selected_rows(
    qa: InMemoryTree,
    #[case] selection: &str,
    #[case] runs: Vec<f64>,
) {
    // Act
    let frame = tree_to_frame(&qa, "run", selection, &FrameOptions::default()).unwrap();

    // Assert
    assert_eq!(frame_column(&frame, "run").unwrap(), runs);
}

#[rstest]
fn given_entry_window_when_converting_then_rows_clipped(qa: InMemoryTree) {
    // Arrange
    let options = FrameOptions {
        n_entries: 10,
        first_entry: 2,
        ..Default::default()
    };

    // Act
    let frame = tree_to_frame(&qa, "run", "", &options).unwrap();

    // Assert
    assert_eq!(frame_column(&frame, "run").unwrap(), vec![3.0, 4.0]);
}

#[rstest]
fn given_friend_variable_when_converting_then_friend_values_joined(qa: InMemoryTree) {
    // Act
    let frame = tree_to_frame(
        &qa,
        "run:LHC15o_pass1.hnormChi2TPCMult_Tgl_mdEdxDist.meanG",
        "bzPos",
        &FrameOptions::default(),
    )
    .unwrap();

    // Assert
    assert_eq!(
        frame_column(&frame, "LHC15o_pass1_hnormChi2TPCMult_Tgl_mdEdxDist_meanG").unwrap(),
        vec![1.3, 1.5]
    );
}

#[rstest]
fn given_friend_alias_when_converting_then_evaluated_in_friend(qa: InMemoryTree) {
    // Act
    let frame = tree_to_frame(&qa, "LHC15o_pass1.tpcOverIts", "", &FrameOptions::default()).unwrap();

    // Assert
    let values = frame_column(&frame, "LHC15o_pass1_tpcOverIts").unwrap();
    assert_eq!(values.len(), 4);
    assert!((values[0] - 1.1 / 2.1).abs() < 1e-12);
}

#[rstest]
fn given_tree_metadata_when_converting_then_schema_carries_it(qa: InMemoryTree) {
    // Act
    let frame = tree_to_frame(&qa, "bz", "", &FrameOptions::default()).unwrap();

    // Assert
    assert_eq!(
        frame.schema().metadata().get("bz.Title").map(String::as_str),
        Some("magnetic field")
    );
}

#[rstest]
fn given_empty_variables_when_converting_then_empty_query(qa: InMemoryTree) {
    let result = tree_to_frame(&qa, " : ", "", &FrameOptions::default());

    assert!(matches!(result, Err(ApplicationError::EmptyQuery)));
}

#[rstest]
fn given_unknown_variable_when_converting_then_domain_error(qa: InMemoryTree) {
    let result = tree_to_frame(&qa, "run:noSuchBranch", "", &FrameOptions::default());

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::UnknownVariable(name))) if name == "noSuchBranch"
    ));
}

#[rstest]
fn given_include_exclude_patterns_when_converting_then_selected_leaves_become_columns(
    qa: InMemoryTree,
) {
    // Act
    let frame = tree_to_frame_selected(
        &qa,
        &[".*LHC15o.*Chi2.*meanG.*"],
        &[".*ITS.*"],
        "",
        &FrameOptions::default(),
    )
    .unwrap();

    // Assert
    let names: Vec<_> = frame
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    assert_eq!(
        names,
        vec![
            "LHC15o_pass1_hnormChi2TPCMult_Tgl_mdEdxDist_meanG",
            "LHC15o_pass1_hnormChi2TPCMult_Tgl_qPtDist_meanG",
        ]
    );
}

#[rstest]
fn given_frame_when_setting_alias_then_column_appended(qa: InMemoryTree) {
    // Arrange
    let frame = tree_to_frame(&qa, "track.fX:track.fY", "", &FrameOptions::default()).unwrap();

    // Act
    let frame = set_alias(&frame, "sum", "track_X+track_Y").unwrap();

    // Assert
    assert_eq!(frame.num_columns(), 3);
    assert_eq!(frame_column(&frame, "sum").unwrap(), vec![6.0, 8.0, 10.0, 12.0]);
}

#[rstest]
fn given_selection_when_drawing_then_entry_numbers_reported(qa: InMemoryTree) {
    let result = draw(&qa, &["ncl"], "nclOK", 100, 0).unwrap();

    assert_eq!(result.entries, vec![0, 2, 3]);
    assert_eq!(result.values, vec![vec![80.0, 90.0, 72.0]]);
}

#[rstest]
fn given_tree_when_getting_info_then_aliases_friends_and_metadata(qa: InMemoryTree) {
    let info = get_tree_info(&qa);

    assert_eq!(info.aliases.len(), 6);
    assert_eq!(info.friends.len(), 1);
    assert!(info.meta_table.contains_key("meanMIP.AxisTitle"));
}
