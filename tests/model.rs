//! Integration tests which load the bundled demos.
use portfolio_match::input::load_model;
use portfolio_match::model::parameters::GoalType;
use std::path::PathBuf;

/// Get the path to a bundled demo.
fn get_model_dir(name: &str) -> PathBuf {
    PathBuf::from("demos").join(name)
}

/// An integration test which attempts to load the simple demo
#[test]
fn test_load_simple() {
    let model = load_model(get_model_dir("simple")).unwrap();
    assert_eq!(model.parameters.goal_type, GoalType::Annual);
    assert_eq!(model.iter_periods().count(), 2);
    assert_eq!(model.projects.len(), 4);
    assert_eq!(model.iter_storage().count(), 1);
    assert!(model.active_resource_adequacy().is_none());
}

/// The hourly demo carries resource adequacy inputs
#[test]
fn test_load_hourly() {
    let model = load_model(get_model_dir("hourly")).unwrap();
    assert_eq!(model.parameters.goal_type, GoalType::Hourly);
    assert!(model.active_resource_adequacy().is_some());
}
