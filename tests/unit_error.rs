use std::path::PathBuf;

use taskboard::error::{exit_codes, Error, JsonError};

#[test]
fn exit_codes_map_correctly() {
    let user = Error::InvalidArgument("bad".to_string());
    assert_eq!(user.exit_code(), exit_codes::USER_ERROR);

    let validation = Error::DuplicateFieldName("Owner".to_string());
    assert_eq!(validation.exit_code(), exit_codes::USER_ERROR);
    assert!(validation.is_validation());

    let op = Error::LockFailed(PathBuf::from("task-storage.json.lock"));
    assert_eq!(op.exit_code(), exit_codes::OPERATION_FAILED);
    assert!(!op.is_validation());
}

#[test]
fn json_error_includes_code_and_details() {
    let err = Error::InvalidIndex { index: 7, len: 3 };
    let json = JsonError::from(&err);
    assert_eq!(json.code, exit_codes::USER_ERROR);
    assert!(json.error.contains("Index out of range"));
    let details = json.details.expect("details");
    assert_eq!(details["index"], 7);
    assert_eq!(details["len"], 3);
}

#[test]
fn lookup_errors_carry_no_details() {
    let err = Error::TaskNotFound("01abc".to_string());
    assert!(err.details().is_none());
    assert_eq!(err.to_string(), "Task not found: 01abc");
}
