use super::*;

#[test]
fn table_names_round_trip() {
    for table in [
        Table::Clients,
        Table::Proposals,
        Table::Transactions,
        Table::Projects,
        Table::Profiles,
        Table::UserRoles,
        Table::Settings,
    ] {
        assert_eq!(Table::parse(table.as_str()), Some(table));
    }
    assert_eq!(Table::parse("auth_users"), None);
}

#[test]
fn change_kind_maps_trigger_ops() {
    assert_eq!(ChangeKind::from_tg_op("INSERT"), Some(ChangeKind::Insert));
    assert_eq!(ChangeKind::from_tg_op("update"), Some(ChangeKind::Update));
    assert_eq!(ChangeKind::from_tg_op("DELETE"), Some(ChangeKind::Delete));
    assert_eq!(ChangeKind::from_tg_op("TRUNCATE"), None);
}

#[test]
fn rejected_errors_surface_the_backend_message() {
    let err = BackendError::Rejected("duplicate key".into());
    assert_eq!(err.to_string(), "duplicate key");
    assert_eq!(err.error_code(), "E_REMOTE");
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn infrastructure_errors_map_to_500() {
    let err = BackendError::Storage(std::io::Error::other("disk full"));
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.error_code(), "E_STORAGE");
}
