/// Tree build runner.
pub mod build_tree;
/// Fixture ledger runner.
pub mod create_fixture;
/// Offline artifact verification runner.
pub mod verify_tree;
