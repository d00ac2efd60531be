//! The units shipped under `database/` load and run

use std::path::PathBuf;

use docmigrate::{Migrator, SeedRequest, SeedRunner, UnitRegistry};
use docmigrate_store::{MemoryStore, Namespace};

fn database_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../database")
}

#[tokio::test]
async fn test_sample_migration_and_default_seed() {
    let root = database_root();
    let store = MemoryStore::new();
    let registry = UnitRegistry::new();
    let users = Namespace::new("datastore", "users");

    let report = Migrator::new(&store, &registry, root.join("migrations"))
        .up()
        .await
        .unwrap();
    assert_eq!(report.applied, vec!["1591998925_users_collection_migration.json"]);
    assert_eq!(store.unique_fields(&users), vec!["email".to_string()]);

    let seed_dir = root.join("seeders");
    let runner = SeedRunner::new(&store, &registry, seed_dir.join("default.json"));
    runner.run(&SeedRequest::defaults(), &seed_dir).await.unwrap();
    runner.run(&SeedRequest::named(["user_seeder"]), &seed_dir).await.unwrap();

    let documents = store.documents(&users);
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0]["email"], "test@gmail.com");
    assert_eq!(documents[0]["name"], "Mocky Mockery");

    let down = Migrator::new(&store, &registry, root.join("migrations"))
        .down()
        .await
        .unwrap();
    assert!(down.reverted.is_some());
    assert!(!store.has_collection(&users));
}
