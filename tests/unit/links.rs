//! Tests for resource link normalization

use node_rollover::cloud::resource_name;

#[test]
fn test_full_link_reduces_to_name() {
    let link = "https://compute.googleapis.com/compute/v1/projects/p/global/instanceTemplates/worker-v42";
    assert_eq!(resource_name(link), "worker-v42");
}

#[test]
fn test_relative_link_reduces_to_name() {
    assert_eq!(
        resource_name("projects/12345/zones/us-east1-b"),
        "us-east1-b"
    );
}

#[test]
fn test_bare_name_passes_through() {
    assert_eq!(resource_name("worker-v42"), "worker-v42");
}

#[test]
fn test_group_manager_creator_link() {
    assert_eq!(
        resource_name("projects/12345/regions/us-east1/instanceGroupManagers/workers"),
        "workers"
    );
}
