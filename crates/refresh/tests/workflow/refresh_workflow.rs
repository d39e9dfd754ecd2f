use crate::helpers::{Call, MockVsphere, Step, client, full_sequence, names, workflow};
use vmtools_refresh::config::{FailurePolicy, WorkflowEnv};
use vmtools_refresh::prelude::{Error, Outcome};
use vmtools_refresh::services::refresh;
use vmtools_refresh::session;

#[tokio::test]
async fn missing_templates_are_reported_and_left_alone() {
    // Arrange
    let mock = MockVsphere::default().with_template("win2022").build();

    // Act
    let report = refresh::run(&client(&mock), &names(&["rhel9", "ubuntu24"]), None, &workflow())
        .await
        .unwrap();

    // Assert
    assert_eq!(report.outcome("rhel9"), Some(&Outcome::NotFound));
    assert_eq!(report.outcome("ubuntu24"), Some(&Outcome::NotFound));
    assert!(mock.calls().is_empty());
    assert!(!report.has_failures());
}

#[tokio::test]
async fn single_template_runs_full_sequence_in_order() {
    // Arrange
    let mock = MockVsphere::default()
        .with_template("win2022")
        .with_pool("Templates")
        .build();

    // Act
    let report = refresh::run(
        &client(&mock),
        &names(&["win2022"]),
        Some("Templates"),
        &workflow(),
    )
    .await
    .unwrap();

    // Assert
    assert_eq!(report.outcome("win2022"), Some(&Outcome::Refreshed));
    assert_eq!(mock.calls(), full_sequence("vm-1", Some("resgroup-1")));
}

#[tokio::test]
async fn hardware_upgrade_can_be_skipped_or_pinned() {
    // Arrange
    let mock = MockVsphere::default()
        .with_template("win2022")
        .with_template("rhel9")
        .build();
    let skip = WorkflowEnv {
        upgrade_hardware: false,
        ..workflow()
    };
    let pinned = WorkflowEnv {
        hardware_version: Some("vmx-19".to_owned()),
        ..workflow()
    };

    // Act
    refresh::run(&client(&mock), &names(&["win2022"]), None, &skip)
        .await
        .unwrap();
    refresh::run(&client(&mock), &names(&["rhel9"]), None, &pinned)
        .await
        .unwrap();

    // Assert
    let calls = mock.calls();
    assert_eq!(
        calls[..5],
        [
            Call::MarkAsVirtualMachine("vm-1".to_owned(), None),
            Call::PowerOn("vm-1".to_owned()),
            Call::UpgradeTools("vm-1".to_owned()),
            Call::PowerOff("vm-1".to_owned()),
            Call::MarkAsTemplate("vm-1".to_owned()),
        ]
    );
    assert_eq!(
        calls[7],
        Call::UpgradeHardware("vm-2".to_owned(), Some("vmx-19".to_owned()))
    );
}

#[tokio::test]
async fn failed_power_on_stops_the_sequence() {
    // Arrange
    let mock = MockVsphere::default()
        .with_template("win2022")
        .failing(Step::PowerOn, "vm-1", "The attempted operation cannot be performed in the current state (Powered on).")
        .build();

    // Act
    let report = refresh::run(&client(&mock), &names(&["win2022"]), None, &workflow())
        .await
        .unwrap();

    // Assert
    assert_eq!(
        report.outcome("win2022"),
        Some(&Outcome::Failed(
            "Task failed: The attempted operation cannot be performed in the current state (Powered on).".to_owned()
        ))
    );
    assert_eq!(mock.calls(), full_sequence("vm-1", None)[..2].to_vec());
    assert!(report.has_failures());
}

#[tokio::test]
async fn missing_resource_pool_touches_no_template() {
    // Arrange
    let mock = MockVsphere::default()
        .with_template("win2022")
        .with_pool("Production")
        .build();

    // Act
    let result = refresh::run(
        &client(&mock),
        &names(&["win2022"]),
        Some("Templates"),
        &workflow(),
    )
    .await;

    // Assert
    match result {
        Err(Error::NotFound(what)) => assert_eq!(what, "Resource pool 'Templates'"),
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn hardware_failure_aborts_remaining_templates() {
    // Arrange
    let mock = MockVsphere::default()
        .with_template("A")
        .with_template("B")
        .failing(Step::UpgradeHardware, "vm-1", "Virtual machine compatibility is already up-to-date.")
        .build();

    // Act
    let report = refresh::run(&client(&mock), &names(&["A", "B"]), None, &workflow())
        .await
        .unwrap();

    // Assert
    assert!(matches!(report.outcome("A"), Some(Outcome::Failed(_))));
    assert_eq!(report.outcome("B"), Some(&Outcome::Skipped));
    assert_eq!(mock.calls(), full_sequence("vm-1", None)[..3].to_vec());
    assert!(mock.calls().iter().all(|call| !format!("{:?}", call).contains("vm-2")));
}

#[tokio::test]
async fn hardware_failure_continues_when_configured() {
    // Arrange
    let mock = MockVsphere::default()
        .with_template("A")
        .with_template("B")
        .failing(Step::UpgradeHardware, "vm-1", "Virtual machine compatibility is already up-to-date.")
        .build();
    let workflow = WorkflowEnv {
        on_error: FailurePolicy::Continue,
        ..workflow()
    };

    // Act
    let report = refresh::run(&client(&mock), &names(&["A", "B"]), None, &workflow)
        .await
        .unwrap();

    // Assert
    assert!(matches!(report.outcome("A"), Some(Outcome::Failed(_))));
    assert_eq!(report.outcome("B"), Some(&Outcome::Refreshed));
    let mut expected = full_sequence("vm-1", None)[..3].to_vec();
    expected.extend(full_sequence("vm-2", None));
    assert_eq!(mock.calls(), expected);
}

#[tokio::test]
async fn batch_with_missing_template_tears_session_down_once() {
    // Arrange
    let mock = MockVsphere::default()
        .with_template("win2022")
        .with_template("rhel9")
        .build();
    let templates = names(&["win2022", "ubuntu24", "rhel9"]);
    let workflow = workflow();

    // Act
    let report = session::scoped(client(&mock), |vsphere_client| {
        let templates = &templates;
        let workflow = &workflow;
        async move { refresh::run(&vsphere_client, templates, None, workflow).await }
    })
    .await
    .unwrap();

    // Assert
    assert_eq!(report.refreshed(), 2);
    assert_eq!(report.outcome("ubuntu24"), Some(&Outcome::NotFound));
    let mut expected = full_sequence("vm-1", None);
    expected.extend(full_sequence("vm-2", None));
    assert_eq!(mock.calls(), expected);
    assert_eq!(mock.disconnects(), 1);
}

#[tokio::test]
async fn first_template_with_matching_name_wins() {
    // Arrange
    let mock = MockVsphere::default()
        .with_vm("win2022", false)
        .with_template("win2022")
        .with_template("win2022")
        .build();

    // Act
    let report = refresh::run(&client(&mock), &names(&["win2022"]), None, &workflow())
        .await
        .unwrap();

    // Assert
    assert_eq!(report.outcome("win2022"), Some(&Outcome::Refreshed));
    assert_eq!(mock.calls(), full_sequence("vm-2", None));
}

#[tokio::test]
async fn dry_run_changes_nothing() {
    // Arrange
    let mock = MockVsphere::default().with_template("win2022").build();
    let workflow = WorkflowEnv {
        dry_run: true,
        ..workflow()
    };

    // Act
    let report = refresh::run(&client(&mock), &names(&["win2022", "rhel9"]), None, &workflow)
        .await
        .unwrap();

    // Assert
    assert_eq!(report.outcome("win2022"), Some(&Outcome::Planned));
    assert_eq!(report.outcome("rhel9"), Some(&Outcome::NotFound));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn tools_upgrade_is_only_awaited_on_request() {
    // Arrange
    let mock = MockVsphere::default()
        .with_template("A")
        .with_template("B")
        .failing(Step::UpgradeTools, "vm-1", "vmware-tools upgrade failed")
        .failing(Step::UpgradeTools, "vm-2", "vmware-tools upgrade failed")
        .build();
    let waiting = WorkflowEnv {
        wait_for_tools_upgrade: true,
        ..workflow()
    };

    // Act
    let fire_and_forget = refresh::run(&client(&mock), &names(&["A"]), None, &workflow())
        .await
        .unwrap();
    let awaited = refresh::run(&client(&mock), &names(&["B"]), None, &waiting)
        .await
        .unwrap();

    // Assert
    assert_eq!(fire_and_forget.outcome("A"), Some(&Outcome::Refreshed));
    assert_eq!(
        awaited.outcome("B"),
        Some(&Outcome::Failed("Task failed: vmware-tools upgrade failed".to_owned()))
    );
    assert_eq!(
        mock.calls().last(),
        Some(&Call::UpgradeTools("vm-2".to_owned()))
    );
}

#[tokio::test]
async fn lookup_error_counts_as_failure() {
    // Arrange
    let mock = MockVsphere::default().with_inventory_error().build();

    // Act
    let report = refresh::run(&client(&mock), &names(&["A", "B"]), None, &workflow())
        .await
        .unwrap();

    // Assert
    assert!(matches!(report.outcome("A"), Some(Outcome::Failed(_))));
    assert_eq!(report.outcome("B"), Some(&Outcome::Skipped));
    assert!(mock.calls().is_empty());
}
