//! Captured variables stay with their repository across steps

use heddle::outcome::OutcomeKind;
use std::fs;

use super::helpers::*;

#[test]
fn test_captured_values_do_not_leak_between_repositories() {
    let fleet = Fleet::new();
    let names = ["api", "web", "cli", "docs"];
    for name in names {
        fleet.add_repo(name);
    }

    let run = run_workflow(
        &fleet,
        r#"
max_parallel: 4
variables:
  team: platform
steps:
  - name: capture
    command: tasks apply
    with:
      tasks:
        - name: capture
          actions:
            - {type: shell, command: "basename \"$(pwd)\"", capture: dir}
  - name: stamp
    after: [capture]
    command: tasks apply
    with:
      tasks:
        - name: stamp
          files:
            - {path: OWNER, content: "${team}/${dir}\n"}
          commit: "Stamp ${dir}"
"#,
        false,
    );

    for name in names {
        let repo = fleet.path(name);
        assert_eq!(
            fs::read_to_string(repo.join("OWNER")).unwrap(),
            format!("platform/{name}\n")
        );
        assert_eq!(git(&repo, &["log", "-1", "--format=%s"]), format!("Stamp {name}"));
        assert_eq!(
            run.summary.outcome(&repo, "stamp").map(|o| o.kind),
            Some(OutcomeKind::Applied)
        );
    }

    // Nothing captured per repository reaches the base environment
    assert_eq!(run.env.variables.get("dir"), None);
    assert_eq!(run.env.variables.get("team").as_deref(), Some("platform"));
}
