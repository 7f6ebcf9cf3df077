//! Gherkin ingestion and step-definition linking, plus test-to-code
//! links.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use cartograph_core::graph::{NodeLabel, PropValue, RelType};
use cartograph_core::store::{GraphSnapshot, MemoryGraph};
use cartograph_core::{GraphUpdater, IngestConfig};

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

async fn ingest(files: &[(&str, &str)]) -> (GraphUpdater, String, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    for (relative, content) in files {
        write(dir.path(), relative, content);
    }
    let mut config = IngestConfig::for_repo(dir.path());
    config.enable_vcs = false;
    let project = config.project_name();
    let mut updater = GraphUpdater::new(Arc::new(MemoryGraph::new()), config);
    updater.ingest().await.expect("ingestion should succeed");
    (updater, project, dir)
}

fn snapshot(updater: &GraphUpdater) -> &GraphSnapshot {
    updater.snapshot().unwrap()
}

const LOGIN_FEATURE: &str = "\
Feature: Login
  Signing in to the dashboard.

  Scenario: Existing user signs in
    Given I am logged in
    When I open the dashboard
    Then I see my name
";

const STEPS_PY: &str = "\
from behave import given, when, then

@given('I am logged in')
def step_logged_in(context):
    pass

@when('I open the dashboard')
def step_open_dashboard(context):
    pass

@then('I see my name')
def step_see_name(context):
    pass
";

#[tokio::test]
async fn gherkin_scenario_links_to_step_definitions() {
    let (updater, _p, _dir) = ingest(&[
        ("features/login.feature", LOGIN_FEATURE),
        ("features/steps/login_steps.py", STEPS_PY),
    ])
    .await;
    let graph = snapshot(&updater);

    let feature_qn = "features/login.feature.Login";
    let scenario_qn = format!("{feature_qn}.Existing_user_signs_in");
    assert!(graph.has_node(NodeLabel::BddFeature, feature_qn));
    assert!(graph.has_node(NodeLabel::BddScenario, &scenario_qn));
    assert!(graph.has_rel(
        (NodeLabel::BddScenario, &scenario_qn),
        RelType::InFeature,
        (NodeLabel::BddFeature, feature_qn),
    ));

    // steps carry normalized keywords and sit in the scenario
    let given_qn = format!("{scenario_qn}.step_0");
    let step = &graph.nodes[&(NodeLabel::BddStep, given_qn.clone())];
    assert_eq!(step.get("keyword"), Some(&PropValue::Str("given".into())));
    assert!(graph.has_rel(
        (NodeLabel::BddStep, &given_qn),
        RelType::InScenario,
        (NodeLabel::BddScenario, &scenario_qn),
    ));

    // linking: IMPLEMENTS_STEP plus the keyword-specific edge
    let implements = graph.rels_of(RelType::ImplementsStep);
    assert_eq!(implements.len(), 3, "{implements:?}");
    assert!(implements
        .iter()
        .any(|(src, dst)| src == &given_qn && dst.ends_with("login_steps.step_logged_in")));

    let given_links = graph.rels_of(RelType::GivenLinksTo);
    assert_eq!(given_links.len(), 1);
    assert!(given_links[0].1.ends_with("login_steps.step_logged_in"));
    assert_eq!(graph.rels_of(RelType::WhenLinksTo).len(), 1);
    assert_eq!(graph.rels_of(RelType::ThenLinksTo).len(), 1);
}

#[tokio::test]
async fn pytest_case_links_to_code_under_test() {
    let (updater, p, _dir) = ingest(&[
        ("calc.py", "def add(a, b):\n    return a + b\n"),
        (
            "test_calc.py",
            "from calc import add\n\ndef test_add():\n    assert add(2, 3) == 5\n",
        ),
    ])
    .await;
    let graph = snapshot(&updater);

    let case_qn = format!("{p}.test_calc.test_add");
    assert!(graph.has_node(NodeLabel::TestCase, &case_qn));
    assert!(graph.has_rel(
        (NodeLabel::TestCase, &case_qn),
        RelType::Tests,
        (NodeLabel::Function, &format!("{p}.calc.add")),
    ));

    // the assertion line hangs off the case
    let asserts = graph.rels_of(RelType::Asserts);
    assert_eq!(asserts.len(), 1, "{asserts:?}");
    let assertion_qn = &asserts[0].1;
    assert!(graph.has_rel(
        (NodeLabel::Assertion, assertion_qn),
        RelType::InTest,
        (NodeLabel::TestCase, &case_qn),
    ));
}

#[tokio::test]
async fn test_suites_group_cases() {
    let (updater, p, _dir) = ingest(&[
        (
            "tests/test_account.py",
            "class TestAccount:\n    def test_open(self):\n        assert True\n\n    def test_close(self):\n        assert True\n",
        ),
    ])
    .await;
    let graph = snapshot(&updater);

    let suite_qn = format!("{p}.tests.test_account.TestAccount");
    assert!(graph.has_node(NodeLabel::TestSuite, &suite_qn));
    assert!(graph.has_rel(
        (NodeLabel::TestCase, &format!("{suite_qn}.test_open")),
        RelType::InSuite,
        (NodeLabel::TestSuite, &suite_qn),
    ));
    assert!(graph.has_rel(
        (NodeLabel::TestCase, &format!("{suite_qn}.test_close")),
        RelType::InSuite,
        (NodeLabel::TestSuite, &suite_qn),
    ));
}

#[tokio::test]
async fn javascript_describe_blocks_become_suites() {
    let (updater, p, _dir) = ingest(&[
        ("src/math.ts", "export function double(x: number) {\n  return x * 2;\n}\n"),
        (
            "src/math.test.ts",
            "import { double } from './math';\n\ndescribe('double', () => {\n  it('doubles numbers', () => {\n    expect(double(2)).toBe(4);\n  });\n});\n",
        ),
    ])
    .await;
    let graph = snapshot(&updater);

    let suite_qn = format!("{p}.src.math.test.double");
    assert!(graph.has_node(NodeLabel::TestSuite, &suite_qn));
    let case_qn = format!("{suite_qn}.doubles_numbers");
    assert!(graph.has_node(NodeLabel::TestCase, &case_qn));
    assert!(graph.has_rel(
        (NodeLabel::TestCase, &case_qn),
        RelType::InSuite,
        (NodeLabel::TestSuite, &suite_qn),
    ));
    assert!(graph.has_rel(
        (NodeLabel::TestCase, &case_qn),
        RelType::Tests,
        (NodeLabel::Function, &format!("{p}.src.math.double")),
    ));
}

#[tokio::test]
async fn skip_tests_excludes_test_files_entirely() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "calc.py", "def add(a, b):\n    return a + b\n");
    write(dir.path(), "test_calc.py", "def test_add():\n    assert True\n");

    let mut config = IngestConfig::for_repo(dir.path());
    config.enable_vcs = false;
    config.skip_tests = true;
    let project = config.project_name();

    let mut updater = GraphUpdater::new(Arc::new(MemoryGraph::new()), config);
    updater.ingest().await.unwrap();
    let graph = updater.snapshot().unwrap();

    assert!(graph.has_node(NodeLabel::Function, &format!("{project}.calc.add")));
    assert!(!graph.has_node(NodeLabel::Module, &format!("{project}.test_calc")));
    assert!(graph.rels_of(RelType::Tests).is_empty());
}
