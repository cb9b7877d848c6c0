// Bootstrap sequence tests against a scripted python/pip
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::Path;
use tempfile::TempDir;

use venv_wrapper::error::{exit_codes, EnvironmentError, InstallerError, WrapperError};
use venv_wrapper::{BootstrapConfig, Bootstrapper, Resolution};

use test_utils::FakePython;

const BASE_PYTHON: &str = "/usr/bin/python3";

fn config_for(dir: &TempDir) -> BootstrapConfig {
    BootstrapConfig::new(dir.path()).with_python(BASE_PYTHON)
}

fn bootstrapper(dir: &TempDir, fake: FakePython) -> Bootstrapper<FakePython> {
    Bootstrapper::with_runner(config_for(dir), fake)
}

fn write_script(dir: &TempDir, name: &str, source: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, source).unwrap();
    path
}

fn modules(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[test]
fn test_environment_is_created_once() {
    let dir = TempDir::new().unwrap();
    let boot = bootstrapper(&dir, FakePython::new());
    let venv = boot.environment();
    assert!(!venv.exists());

    assert!(boot.create_environment(&venv).unwrap());
    assert!(venv.exists());
    assert_eq!(boot.runner().venv_creations(), 1);

    // Second invocation on the same path is a no-op
    assert!(!boot.create_environment(&venv).unwrap());
    assert_eq!(boot.runner().venv_creations(), 1);

    // A fresh bootstrapper (a new run) reuses it as well
    let again = bootstrapper(&dir, FakePython::new());
    assert!(!again.create_environment(&again.environment()).unwrap());
    assert_eq!(again.runner().venv_creations(), 0);
}

#[test]
fn test_environment_creation_uses_configured_interpreter() {
    let dir = TempDir::new().unwrap();
    let boot = bootstrapper(&dir, FakePython::new());
    boot.create_environment(&boot.environment()).unwrap();

    let call = boot.runner().last_call().unwrap();
    assert_eq!(call.command, Path::new(BASE_PYTHON));
    assert_eq!(
        call.args,
        vec![
            OsString::from("-m"),
            OsString::from("venv"),
            dir.path().join(".venv").into_os_string()
        ]
    );
}

#[test]
fn test_environment_creation_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut fake = FakePython::new();
    fake.venv_creation_broken = true;
    let boot = bootstrapper(&dir, fake);

    let err = boot.create_environment(&boot.environment()).unwrap_err();
    assert_eq!(err.exit_code(), exit_codes::ENVIRONMENT_ERROR);
    match err {
        WrapperError::Environment(env_err) => match *env_err {
            EnvironmentError::CreationFailed { ref stderr, .. } => {
                assert!(stderr.contains("ensurepip"))
            }
            ref other => panic!("Expected CreationFailed, got {other:?}"),
        },
        other => panic!("Expected environment error, got {other:?}"),
    }
}

#[test]
fn test_scan_yields_top_level_modules() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "app.py", "import foo\nfrom bar import baz\n");
    let boot = bootstrapper(&dir, FakePython::new());

    let resolution = boot
        .resolve_dependencies(&boot.environment(), &script)
        .unwrap();
    assert_eq!(resolution, Resolution::Scanned(modules(&["bar", "foo"])));
    assert!(boot.runner().calls.borrow().is_empty());
}

#[test]
fn test_local_modules_are_not_dependencies() {
    let dir = TempDir::new().unwrap();
    write_script(&dir, "helpers.py", "def help(): pass\n");
    let script = write_script(&dir, "app.py", "import helpers\nimport requests\n");
    let boot = bootstrapper(&dir, FakePython::new());

    let resolution = boot
        .resolve_dependencies(&boot.environment(), &script)
        .unwrap();
    assert_eq!(resolution, Resolution::Scanned(modules(&["requests"])));
}

#[test]
fn test_script_without_imports_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "app.py", "print('hello')\n");
    let boot = bootstrapper(&dir, FakePython::new());
    let venv = boot.environment();

    let resolution = boot.resolve_dependencies(&venv, &script).unwrap();
    let pending = resolution.pending_modules().unwrap();
    assert!(pending.is_empty());

    let report = boot.install_dependencies(pending, &venv).unwrap();
    assert!(report.installed.is_empty());
    assert!(boot.runner().calls.borrow().is_empty());
}

#[test]
fn test_manifest_skips_scanning() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("requirements.txt"), "requests==2.31.0\n").unwrap();
    let boot = bootstrapper(&dir, FakePython::new());

    // The script does not exist: scanning it would fail
    let missing_script = dir.path().join("missing.py");
    let resolution = boot
        .resolve_dependencies(&boot.environment(), &missing_script)
        .unwrap();

    assert_eq!(
        resolution,
        Resolution::Manifest(dir.path().join("requirements.txt"))
    );
    assert!(resolution.pending_modules().is_none());

    let pip_calls = boot.runner().pip_calls();
    assert_eq!(pip_calls.len(), 1);
    assert_eq!(pip_calls[0][0], "install");
    assert_eq!(pip_calls[0][1], "-r");
    assert!(pip_calls[0][2].ends_with("requirements.txt"));
}

#[test]
fn test_manifest_run_never_enumerates_stdlib() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("requirements.txt"), "requests\n").unwrap();
    let script = write_script(&dir, "app.py", "import numpy\n");
    let boot = bootstrapper(&dir, FakePython::new());

    let code = boot.run(&script, &[]).unwrap();
    assert_eq!(code, 0);

    let lines = boot.runner().command_lines();
    assert!(!lines.iter().any(|l| l.contains("stdlib_list.stdlib_list(")));
    assert!(!boot
        .runner()
        .installed_by_pip()
        .contains(&"numpy".to_string()));
}

#[test]
fn test_stdlib_modules_never_reach_the_installer() {
    let dir = TempDir::new().unwrap();
    let boot = bootstrapper(&dir, FakePython::new());
    let venv = boot.environment();

    let report = boot
        .install_dependencies(&modules(&["json", "os", "requests", "sys"]), &venv)
        .unwrap();

    assert_eq!(report.builtin, vec!["json", "os", "sys"]);
    assert_eq!(report.installed, vec!["requests"]);
    for args in boot.runner().pip_calls() {
        for builtin in ["json", "os", "sys"] {
            assert!(
                !args.iter().any(|a| a == builtin),
                "stdlib module {builtin} passed to pip: {args:?}"
            );
        }
    }
}

#[test]
fn test_stdlib_lookup_uses_environment_version() {
    let dir = TempDir::new().unwrap();
    let mut fake = FakePython::new();
    fake.version = "3.9.18".to_string();
    let boot = bootstrapper(&dir, fake);

    boot.install_dependencies(&modules(&["requests"]), &boot.environment())
        .unwrap();

    let lines = boot.runner().command_lines();
    assert!(lines
        .iter()
        .any(|l| l.contains("stdlib_list.stdlib_list(\"3.9\")")));
}

#[test]
fn test_dotenv_is_translated_before_install() {
    let dir = TempDir::new().unwrap();
    let boot = bootstrapper(&dir, FakePython::new());

    let report = boot
        .install_dependencies(&modules(&["dotenv"]), &boot.environment())
        .unwrap();

    assert_eq!(report.installed, vec!["python-dotenv"]);
    let pip_calls = boot.runner().pip_calls();
    assert_eq!(pip_calls[0], vec!["show", "python-dotenv"]);
    assert_eq!(pip_calls[1], vec!["install", "python-dotenv"]);
    assert!(!pip_calls.iter().flatten().any(|a| a == "dotenv"));
}

#[test]
fn test_configured_aliases_and_ignores() {
    let dir = TempDir::new().unwrap();
    let mut config = config_for(&dir).with_alias("jwt", "PyJWT");
    config.ignore_modules.push("internal_sdk".to_string());
    let boot = Bootstrapper::with_runner(config, FakePython::new());

    let report = boot
        .install_dependencies(&modules(&["internal_sdk", "jwt"]), &boot.environment())
        .unwrap();

    assert_eq!(report.ignored, vec!["internal_sdk"]);
    assert_eq!(report.installed, vec!["PyJWT"]);
}

#[test]
fn test_already_installed_packages_are_not_reinstalled() {
    let dir = TempDir::new().unwrap();
    let boot = bootstrapper(&dir, FakePython::new().with_installed("requests"));

    let report = boot
        .install_dependencies(&modules(&["requests"]), &boot.environment())
        .unwrap();

    assert_eq!(report.already_installed, vec!["requests"]);
    assert!(report.installed.is_empty());
    assert!(boot.runner().installed_by_pip().is_empty());
}

#[test]
fn test_install_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut fake = FakePython::new();
    fake.failing_packages.insert("nonexistent-pkg".to_string());
    let boot = bootstrapper(&dir, fake);

    let err = boot
        .install_dependencies(
            &modules(&["nonexistent-pkg", "requests"]),
            &boot.environment(),
        )
        .unwrap_err();

    assert_eq!(err.exit_code(), exit_codes::INSTALLER_ERROR);
    match err {
        WrapperError::Installer(inner) => match *inner {
            InstallerError::InstallFailed { ref package, .. } => {
                assert_eq!(package, "nonexistent-pkg")
            }
            ref other => panic!("Expected InstallFailed, got {other:?}"),
        },
        other => panic!("Expected installer error, got {other:?}"),
    }
    // Nothing after the failing package was attempted
    assert!(!boot
        .runner()
        .installed_by_pip()
        .contains(&"requests".to_string()));
}

#[test]
fn test_stdlib_enumeration_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut fake = FakePython::new();
    fake.stdlib_broken = true;
    let boot = bootstrapper(&dir, fake);

    let err = boot
        .install_dependencies(&modules(&["requests"]), &boot.environment())
        .unwrap_err();

    assert_eq!(err.exit_code(), exit_codes::STDLIB_ERROR);
    assert!(boot.runner().installed_by_pip().is_empty());
}

#[test]
fn test_support_library_installed_when_missing() {
    let dir = TempDir::new().unwrap();
    let boot = bootstrapper(&dir, FakePython::new());
    boot.ensure_support_library(&boot.environment()).unwrap();

    assert_eq!(boot.runner().installed_by_pip(), vec!["stdlib-list"]);
    let probes = boot
        .runner()
        .command_lines()
        .iter()
        .filter(|l| l.contains("import stdlib_list;"))
        .count();
    assert_eq!(probes, 2);
}

#[test]
fn test_support_library_probe_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut fake = FakePython::new();
    fake.support_library_broken = true;
    let boot = bootstrapper(&dir, fake);

    let err = boot
        .ensure_support_library(&boot.environment())
        .unwrap_err();
    assert_eq!(err.exit_code(), exit_codes::PROBE_ERROR);
    assert!(err.user_message(false).contains("No module named"));
}

#[test]
fn test_full_run_installs_inferred_dependencies() {
    let dir = TempDir::new().unwrap();
    write_script(&dir, "helpers.py", "");
    let script = write_script(
        &dir,
        "app.py",
        "import os\nimport requests\nfrom dotenv import load_dotenv\nimport helpers\n",
    );
    let boot = bootstrapper(&dir, FakePython::new());

    let code = boot.run(Path::new("app.py"), &[]).unwrap();
    assert_eq!(code, 0);

    let fake = boot.runner();
    assert_eq!(fake.venv_creations(), 1);
    assert_eq!(
        fake.installed_by_pip(),
        vec!["stdlib-list", "python-dotenv", "requests"]
    );

    let upgrades: Vec<_> = fake
        .pip_calls()
        .into_iter()
        .filter(|args| args.get(1).map(String::as_str) == Some("--upgrade"))
        .map(|args| args[2].clone())
        .collect();
    assert_eq!(upgrades, vec!["pip", "setuptools"]);

    let target = fake.last_call().unwrap();
    assert_eq!(target.command, boot.environment().python_executable());
    assert_eq!(target.args, vec![script.into_os_string()]);
}

#[test]
fn test_target_arguments_are_forwarded_verbatim() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "app.py", "import sys\n");
    let boot = bootstrapper(&dir, FakePython::new());
    let venv = boot.environment();

    let args = vec![
        OsString::from("--flag"),
        OsString::from("value with spaces"),
        OsString::from("-x"),
    ];
    boot.run_target(&venv, &script, &args).unwrap();

    let call = boot.runner().last_call().unwrap();
    assert_eq!(call.args[0], script.into_os_string());
    assert_eq!(&call.args[1..], args.as_slice());
    assert!(!call.capture_output);
    assert!(call.inherit_stdin);
    assert_eq!(call.working_dir.as_deref(), Some(dir.path()));
    assert!(call.inherit_env);
    assert_eq!(
        call.environment.get("VIRTUAL_ENV"),
        Some(&venv.root().as_os_str().to_os_string())
    );
    assert!(call.removed_env.contains("PYTHONHOME"));
}

#[test]
fn test_target_exit_code_is_propagated() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "app.py", "import sys\nsys.exit(7)\n");
    let boot = bootstrapper(&dir, FakePython::new().with_target_exit_code(7));

    let code = boot.run(&script, &[]).unwrap();
    assert_eq!(code, 7);
}

#[test]
fn test_failure_stops_before_target_runs() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "app.py", "import requests\n");
    let mut fake = FakePython::new();
    fake.support_library_broken = true;
    let boot = bootstrapper(&dir, fake);

    assert!(boot.run(&script, &[]).is_err());
    let ran_target = boot
        .runner()
        .calls
        .borrow()
        .iter()
        .any(|c| c.args.first() == Some(&script.clone().into_os_string()));
    assert!(!ran_target);
}
