// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::sync::{Mutex, MutexGuard};

    use burst_lib::{
        terraform::{Provisioner, Terraform, Verb},
        test_env::TestEnvironment,
    };

    /// A stand-in for terraform that logs its arguments and exits with the code given for its
    /// verb in the environment (FAKE_TF_EXIT_<verb>), or 0.
    const FAKE_TERRAFORM: &str = r#"#!/bin/sh
echo "$*" >> "$FAKE_TF_LOG"
verb=$1
eval code=\${FAKE_TF_EXIT_$verb:-0}
echo "terraform $verb"
echo "working in $(pwd)" >&2
exit $code
"#;

    /// Writing an executable while another test thread forks can leave the file busy when it is
    /// run, so these tests take turns.
    static SERIAL: Mutex<()> = Mutex::new(());

    fn serial() -> MutexGuard<'static, ()> {
        SERIAL.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn fake_terraform(env: &TestEnvironment) -> (PathBuf, PathBuf) {
        let bin = env.write("terraform", FAKE_TERRAFORM.as_bytes());
        let mut perms = std::fs::metadata(&bin).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&bin, perms).unwrap();
        (bin, env.path().join("tf.log"))
    }

    fn log_lines(log: &Path) -> Vec<String> {
        std::fs::read_to_string(log)
            .unwrap()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    #[test]
    fn runs_verbs_in_working_dir() {
        let _serial = serial();
        let env = TestEnvironment::new();
        let (bin, log) = fake_terraform(&env);
        let tf = Terraform::new(&bin.to_string_lossy())
            .capture_output(true)
            .env("FAKE_TF_LOG", &log.to_string_lossy())
            .env("FAKE_TF_EXIT_plan", "2");

        let out = tf.invoke(&Verb::Init, env.path()).unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout, "terraform init\n");
        assert!(out.stderr.starts_with("working in "));

        let plan = Verb::Plan {
            out: Some(env.path().join("tfplan")),
        };
        let out = tf.invoke(&plan, env.path()).unwrap();
        assert_eq!(out.exit_code, 2);
        assert!(plan.succeeded(out.exit_code));

        tf.invoke(&Verb::Destroy { force: true }, env.path()).unwrap();

        let lines = log_lines(&log);
        assert_eq!(lines[0], "init -input=false");
        assert_eq!(
            lines[1],
            format!(
                "plan -input=false -no-color -refresh=false -detailed-exitcode -out={}",
                env.path().join("tfplan").display()
            )
        );
        assert_eq!(lines[2], "destroy -input=false -auto-approve");
    }

    #[test]
    fn failing_apply_reports_exit_code() {
        let _serial = serial();
        let env = TestEnvironment::new();
        let (bin, log) = fake_terraform(&env);
        let tf = Terraform::new(&bin.to_string_lossy())
            .env("FAKE_TF_LOG", &log.to_string_lossy())
            .env("FAKE_TF_EXIT_apply", "1");

        let out = tf.invoke(&Verb::Apply, env.path()).unwrap();
        assert_eq!(out.exit_code, 1);
        // Output streamed to the terminal is not captured.
        assert!(out.stdout.is_empty());
        assert_eq!(log_lines(&log), vec!["apply -input=false -auto-approve"]);
    }

    #[test]
    fn missing_binary_is_an_error() {
        let _serial = serial();
        let env = TestEnvironment::new();
        let tf = Terraform::new("/nonexistent/terraform").capture_output(true);
        assert!(tf.invoke(&Verb::Init, env.path()).is_err());
    }
}
