//! Integration tests for dircache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn dircache() -> Command {
        cargo_bin_cmd!("dircache")
    }

    /// A command isolated from the user's config and CI environment
    fn dircache_in(workdir: &Path) -> Command {
        let mut cmd = dircache();
        cmd.current_dir(workdir)
            .env("DIRCACHE_CONFIG", workdir.join("no-config.toml"))
            .env_remove("DIRCACHE_BUCKET_URL")
            .env_remove("DIRCACHE_APP")
            .env_remove("DIRCACHE_BRANCH")
            .env_remove("RUST_LOG");
        cmd
    }

    fn coords(bucket: &Path, cache_name: &str) -> Vec<String> {
        vec![
            "--bucket-url".to_string(),
            format!("file://{}", bucket.display()),
            "--app".to_string(),
            "web".to_string(),
            "--branch".to_string(),
            "main".to_string(),
            "--cache-name".to_string(),
            cache_name.to_string(),
        ]
    }

    struct Workspace {
        _temp: TempDir,
        bucket: std::path::PathBuf,
        work: std::path::PathBuf,
    }

    fn workspace() -> Workspace {
        let temp = TempDir::new().unwrap();
        let bucket = temp.path().join("bucket");
        let work = temp.path().join("work");
        std::fs::create_dir_all(&bucket).unwrap();
        std::fs::create_dir_all(&work).unwrap();
        Workspace {
            _temp: temp,
            bucket,
            work,
        }
    }

    #[test]
    fn help_displays() {
        dircache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Remote cache for build directories"))
            .stdout(predicate::str::contains("cached-fs"));
    }

    #[test]
    fn version_displays() {
        dircache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("dircache"));
    }

    #[test]
    fn config_path() {
        let ws = workspace();
        dircache_in(&ws.work)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("no-config.toml"));
    }

    #[test]
    fn config_show() {
        let ws = workspace();
        dircache_in(&ws.work)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[store]"));
    }

    #[test]
    fn completions_bash() {
        dircache()
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("dircache"));
    }

    #[test]
    fn unsupported_bucket_url_fails() {
        let ws = workspace();
        dircache_in(&ws.work)
            .args([
                "fs-exists",
                "--bucket-url",
                "s3://bucket",
                "--app",
                "web",
                "--cache-name",
                "deps",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("unsupported bucket url"));
    }

    #[test]
    fn fs_exists_fails_on_cold_cache() {
        let ws = workspace();
        dircache_in(&ws.work)
            .arg("fs-exists")
            .args(coords(&ws.bucket, "deps"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("doesn't exist !"));
    }

    #[test]
    fn store_then_exists_then_load() {
        let ws = workspace();
        std::fs::create_dir_all(ws.work.join("node_modules/left-pad")).unwrap();
        std::fs::write(ws.work.join("node_modules/left-pad/index.js"), "pad").unwrap();

        dircache_in(&ws.work)
            .arg("store-fs")
            .args(coords(&ws.bucket, "deps"))
            .arg("node_modules")
            .assert()
            .success();

        dircache_in(&ws.work)
            .arg("fs-exists")
            .args(coords(&ws.bucket, "deps"))
            .assert()
            .success()
            .stdout(predicate::str::contains("Cache exists !"));

        std::fs::remove_dir_all(ws.work.join("node_modules")).unwrap();

        dircache_in(&ws.work)
            .arg("load-fs")
            .args(coords(&ws.bucket, "deps"))
            .arg("node_modules")
            .assert()
            .success();

        assert_eq!(
            std::fs::read_to_string(ws.work.join("node_modules/left-pad/index.js")).unwrap(),
            "pad"
        );
    }

    #[test]
    fn load_restores_to_another_destination() {
        let ws = workspace();
        std::fs::create_dir_all(ws.work.join("a")).unwrap();
        std::fs::write(ws.work.join("a/same.txt"), "from a").unwrap();
        std::fs::create_dir_all(ws.work.join("b")).unwrap();
        std::fs::write(ws.work.join("b/same.txt"), "from b").unwrap();

        dircache_in(&ws.work)
            .arg("store-fs")
            .args(coords(&ws.bucket, "pair"))
            .args(["--skip-compress", "first:a", "second:b"])
            .assert()
            .success();

        dircache_in(&ws.work)
            .arg("load-fs")
            .args(coords(&ws.bucket, "pair"))
            .args(["first:restored/one", "second:restored/two"])
            .assert()
            .success();

        assert_eq!(
            std::fs::read_to_string(ws.work.join("restored/one/same.txt")).unwrap(),
            "from a"
        );
        assert_eq!(
            std::fs::read_to_string(ws.work.join("restored/two/same.txt")).unwrap(),
            "from b"
        );
    }

    #[test]
    fn load_missing_cache_policies() {
        let ws = workspace();

        dircache_in(&ws.work)
            .arg("load-fs")
            .args(coords(&ws.bucket, "cold"))
            .arg("node_modules")
            .assert()
            .success();
        assert!(!ws.work.join("node_modules").exists());

        dircache_in(&ws.work)
            .arg("load-fs")
            .args(coords(&ws.bucket, "cold"))
            .args(["--on-inexistant-cache", "warn", "node_modules"])
            .assert()
            .success()
            .stderr(predicate::str::contains("No cache entry found"));

        dircache_in(&ws.work)
            .arg("load-fs")
            .args(coords(&ws.bucket, "cold"))
            .args(["--on-inexistant-cache", "fail", "node_modules"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No cache entry"));
    }

    #[test]
    fn store_missing_directory_fails() {
        let ws = workspace();
        dircache_in(&ws.work)
            .arg("store-fs")
            .args(coords(&ws.bucket, "deps"))
            .arg("does-not-exist")
            .assert()
            .failure();

        dircache_in(&ws.work)
            .arg("fs-exists")
            .args(coords(&ws.bucket, "deps"))
            .assert()
            .failure();
    }

    #[test]
    fn duplicate_directory_names_rejected_before_contacting_bucket() {
        let ws = workspace();
        let gcs = [
            "--bucket-url",
            "gs://unreachable-bucket",
            "--app",
            "web",
            "--cache-name",
            "deps",
        ];

        for args in [
            vec!["store-fs", "a:x", "a:y"],
            vec!["load-fs", "a:x", "a:y"],
            vec![
                "cached-fs",
                "--checksum-value",
                "v1",
                "--cacheable-command",
                "true",
                "a:x",
                "a:y",
            ],
        ] {
            dircache_in(&ws.work)
                .env_remove("DIRCACHE_GCS_ACCESS_TOKEN")
                .env("PATH", ws.work.join("no-bin"))
                .args(&args[..1])
                .args(gcs)
                .args(&args[1..])
                .assert()
                .failure()
                .stderr(predicate::str::contains("given more than once"));
        }
    }

    #[test]
    fn cached_fs_requires_checksum() {
        let ws = workspace();
        dircache_in(&ws.work)
            .arg("cached-fs")
            .args(coords(&ws.bucket, "deps"))
            .args(["--cacheable-command", "true", "out"])
            .assert()
            .failure();
    }

    #[cfg(unix)]
    mod cached_fs {
        use super::*;

        const BUILD: &str = "mkdir -p out && echo built > out/result.txt && echo run >> runs.log";

        fn cached_fs(ws: &Workspace, checksum: &str) -> assert_cmd::assert::Assert {
            dircache_in(&ws.work)
                .arg("cached-fs")
                .args(coords(&ws.bucket, "build"))
                .args(["--checksum-value", checksum])
                .args(["--cacheable-command", BUILD])
                .arg("--root-dir")
                .arg(&ws.work)
                .arg("out")
                .assert()
        }

        fn runs(ws: &Workspace) -> usize {
            std::fs::read_to_string(ws.work.join("runs.log"))
                .map(|s| s.lines().count())
                .unwrap_or(0)
        }

        #[test]
        fn miss_then_hit_then_miss() {
            let ws = workspace();

            cached_fs(&ws, "v1").success();
            assert_eq!(runs(&ws), 1);

            std::fs::remove_dir_all(ws.work.join("out")).unwrap();
            cached_fs(&ws, "v1").success();
            assert_eq!(runs(&ws), 1);
            assert_eq!(
                std::fs::read_to_string(ws.work.join("out/result.txt")).unwrap(),
                "built\n"
            );

            cached_fs(&ws, "v2").success();
            assert_eq!(runs(&ws), 2);
        }

        #[test]
        fn checksum_file_controls_hits() {
            let ws = workspace();
            std::fs::write(ws.work.join("package-lock.json"), "{\"v\":1}").unwrap();

            let run = |ws: &Workspace| {
                dircache_in(&ws.work)
                    .arg("cached-fs")
                    .args(coords(&ws.bucket, "lock"))
                    .args(["--checksum-file", "package-lock.json"])
                    .args(["--cacheable-command", BUILD])
                    .arg("out")
                    .assert()
                    .success();
            };

            run(&ws);
            run(&ws);
            assert_eq!(runs(&ws), 1);

            std::fs::write(ws.work.join("package-lock.json"), "{\"v\":2}").unwrap();
            run(&ws);
            assert_eq!(runs(&ws), 2);
        }

        #[test]
        fn failing_command_stores_nothing() {
            let ws = workspace();

            dircache_in(&ws.work)
                .arg("cached-fs")
                .args(coords(&ws.bucket, "broken"))
                .args(["--checksum-value", "v1"])
                .args(["--cacheable-command", "mkdir -p out && exit 7"])
                .arg("out")
                .assert()
                .failure()
                .stderr(predicate::str::contains("7"));

            dircache_in(&ws.work)
                .arg("fs-exists")
                .args(coords(&ws.bucket, "broken"))
                .assert()
                .failure();
        }
    }
}
