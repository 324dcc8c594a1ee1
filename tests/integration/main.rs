//! Integration tests for offcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::path::Path;
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn offcache() -> Command {
        let mut cmd = cargo_bin_cmd!("offcache");
        for var in [
            "APP_NAME",
            "CACHE_VERSION",
            "SW_FIRST_TIME_TIMEOUT",
            "SW_RETURNING_USER_TIMEOUT",
            "SW_ENABLE_LOGS",
            "OFFCACHE_CONFIG",
            "OFFCACHE_STORE",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    /// Serve `asset <path>` for every GET until the test process exits
    fn spawn_origin() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request_line = String::new();
                if reader.read_line(&mut request_line).is_err() {
                    continue;
                }
                loop {
                    let mut header = String::new();
                    match reader.read_line(&mut header) {
                        Ok(0) | Err(_) => break,
                        Ok(_) if header == "\r\n" => break,
                        Ok(_) => {}
                    }
                }

                let path = request_line.split_whitespace().nth(1).unwrap_or("/");
                let body = format!("asset {}", path);
                let _ = write!(
                    stream,
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
            }
        });

        format!("http://{}", addr)
    }

    /// Accept connections and never answer them
    fn spawn_stalled_origin() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming().flatten() {
                held.push(stream);
            }
        });

        format!("http://{}", addr)
    }

    fn write_config(dir: &Path, origin: &str, version: &str) -> std::path::PathBuf {
        let path = dir.join("config.toml");
        let store = dir.join("store");
        std::fs::write(
            &path,
            format!(
                "[worker]\n\
                 app_name = \"zmeya\"\n\
                 version = \"{version}\"\n\
                 origin = \"{origin}\"\n\
                 first_time_timeout_ms = 5000\n\
                 returning_user_timeout_ms = 2000\n\
                 \n\
                 [manifest]\n\
                 assets = [\"/\", \"/index.html\", \"/main.js\"]\n\
                 \n\
                 [store]\n\
                 path = {store:?}\n"
            ),
        )
        .unwrap();
        path
    }

    #[test]
    fn help_displays() {
        offcache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("install"))
            .stdout(predicate::str::contains("fetch"));
    }

    #[test]
    fn version_displays() {
        offcache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("offcache"));
    }

    #[test]
    fn config_path() {
        offcache()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        offcache()
            .arg("--config")
            .arg(temp.path().join("missing.toml"))
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[worker]"))
            .stdout(predicate::str::contains("zmeya"));
    }

    #[test]
    fn inject_worker_stamps_version() {
        let temp = TempDir::new().unwrap();
        let script = temp.path().join("service-worker.js");
        std::fs::write(&script, "self.addEventListener('fetch', () => {});").unwrap();

        offcache()
            .arg("--config")
            .arg(temp.path().join("missing.toml"))
            .env("CACHE_VERSION", "v7")
            .arg("inject")
            .arg("worker")
            .arg(&script)
            .assert()
            .success()
            .stdout(predicate::str::contains("self.SW_CACHE_NAME"))
            .stdout(predicate::str::contains("'zmeya-v7'"));
    }

    #[test]
    fn inject_missing_file() {
        offcache()
            .args(["inject", "client", "/nonexistent/app.js"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Path not found"));
    }

    #[test]
    fn offline_fetch_with_empty_cache_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "http://127.0.0.1:9", "v1");

        offcache()
            .arg("--config")
            .arg(&config)
            .args(["fetch", "/missing.js", "--offline"])
            .assert()
            .success()
            .stderr(predicate::str::contains("503"))
            .stderr(predicate::str::contains("total-failure"));
    }

    #[test]
    fn install_then_serve_offline() {
        let temp = TempDir::new().unwrap();
        let origin = spawn_origin();
        let config = write_config(temp.path(), &origin, "v1");

        offcache()
            .arg("--config")
            .arg(&config)
            .arg("install")
            .assert()
            .success()
            .stdout(predicate::str::contains("zmeya-v1"));

        offcache()
            .arg("--config")
            .arg(&config)
            .args(["fetch", "/main.js", "--offline"])
            .assert()
            .success()
            .stdout(predicate::str::contains("asset /main.js"))
            .stderr(predicate::str::contains("cache-hit"));

        offcache()
            .arg("--config")
            .arg(&config)
            .args(["fetch", "/levels/3", "--navigate", "--offline"])
            .assert()
            .success()
            .stdout(predicate::str::contains("asset /"))
            .stderr(predicate::str::contains("cache-miss-fallback-used"));
    }

    #[test]
    fn upgrade_removes_previous_generation() {
        let temp = TempDir::new().unwrap();
        let origin = spawn_origin();

        let v1 = write_config(temp.path(), &origin, "v1");
        offcache().arg("--config").arg(&v1).arg("install").assert().success();

        let v2 = write_config(temp.path(), &origin, "v2");
        offcache()
            .arg("--config")
            .arg(&v2)
            .arg("install")
            .assert()
            .success()
            .stdout(predicate::str::contains("zmeya-v1"));

        offcache()
            .arg("--config")
            .arg(&v2)
            .args(["info", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"cacheSize\": 3"))
            .stdout(predicate::str::contains("zmeya-v2"))
            .stdout(predicate::str::contains("zmeya-v1").not());
    }

    #[test]
    fn staged_install_activates_on_skip_waiting() {
        let temp = TempDir::new().unwrap();
        let origin = spawn_origin();
        let config = write_config(temp.path(), &origin, "v1");

        offcache()
            .arg("--config")
            .arg(&config)
            .args(["install", "--no-activate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("message skip-waiting"));

        offcache()
            .arg("--config")
            .arg(&config)
            .args(["info", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"cacheSize\": 0"));

        offcache()
            .arg("--config")
            .arg(&config)
            .args(["message", "skip-waiting"])
            .assert()
            .success()
            .stdout(predicate::str::contains("zmeya-v1 is live"));

        offcache()
            .arg("--config")
            .arg(&config)
            .args(["message", "cache-info"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"cacheSize\": 3"));

        // Staging was consumed by the promotion
        offcache()
            .arg("--config")
            .arg(&config)
            .args(["message", "skip-waiting"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Nothing staged"));
    }

    #[test]
    fn stalled_origin_falls_back_without_hanging() {
        let temp = TempDir::new().unwrap();
        let origin = spawn_origin();
        let config = write_config(temp.path(), &origin, "v1");
        offcache().arg("--config").arg(&config).arg("install").assert().success();

        let stalled = spawn_stalled_origin();
        let started = Instant::now();
        offcache()
            .arg("--config")
            .arg(&config)
            .args(["fetch", "/main.js", "--origin", &stalled])
            .timeout(Duration::from_secs(20))
            .assert()
            .success()
            .stdout(predicate::str::contains("asset /main.js"))
            .stderr(predicate::str::contains("cache-hit (returning)"));

        // Returning timeout is 2s; the process must not wait on the origin
        assert!(started.elapsed() < Duration::from_secs(15));
    }
}
