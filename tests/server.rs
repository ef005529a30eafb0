//! End-to-end tests: a real server on an ephemeral port, driven over TCP.

use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use text_line_server::{Config, Server};

const LINES: [&str; 25] = [
    "AAAAAAA",
    "BBBBBBBBBB",
    "CCCCCCCCCCCC",
    "DDDDDDDDDDDDDDD",
    "EEEEEEEEE",
    "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF",
    "HHHHHHHHHHHHHHHHH",
    "GGGGGGGGGGGGGGGGGGGGG",
    "JJJJJJJJJJJJJJJJJJJJJJJJJJ",
    "III",
    "KKKKKKKKKKKKKKKKKKKKKKKKKKK",
    "LLLLLLL",
    "M",
    "N",
    "OOOOOOOOOOOO",
    "PPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPP",
    "RRRRRRRRRR",
    "SSSSSSSSSSSSS",
    "TTTTTTTTTTTTTTTTTTT",
    "QQQQQQQQQ",
    "UUUUUUUUU",
    "ZZZZZZZZZZZZZZZZ",
    "XXXXXXXXX",
    "YYYYYYYYYYYYYY",
    "W",
];

struct Running {
    _dir: TempDir,
    path: PathBuf,
    server: Arc<Server>,
    addr: SocketAddr,
    handle: Option<JoinHandle<text_line_server::Result<()>>>,
}

impl Running {
    fn start(lines: &[String]) -> Self {
        Self::start_with(lines, |_| {})
    }

    fn start_with(lines: &[String], tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("served.txt");
        let mut contents = lines.join("\n");
        contents.push('\n');
        fs::write(&path, contents).unwrap();

        let mut config = Self::config(&path);
        tweak(&mut config);
        Self::launch(dir, path, config)
    }

    fn start_at(dir: TempDir, path: &Path) -> Self {
        Self::launch(dir, path.to_path_buf(), Self::config(path))
    }

    fn config(path: &Path) -> Config {
        Config {
            port: 0,
            threads: 4,
            poll_interval_ms: 20,
            shutdown_grace_ms: 200,
            text_path: Some(path.to_path_buf()),
            ..Default::default()
        }
    }

    fn launch(dir: TempDir, path: PathBuf, config: Config) -> Self {
        let server = Arc::new(Server::new(config).unwrap());
        let addr = server.local_addr().unwrap();

        let runner = Arc::clone(&server);
        let handle = thread::spawn(move || runner.run());

        Running {
            _dir: dir,
            path,
            server,
            addr,
            handle: Some(handle),
        }
    }

    fn fixture() -> Self {
        Self::start(&LINES.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    fn index_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".index");
        PathBuf::from(name)
    }

    fn client(&self) -> Client {
        Client::connect(self.addr)
    }

    fn join(&mut self) -> text_line_server::Result<()> {
        let handle = self.handle.take().unwrap();
        handle.join().unwrap()
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.server.shutdown();
            let _ = handle.join();
        }
    }
}

struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        Client {
            reader: BufReader::new(stream.try_clone().unwrap()),
            writer: stream,
        }
    }

    fn send(&mut self, request: &str) {
        self.writer.write_all(request.as_bytes()).unwrap();
        self.writer.write_all(b"\r\n").unwrap();
    }

    fn line(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).unwrap();
        line
    }

    /// Send a request and collect the status line plus body line if any
    fn request(&mut self, request: &str) -> String {
        self.send(request);
        let status = self.line();
        if status == "OK\r\n" {
            status + &self.line()
        } else {
            status
        }
    }

    fn assert_closed(&mut self) {
        let mut rest = Vec::new();
        let n = self.reader.read_to_end(&mut rest).unwrap();
        assert_eq!(n, 0, "unexpected bytes: {:?}", rest);
    }
}

#[test]
fn serves_every_fixture_line() {
    let running = Running::fixture();
    let mut client = running.client();

    for (i, expected) in LINES.iter().enumerate() {
        let response = client.request(&format!("GET {}", i + 1));
        assert_eq!(response, format!("OK\r\n{}\r\n", expected));
    }
    assert_eq!(client.request("GET 1"), "OK\r\nAAAAAAA\r\n");
    assert_eq!(client.request("GET 25"), "OK\r\nW\r\n");
    assert_eq!(client.request("GET 26"), "ERR\r\n");
}

#[test]
fn errors_leave_connection_usable() {
    let running = Running::fixture();
    let mut client = running.client();

    for bad in ["GET 0", "GET -1", "GET 26", "GET", "GET A", "get 1", "HELLO", ""] {
        assert_eq!(client.request(bad), "ERR\r\n", "request {:?}", bad);
        assert_eq!(client.request("GET 13"), "OK\r\nM\r\n");
    }
}

#[test]
fn quit_closes_silently() {
    let running = Running::fixture();
    let mut client = running.client();

    assert_eq!(client.request("QUIT extra"), "ERR\r\n");
    assert_eq!(client.request("GET 14"), "OK\r\nN\r\n");

    client.send("QUIT");
    client.assert_closed();

    // The server keeps serving other clients
    let mut other = running.client();
    assert_eq!(other.request("GET 10"), "OK\r\nIII\r\n");
}

#[test]
fn oversized_request_is_rejected() {
    let running = Running::fixture();
    let mut client = running.client();

    let junk = "9".repeat(5000);
    client.writer.write_all(b"GET ").unwrap();
    client.writer.write_all(junk.as_bytes()).unwrap();
    assert_eq!(client.line(), "ERR\r\n");
}

#[test]
fn long_and_short_lines() {
    let lines: Vec<String> = vec![
        "x".to_string(),
        "y".repeat(300_000),
        String::new(),
        "z".repeat(70_000),
        "end".to_string(),
    ];
    let running = Running::start(&lines);
    let mut client = running.client();

    for (i, expected) in lines.iter().enumerate() {
        let response = client.request(&format!("GET {}", i + 1));
        assert_eq!(response.len(), expected.len() + 6, "line {}", i + 1);
        assert_eq!(response, format!("OK\r\n{}\r\n", expected), "line {}", i + 1);
    }
}

#[test]
fn concurrent_clients_get_their_own_lines() {
    let lines: Vec<String> = (0..500)
        .map(|i| format!("line-{}-{}", i, "#".repeat(i % 97)))
        .collect();
    let running = Running::start(&lines);
    let lines = Arc::new(lines);

    let workers: Vec<_> = (0..8)
        .map(|c| {
            let lines = Arc::clone(&lines);
            let mut client = running.client();
            thread::spawn(move || {
                for round in 0..200 {
                    let n = (c * 61 + round * 7) % lines.len() + 1;
                    let response = client.request(&format!("GET {}", n));
                    assert_eq!(response, format!("OK\r\n{}\r\n", lines[n - 1]));
                }
                client.send("QUIT");
                client.assert_closed();
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
}

#[test]
fn pipelined_request_after_response_is_served() {
    let running = Running::fixture();
    let mut client = running.client();

    // Second request goes out before the first response is read
    client.send("GET 3");
    assert_eq!(client.line(), "OK\r\n");
    client.send("GET 4");
    assert_eq!(client.line(), "CCCCCCCCCCCC\r\n");
    assert_eq!(client.line(), "OK\r\n");
    assert_eq!(client.line(), "DDDDDDDDDDDDDDD\r\n");
}

#[test]
fn shutdown_command_stops_server() {
    let mut running = Running::fixture();
    let mut client = running.client();

    assert_eq!(client.request("SHUTDOWN now"), "ERR\r\n");
    client.send("SHUTDOWN");

    running.join().unwrap();
    client.assert_closed();
    assert_eq!(running.server.active_connections(), 0);
}

#[test]
fn client_that_stops_reading_does_not_hold_a_worker() {
    let lines = vec!["h".repeat(64 << 20), "short".to_string()];
    let mut running = Running::start_with(&lines, |config| {
        config.threads = 1;
        config.request_timeout_ms = Some(300);
    });

    // Asks for a line far larger than the socket buffers, then never reads
    let mut stalled = running.client();
    stalled.send("GET 1");
    thread::sleep(Duration::from_millis(50));

    let mut other = running.client();
    assert_eq!(other.request("GET 2"), "OK\r\nshort\r\n");

    let started = Instant::now();
    running.server.shutdown();
    running.join().unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn lost_index_stops_server_with_error() {
    let mut running = Running::fixture();
    fs::remove_file(running.index_path()).unwrap();

    let mut client = running.client();
    client.send("GET 1");

    assert!(running.join().is_err());
    client.assert_closed();
    assert_eq!(running.server.active_connections(), 0);
}

#[test]
fn stale_index_is_rebuilt_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("served.txt");
    fs::write(&path, "old\n").unwrap();
    let index = {
        let mut name = path.clone().into_os_string();
        name.push(".index");
        PathBuf::from(name)
    };
    fs::write(&index, [0u8; 16]).unwrap();
    let past = std::time::SystemTime::now() - Duration::from_secs(600);
    fs::File::options()
        .write(true)
        .open(&index)
        .unwrap()
        .set_modified(past)
        .unwrap();

    let running = Running::start_at(dir, &path);
    let mut client = running.client();
    assert_eq!(client.request("GET 1"), "OK\r\nold\r\n");
}

#[test]
fn missing_text_file_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        port: 0,
        text_path: Some(dir.path().join("absent.txt")),
        ..Default::default()
    };
    assert!(Server::new(config).is_err());
}
